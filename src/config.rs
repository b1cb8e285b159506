//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.foerderkatalog.toml` files.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".foerderkatalog.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input decoding settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Aggregation pass settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Forecast model settings.
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Geographic reference data.
    #[serde(default)]
    pub geography: GeographyConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Catalog export to read.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Directory the documents are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory the dashboard serves its data from.
    #[serde(default = "default_web_data_dir")]
    pub web_data_dir: PathBuf,

    /// Pinned "today"; the local date is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output_dir: default_output_dir(),
            web_data_dir: default_web_data_dir(),
            reference_date: None,
        }
    }
}

fn default_input() -> PathBuf {
    PathBuf::from("Suchliste.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_web_data_dir() -> PathBuf {
    PathBuf::from("web/data")
}

/// Input decoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// WHATWG encoding label of the export.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Country value marking domestic projects.
    #[serde(default = "default_domestic_country")]
    pub domestic_country: String,

    /// Prefix of the placeholder that replaces protected recipient names.
    #[serde(default = "default_anonymized_marker")]
    pub anonymized_marker: String,

    /// Header names that must be present for the run to start.
    #[serde(default = "default_required_columns")]
    pub required_columns: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            delimiter: default_delimiter(),
            domestic_country: default_domestic_country(),
            anonymized_marker: default_anonymized_marker(),
            required_columns: default_required_columns(),
        }
    }
}

fn default_encoding() -> String {
    "windows-1252".to_string()
}

fn default_delimiter() -> char {
    ';'
}

fn default_domestic_country() -> String {
    "Deutschland".to_string()
}

fn default_anonymized_marker() -> String {
    "Keine Anzeige".to_string()
}

fn default_required_columns() -> Vec<String> {
    vec!["FKZ".to_string(), "Fördersumme in EUR".to_string()]
}

/// Aggregation pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Earliest start year treated as valid.
    #[serde(default = "default_min_year")]
    pub min_year: i32,

    /// Years past the reference year still accepted as start years.
    #[serde(default = "default_future_year_window")]
    pub future_year_window: i32,

    /// First year of the year-over-year growth series.
    #[serde(default = "default_growth_start_year")]
    pub growth_start_year: i32,

    #[serde(default = "default_top_recipients")]
    pub top_recipients: usize,

    #[serde(default = "default_top_cities")]
    pub top_cities: usize,

    #[serde(default = "default_top_topics")]
    pub top_topics: usize,

    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,

    /// Shortest keyword kept, in characters.
    #[serde(default = "default_keyword_min_length")]
    pub keyword_min_length: usize,

    /// Words never reported as keywords (lowercase).
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,

    #[serde(default = "default_top_joint_projects")]
    pub top_joint_projects: usize,

    #[serde(default = "default_top_sponsor_ministry_pairs")]
    pub top_sponsor_ministry_pairs: usize,

    /// Recipients that get a drill-down series.
    #[serde(default = "default_trend_recipients")]
    pub trend_recipients: usize,

    /// Cities that get a drill-down series.
    #[serde(default = "default_trend_cities")]
    pub trend_cities: usize,

    /// Keywords that get a yearly series.
    #[serde(default = "default_trend_keywords")]
    pub trend_keywords: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_year: default_min_year(),
            future_year_window: default_future_year_window(),
            growth_start_year: default_growth_start_year(),
            top_recipients: default_top_recipients(),
            top_cities: default_top_cities(),
            top_topics: default_top_topics(),
            top_keywords: default_top_keywords(),
            keyword_min_length: default_keyword_min_length(),
            stopwords: default_stopwords(),
            top_joint_projects: default_top_joint_projects(),
            top_sponsor_ministry_pairs: default_top_sponsor_ministry_pairs(),
            trend_recipients: default_trend_recipients(),
            trend_cities: default_trend_cities(),
            trend_keywords: default_trend_keywords(),
        }
    }
}

fn default_min_year() -> i32 {
    1980
}

fn default_future_year_window() -> i32 {
    5
}

fn default_growth_start_year() -> i32 {
    2010
}

fn default_top_recipients() -> usize {
    50
}

fn default_top_cities() -> usize {
    30
}

fn default_top_topics() -> usize {
    50
}

fn default_top_keywords() -> usize {
    100
}

fn default_keyword_min_length() -> usize {
    5
}

fn default_stopwords() -> Vec<String> {
    vec![
        "und", "der", "die", "das", "für", "zur", "zum", "von", "mit", "im", "in", "auf", "aus",
        "bei", "des", "ein", "eine", "einer", "einem", "einen", "als", "an", "nach", "über",
        "durch", "sowie", "wird", "werden", "wurde", "wurden", "ist", "sind", "hat", "haben",
        "kann", "können", "soll", "sollen", "muss", "müssen", "teil", "phase", "projekt",
        "verbundprojekt", "teilprojekt", "vorhaben", "entwicklung",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_top_joint_projects() -> usize {
    30
}

fn default_top_sponsor_ministry_pairs() -> usize {
    30
}

fn default_trend_recipients() -> usize {
    100
}

fn default_trend_cities() -> usize {
    50
}

fn default_trend_keywords() -> usize {
    20
}

/// Forecast model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Number of years projected past the last closed year.
    #[serde(default = "default_horizon_years")]
    pub horizon_years: usize,

    /// First year of the training series.
    #[serde(default = "default_training_start_year")]
    pub training_start_year: i32,

    /// Outlier years replaced by interpolation before fitting.
    #[serde(default = "default_excluded_years")]
    pub excluded_years: Vec<i32>,

    /// Additive season length in years; no seasonal term when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_length: Option<usize>,

    /// Coverage of the prediction interval.
    #[serde(default = "default_interval_level")]
    pub interval_level: f64,

    /// Trailing years held out for the backtest.
    #[serde(default = "default_backtest_years")]
    pub backtest_years: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_years: default_horizon_years(),
            training_start_year: default_training_start_year(),
            excluded_years: default_excluded_years(),
            season_length: None,
            interval_level: default_interval_level(),
            backtest_years: default_backtest_years(),
        }
    }
}

fn default_horizon_years() -> usize {
    10
}

fn default_training_start_year() -> i32 {
    2000
}

fn default_excluded_years() -> Vec<i32> {
    vec![2020, 2021]
}

fn default_interval_level() -> f64 {
    0.8
}

fn default_backtest_years() -> usize {
    5
}

/// Geographic reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeographyConfig {
    /// Inhabitants per federal state, for per-capita figures.
    #[serde(default = "default_population")]
    pub population: BTreeMap<String, u64>,
}

impl Default for GeographyConfig {
    fn default() -> Self {
        Self {
            population: default_population(),
        }
    }
}

fn default_population() -> BTreeMap<String, u64> {
    [
        ("Baden-Württemberg", 11_280_257),
        ("Bayern", 13_369_393),
        ("Berlin", 3_755_251),
        ("Brandenburg", 2_573_135),
        ("Bremen", 684_864),
        ("Hamburg", 1_892_122),
        ("Hessen", 6_391_360),
        ("Mecklenburg-Vorpommern", 1_628_378),
        ("Niedersachsen", 8_140_242),
        ("Nordrhein-Westfalen", 18_139_116),
        ("Rheinland-Pfalz", 4_159_150),
        ("Saarland", 993_260),
        ("Sachsen", 4_086_152),
        ("Sachsen-Anhalt", 2_186_643),
        ("Schleswig-Holstein", 2_953_270),
        ("Thüringen", 2_126_846),
    ]
    .into_iter()
    .map(|(state, population)| (state.to_string(), population))
    .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(date) = args.reference_date {
            self.general.reference_date = Some(date);
        }

        let paths = args.command.paths();
        if let Some(input) = paths.input {
            self.general.input = input.to_path_buf();
        }
        if let Some(output) = paths.output {
            self.general.output_dir = output.to_path_buf();
        }
        if let Some(web_data) = paths.web_data {
            self.general.web_data_dir = web_data.to_path_buf();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Command, RunArgs};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ingest.encoding, "windows-1252");
        assert_eq!(config.ingest.delimiter, ';');
        assert_eq!(config.analysis.top_recipients, 50);
        assert_eq!(config.forecast.excluded_years, vec![2020, 2021]);
        assert_eq!(config.geography.population.len(), 16);
        assert!(config.analysis.stopwords.contains(&"verbundprojekt".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
input = "export.csv"
reference_date = "2024-06-30"

[analysis]
top_cities = 10
stopwords = ["und"]

[forecast]
horizon_years = 3
season_length = 4

[geography.population]
Bremen = 700000
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.input, PathBuf::from("export.csv"));
        assert_eq!(
            config.general.reference_date,
            NaiveDate::from_ymd_opt(2024, 6, 30)
        );
        assert_eq!(config.general.output_dir, PathBuf::from("output"));
        assert_eq!(config.analysis.top_cities, 10);
        assert_eq!(config.analysis.top_recipients, 50);
        assert_eq!(config.analysis.stopwords, vec!["und"]);
        assert_eq!(config.forecast.horizon_years, 3);
        assert_eq!(config.forecast.season_length, Some(4));
        assert_eq!(config.geography.population.get("Bremen"), Some(&700_000));
        assert_eq!(config.geography.population.len(), 1);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[ingest]"));
        assert!(toml_str.contains("[forecast]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.analysis.top_keywords, 100);
    }

    #[test]
    fn test_merge_with_args_only_overrides_explicit_values() {
        let mut config = Config::default();
        let args = Args {
            command: Command::Run(RunArgs {
                input: Some(PathBuf::from("other.csv")),
                output: None,
                sequential: false,
            }),
            config: None,
            verbose: false,
            quiet: false,
            reference_date: NaiveDate::from_ymd_opt(2023, 1, 15),
        };

        config.merge_with_args(&args);

        assert_eq!(config.general.input, PathBuf::from("other.csv"));
        assert_eq!(config.general.output_dir, PathBuf::from("output"));
        assert_eq!(
            config.general.reference_date,
            NaiveDate::from_ymd_opt(2023, 1, 15)
        );
    }
}

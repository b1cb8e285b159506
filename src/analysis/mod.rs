//! Aggregation engine.
//!
//! Every pass is a pure function of the shared [`Dataset`] and the
//! [`RunContext`]. Passes never see each other's output, so they can run
//! in any order or all at once.

pub mod aggregator;
pub mod duration;
pub mod entity_trends;
pub mod forecast;
pub mod funding_types;
pub mod geography;
pub mod joint;
pub mod keyword_trends;
pub mod keywords;
pub mod ministry;
pub mod recipients;
pub mod sponsors;
pub mod summary;
pub mod temporal;
pub mod topics;

use crate::config::Config;
use crate::error::PassError;
use crate::models::{Column, Dataset};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info};

/// Inputs every pass shares besides the records.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The date treated as "today".
    pub reference_date: NaiveDate,
    /// Stamp written into run metadata.
    pub generated_at: DateTime<Utc>,
    pub config: Config,
}

impl RunContext {
    pub fn new(config: Config, reference_date: NaiveDate, generated_at: DateTime<Utc>) -> Self {
        Self {
            reference_date,
            generated_at,
            config,
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_date.year()
    }

    /// The most recent calendar year that has fully elapsed.
    pub fn last_closed_year(&self) -> i32 {
        self.reference_year() - 1
    }

    /// Start years accepted as plausible.
    pub fn valid_years(&self) -> RangeInclusive<i32> {
        let analysis = &self.config.analysis;
        analysis.min_year..=self.reference_year() + analysis.future_year_window
    }
}

/// One serialized output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResult {
    pub pass: &'static str,
    pub file_name: &'static str,
    pub body: String,
}

/// The fixed battery of aggregation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Ministry,
    Geography,
    Temporal,
    Recipients,
    Topics,
    Keywords,
    KeywordTrends,
    Duration,
    FundingTypes,
    JointProjects,
    Sponsors,
    EntityTrends,
    Forecast,
    Summary,
}

impl Pass {
    pub const ALL: [Pass; 14] = [
        Pass::Ministry,
        Pass::Geography,
        Pass::Temporal,
        Pass::Recipients,
        Pass::Topics,
        Pass::Keywords,
        Pass::KeywordTrends,
        Pass::Duration,
        Pass::FundingTypes,
        Pass::JointProjects,
        Pass::Sponsors,
        Pass::EntityTrends,
        Pass::Forecast,
        Pass::Summary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::Ministry => "ministry",
            Pass::Geography => "geography",
            Pass::Temporal => "temporal",
            Pass::Recipients => "recipients",
            Pass::Topics => "topics",
            Pass::Keywords => "keywords",
            Pass::KeywordTrends => "keyword_trends",
            Pass::Duration => "duration",
            Pass::FundingTypes => "funding_types",
            Pass::JointProjects => "joint_projects",
            Pass::Sponsors => "sponsors",
            Pass::EntityTrends => "entity_trends",
            Pass::Forecast => "forecast",
            Pass::Summary => "summary",
        }
    }

    /// Document file name the dashboard fetches.
    pub fn file_name(self) -> &'static str {
        match self {
            Pass::Ministry => "ministry_funding.json",
            Pass::Geography => "geographic_distribution.json",
            Pass::Temporal => "temporal_trends.json",
            Pass::Recipients => "top_recipients.json",
            Pass::Topics => "topic_analysis.json",
            Pass::Keywords => "keywords.json",
            Pass::KeywordTrends => "keyword_trends.json",
            Pass::Duration => "duration_analysis.json",
            Pass::FundingTypes => "funding_types.json",
            Pass::JointProjects => "joint_projects.json",
            Pass::Sponsors => "projekttraeger.json",
            Pass::EntityTrends => "entity_trends.json",
            Pass::Forecast => "funding_forecast.json",
            Pass::Summary => "summary_stats.json",
        }
    }

    /// Columns that must exist in the input header.
    pub fn required_columns(self) -> &'static [Column] {
        match self {
            Pass::Ministry => &[Column::Ministry, Column::Amount],
            Pass::Geography => &[Column::Country, Column::State, Column::City],
            Pass::Temporal => &[Column::StartDate, Column::Ministry],
            Pass::Recipients => &[Column::Recipient],
            Pass::Topics => &[Column::TopicCode],
            Pass::Keywords => &[Column::Title],
            Pass::KeywordTrends => &[Column::Title, Column::StartDate],
            Pass::Duration => &[Column::StartDate, Column::EndDate],
            Pass::FundingTypes => &[Column::FundingType, Column::FundingProfile],
            Pass::JointProjects => &[Column::JointProject],
            Pass::Sponsors => &[Column::Sponsor],
            Pass::EntityTrends => &[Column::StartDate, Column::State, Column::City, Column::Recipient],
            Pass::Forecast => &[Column::StartDate],
            Pass::Summary => &[],
        }
    }

    pub fn check(self, dataset: &Dataset) -> Result<(), PassError> {
        dataset.require(self.name(), self.required_columns())
    }

    /// Compute and serialize this pass's document.
    pub fn run(self, dataset: &Dataset, ctx: &RunContext) -> Result<AggregationResult, PassError> {
        self.check(dataset)?;
        debug!("Running {} pass", self.name());

        let body = match self {
            Pass::Ministry => encode(&ministry::analyze(dataset, ctx)),
            Pass::Geography => encode(&geography::analyze(dataset, ctx)),
            Pass::Temporal => encode(&temporal::analyze(dataset, ctx)),
            Pass::Recipients => encode(&recipients::analyze(dataset, ctx)),
            Pass::Topics => encode(&topics::analyze(dataset, ctx)),
            Pass::Keywords => encode(&keywords::analyze(dataset, ctx)),
            Pass::KeywordTrends => encode(&keyword_trends::analyze(dataset, ctx)),
            Pass::Duration => encode(&duration::analyze(dataset, ctx)),
            Pass::FundingTypes => encode(&funding_types::analyze(dataset, ctx)),
            Pass::JointProjects => encode(&joint::analyze(dataset, ctx)),
            Pass::Sponsors => encode(&sponsors::analyze(dataset, ctx)),
            Pass::EntityTrends => encode(&entity_trends::analyze(dataset, ctx)),
            Pass::Forecast => encode(&forecast::analyze(dataset, ctx)),
            Pass::Summary => encode(&summary::analyze(dataset, ctx)),
        }
        .map_err(|source| PassError::Encode {
            pass: self.name(),
            source,
        })?;

        Ok(AggregationResult {
            pass: self.name(),
            file_name: self.file_name(),
            body,
        })
    }
}

fn encode<T: Serialize>(document: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(document)
}

/// Fail fast when any pass lacks a column, before computing anything.
pub fn check_inputs(dataset: &Dataset) -> Result<(), PassError> {
    Pass::ALL.iter().try_for_each(|pass| pass.check(dataset))
}

/// Run every pass on the current thread.
pub fn run_sequential(dataset: &Dataset, ctx: &RunContext) -> Result<Vec<AggregationResult>, PassError> {
    check_inputs(dataset)?;
    Pass::ALL.iter().map(|pass| pass.run(dataset, ctx)).collect()
}

/// Run every pass on the blocking pool, one task per pass.
///
/// Results come back in [`Pass::ALL`] order regardless of completion order.
pub async fn run_concurrent(
    dataset: Arc<Dataset>,
    ctx: Arc<RunContext>,
) -> Result<Vec<AggregationResult>> {
    check_inputs(&dataset)?;

    let handles = Pass::ALL.iter().map(|pass| {
        let pass = *pass;
        let dataset = Arc::clone(&dataset);
        let ctx = Arc::clone(&ctx);
        tokio::task::spawn_blocking(move || pass.run(&dataset, &ctx))
    });

    let mut results = Vec::with_capacity(Pass::ALL.len());
    for (pass, joined) in Pass::ALL.iter().zip(join_all(handles).await) {
        let result = joined.with_context(|| format!("{} pass panicked", pass.name()))??;
        results.push(result);
    }

    info!("Computed {} documents", results.len());
    Ok(results)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::{IngestDiagnostics, Location, Recipient, Record};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    /// Fluent construction of synthetic records.
    pub struct RecordBuilder(Record);

    impl RecordBuilder {
        pub fn new(project_id: &str) -> Self {
            Self(Record {
                project_id: project_id.to_string(),
                ..Record::default()
            })
        }

        pub fn ministry(mut self, code: &str) -> Self {
            self.0.ministry_code = Some(code.to_string());
            self
        }

        pub fn sponsor(mut self, code: &str) -> Self {
            self.0.sponsor_code = Some(code.to_string());
            self
        }

        pub fn recipient(mut self, name: &str) -> Self {
            self.0.recipient = Some(Recipient::Named(name.to_string()));
            self
        }

        pub fn anonymized(mut self) -> Self {
            self.0.recipient = Some(Recipient::AnonymizedGroup);
            self
        }

        pub fn topic(mut self, code: &str, description: &str) -> Self {
            self.0.topic_code = Some(code.to_string());
            self.0.topic_description = (!description.is_empty()).then(|| description.to_string());
            self
        }

        /// Amount in whole euros.
        pub fn amount(mut self, euros: i64) -> Self {
            self.0.amount = Some(Decimal::from(euros));
            self
        }

        pub fn start(mut self, year: i32, month: u32, day: u32) -> Self {
            self.0.start_date = NaiveDate::from_ymd_opt(year, month, day);
            self
        }

        pub fn end(mut self, year: i32, month: u32, day: u32) -> Self {
            self.0.end_date = NaiveDate::from_ymd_opt(year, month, day);
            self
        }

        pub fn domestic(mut self, state: &str, city: &str) -> Self {
            self.0.location = Location {
                country: Some("Deutschland".to_string()),
                state: (!state.is_empty()).then(|| state.to_string()),
                city: (!city.is_empty()).then(|| city.to_string()),
            };
            self
        }

        pub fn abroad(mut self, country: &str, city: &str) -> Self {
            self.0.location = Location {
                country: Some(country.to_string()),
                state: None,
                city: Some(city.to_string()),
            };
            self
        }

        pub fn funding_type(mut self, name: &str) -> Self {
            self.0.funding_type = Some(name.to_string());
            self
        }

        pub fn profile(mut self, name: &str) -> Self {
            self.0.funding_profile = Some(name.to_string());
            self
        }

        pub fn joint(mut self, name: &str) -> Self {
            self.0.joint_project = Some(name.to_string());
            self
        }

        pub fn title(mut self, title: &str) -> Self {
            self.0.title = Some(title.to_string());
            self
        }

        pub fn build(self) -> Record {
            self.0
        }
    }

    /// A dataset whose header carried every known column.
    pub fn dataset(records: Vec<Record>) -> Dataset {
        let diagnostics = IngestDiagnostics {
            rows_read: records.len(),
            ..IngestDiagnostics::default()
        };
        Dataset::new(records, Column::ALL.into_iter().collect(), diagnostics, "Suchliste.csv")
    }

    pub fn context() -> RunContext {
        RunContext::new(
            Config::default(),
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            Utc.with_ymd_and_hms(2025, 12, 1, 6, 0, 0).unwrap(),
        )
    }

    /// A small but varied catalog touching every grouping edge case.
    pub fn sample() -> Vec<Record> {
        vec![
            RecordBuilder::new("01A")
                .ministry("BMFTR")
                .sponsor("PTJ")
                .recipient("Universität Bonn")
                .topic("A1", "Grundlagenforschung")
                .amount(1_000_000)
                .start(2019, 3, 15)
                .end(2022, 3, 14)
                .domestic("Nordrhein-Westfalen", "Bonn")
                .funding_type("Zuschuss")
                .profile("Forschung")
                .joint("Quantensensorik")
                .title("Quantensensorik für medizinische Bildgebung")
                .build(),
            RecordBuilder::new("01B")
                .ministry("BMFTR")
                .sponsor("PTJ")
                .recipient("Fraunhofer")
                .topic("A1", "")
                .amount(2_500_000)
                .start(2021, 1, 1)
                .end(2023, 12, 31)
                .domestic("Bayern", "München")
                .funding_type("Zuschuss")
                .profile("Forschung")
                .joint("Quantensensorik")
                .title("Quantensensorik in der Fertigung")
                .build(),
            RecordBuilder::new("02A")
                .ministry("BMWE")
                .sponsor("VDI/VDE")
                .anonymized()
                .topic("B2", "Energie")
                .amount(300_000)
                .start(2020, 6, 1)
                .end(2021, 5, 31)
                .domestic("Bayern", "Nürnberg")
                .funding_type("Zuweisung")
                .title("Batteriespeicher Pilotanlage")
                .build(),
            RecordBuilder::new("02B")
                .ministry("BMWE")
                .sponsor("VDI/VDE")
                .anonymized()
                .topic("B2", "Energie")
                .amount(450_000)
                .start(2024, 9, 1)
                .end(2027, 8, 31)
                .domestic("", "")
                .funding_type("Zuweisung")
                .title("Batteriespeicher Netzintegration")
                .build(),
            RecordBuilder::new("03A")
                .ministry("BMV")
                .recipient("Universität Bonn")
                .amount(750_000)
                .start(2026, 2, 1)
                .end(2028, 1, 31)
                .abroad("Frankreich", "Paris")
                .title("Autonome Schifffahrt")
                .build(),
            RecordBuilder::new("03B")
                .ministry("BMV")
                .sponsor("TÜV")
                .recipient("Hafen GmbH")
                .start(2018, 1, 1)
                .domestic("Hamburg", "Hamburg")
                .build(),
            RecordBuilder::new("04A")
                .recipient("Fraunhofer")
                .amount(125_000)
                .start(1975, 1, 1)
                .end(1976, 1, 1)
                .build(),
        ]
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Foerderkatalog - funding catalog dashboard builder
///
/// Turns the federal funding catalog export (Suchliste.csv) into the
/// pre-aggregated JSON documents the dashboard renders.
///
/// Examples:
///   foerderkatalog run
///   foerderkatalog run --input Suchliste.csv --output output
///   foerderkatalog --reference-date 2025-12-01 update --web-data web/data
///   foerderkatalog validate --input Suchliste.csv
///   foerderkatalog init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .foerderkatalog.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Date treated as "today" for year windows and the forecast split
    ///
    /// Defaults to the local date. Pin it to reproduce a run.
    #[arg(
        long,
        global = true,
        value_name = "YYYY-MM-DD",
        env = "FOERDERKATALOG_REFERENCE_DATE"
    )]
    pub reference_date: Option<NaiveDate>,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ingest the catalog export and write every dashboard document
    Run(RunArgs),

    /// Validate the export, run, and publish the documents to the dashboard
    Update(UpdateArgs),

    /// Ingest only and report parse diagnostics
    Validate(ValidateArgs),

    /// Generate a default .foerderkatalog.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Catalog export to read
    #[arg(short, long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Directory the documents are written to
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Run aggregation passes one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    /// Catalog export to read
    #[arg(short, long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Directory the documents are written to
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Directory the dashboard serves its data from
    #[arg(long, value_name = "DIR")]
    pub web_data: Option<PathBuf>,

    /// Skip the input validation step
    #[arg(long)]
    pub skip_validation: bool,

    /// Run aggregation passes one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Catalog export to read
    #[arg(short, long, value_name = "CSV")]
    pub input: Option<PathBuf>,
}

/// Paths a command may override.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandPaths<'a> {
    pub input: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub web_data: Option<&'a Path>,
}

impl Command {
    /// Paths given explicitly on the command line.
    pub fn paths(&self) -> CommandPaths<'_> {
        match self {
            Command::Run(run) => CommandPaths {
                input: run.input.as_deref(),
                output: run.output.as_deref(),
                web_data: None,
            },
            Command::Update(update) => CommandPaths {
                input: update.input.as_deref(),
                output: update.output.as_deref(),
                web_data: update.web_data.as_deref(),
            },
            Command::Validate(validate) => CommandPaths {
                input: validate.input.as_deref(),
                ..CommandPaths::default()
            },
            Command::InitConfig => CommandPaths::default(),
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        let paths = self.command.paths();

        if let Some(output) = paths.output {
            if output.exists() && !output.is_dir() {
                return Err(format!(
                    "Output path is not a directory: {}",
                    output.display()
                ));
            }
        }

        if let Some(web_data) = paths.web_data {
            if web_data.exists() && !web_data.is_dir() {
                return Err(format!(
                    "Web data path is not a directory: {}",
                    web_data.display()
                ));
            }
        }

        if let Some(input) = paths.input {
            if input.is_dir() {
                return Err(format!("Input path is a directory: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

//! Foerderkatalog - funding catalog dashboard builder
//!
//! A CLI tool that turns the federal funding catalog export into the
//! fixed set of pre-aggregated JSON documents a static dashboard renders.
//!
//! Exit codes:
//!   0 - Success (individual rows may have been skipped)
//!   1 - Fatal error (missing input, wrong delimiter or encoding, missing
//!       column, I/O failure, invalid arguments)

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod report;

use analysis::RunContext;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use cli::{Args, Command, UpdateArgs};
use config::{Config, CONFIG_FILE_NAME};
use ingest::{CsvIngestor, IngestOptions};
use models::Dataset;
use report::RunSummary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Foerderkatalog v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_command(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .foerderkatalog.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize paths, ranking sizes, and the forecast.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run_command(args: Args) -> Result<()> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match &args.command {
        Command::Run(run) => {
            run_pipeline(config, run.sequential, args.quiet).await?;
        }
        Command::Update(update) => handle_update(config, update, args.quiet).await?,
        Command::Validate(_) => handle_validate(&config, args.quiet)?,
        Command::InitConfig => handle_init_config()?,
    }

    Ok(())
}

/// Where a finished run left its documents.
struct RunOutcome {
    output_dir: PathBuf,
    generated_at: DateTime<Utc>,
}

fn load_dataset(config: &Config, quiet: bool) -> Result<Dataset> {
    let options = IngestOptions::try_from(&config.ingest)?.with_progress(!quiet);
    let dataset = CsvIngestor::new(options).ingest_path(&config.general.input)?;

    if dataset.is_empty() {
        warn!("Input contains no data rows; every document will be empty");
    } else {
        info!("Ingested {} records from {}", dataset.len(), dataset.source());
    }
    Ok(dataset)
}

/// Ingest, aggregate, and write every document.
async fn run_pipeline(config: Config, sequential: bool, quiet: bool) -> Result<RunOutcome> {
    let start_time = Instant::now();

    let reference_date = config
        .general
        .reference_date
        .unwrap_or_else(|| Local::now().date_naive());
    info!("Reference date: {}", reference_date);

    // Step 1: Read the export
    if !quiet {
        println!("📥 Reading {}", config.general.input.display());
    }
    let dataset = Arc::new(load_dataset(&config, quiet)?);

    // Step 2: Compute every document before writing any of them
    let output_dir = config.general.output_dir.clone();
    let ctx = Arc::new(RunContext::new(config, reference_date, Utc::now()));
    let results = if sequential {
        analysis::run_sequential(&dataset, &ctx)?
    } else {
        analysis::run_concurrent(Arc::clone(&dataset), Arc::clone(&ctx)).await?
    };

    // Step 3: Write the documents
    let written = report::write_documents(&output_dir, &results)?;

    if !quiet {
        let summary = RunSummary {
            source: dataset.source(),
            diagnostics: dataset.diagnostics(),
            output_dir: Some(&output_dir),
            documents: &written,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        };
        print!("{}", report::generate_run_summary(&summary));
        println!("\n✅ Run complete! Documents saved to: {}", output_dir.display());
    }

    Ok(RunOutcome {
        output_dir,
        generated_at: ctx.generated_at,
    })
}

/// Validate the export, run, and publish the documents to the dashboard.
async fn handle_update(config: Config, update: &UpdateArgs, quiet: bool) -> Result<()> {
    let input = config.general.input.clone();
    let web_data_dir = config.general.web_data_dir.clone();

    if update.skip_validation {
        info!("Skipping input validation");
    } else {
        let options = IngestOptions::try_from(&config.ingest)?;
        let check = ingest::inspect_export(&input, &options)?;
        if !check.has_project_ids {
            bail!(
                "{} does not look like a catalog export: the header has no FKZ column",
                input.display()
            );
        }
        if check.looks_truncated() {
            warn!(
                "{} is only {} bytes; the download may be incomplete",
                input.display(),
                check.size
            );
        }
    }

    let outcome = run_pipeline(config, update.sequential, quiet).await?;

    let published = report::publish_documents(&outcome.output_dir, &web_data_dir)?;
    report::write_last_update(&web_data_dir, outcome.generated_at)?;

    if !quiet {
        println!(
            "🌐 Published {} documents to {}",
            published.len(),
            web_data_dir.display()
        );
    }
    Ok(())
}

/// Ingest only and report diagnostics.
fn handle_validate(config: &Config, quiet: bool) -> Result<()> {
    let start_time = Instant::now();
    let dataset = load_dataset(config, quiet)?;

    let summary = RunSummary {
        source: dataset.source(),
        diagnostics: dataset.diagnostics(),
        output_dir: None,
        documents: &[],
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };
    print!("{}", report::generate_run_summary(&summary));
    println!("\n✅ {} is readable.", config.general.input.display());
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

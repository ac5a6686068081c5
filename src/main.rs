// Allow dead code for functions that are part of the API surface but not used in all code paths
#![allow(dead_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod catalog;
mod category;
mod cli;
mod config;
mod db;
mod extract;
mod fetch;
mod logger;
mod mapper;
mod merge;
mod pipeline;
mod record;
mod stats;
mod urls;
mod writer;

use catalog::CityRecord;
use cli::{Cli, Commands};
use config::AppConfig;
use logger::{SessionLogger, VerbosityLevel};
use pipeline::Pipeline;
use stats::StatsTracker;
use writer::{Format, SessionWriter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --init before any other processing
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("Created default configuration file at: {}", path.display());
                println!("Edit this file to customize settings, then run cityscraper again.");
                return Ok(());
            }
            Err(e) => {
                eprintln!("Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Load configuration, offering to create it interactively when missing
    let mut app_config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config() {
            Ok(Some(created_path)) => {
                println!("Created default configuration file at: {}", created_path.display());
                println!("Edit this file to customize settings, then run cityscraper again.");
                return Ok(());
            }
            Ok(None) => {
                eprintln!("Configuration file not found at: {}", path.display());
                eprintln!("Run with --init to create a default configuration file.");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    apply_cli_overrides(&mut app_config, &cli);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.validate() {
        eprintln!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    match &cli.command {
        Some(Commands::Merge { session_dir }) => run_merge(Path::new(session_dir)),
        Some(Commands::Upload {
            dataset,
            reset_table,
            yes,
            database,
        }) => run_upload(&app_config, dataset, *reset_table, *yes, database.as_deref()),
        None => run_scrape(&app_config, &cli).await,
    }
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(format) = &cli.output_format {
        config.output.format = format.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.clone();
    }
    if let Some(delay) = cli.request_delay_ms {
        config.scrape.request_delay_ms = delay;
    }
    if let Some(retries) = cli.max_retries {
        config.scrape.max_retries = retries;
    }
}

async fn run_scrape(config: &AppConfig, cli: &Cli) -> Result<()> {
    let cities = load_cities_for_run(cli)?;
    if cities.is_empty() {
        eprintln!("No cities to scrape.");
        std::process::exit(1);
    }

    let categories = cli.selected_categories();
    let format: Format = config
        .output
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let started_at = Utc::now();
    let writer = SessionWriter::create(Path::new(&config.output.output_dir), format, started_at)?;
    let session_dir = writer.session_dir().to_path_buf();

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    let logger = match &cli.log_file {
        Some(path) => SessionLogger::with_log_file(verbosity, path.clone()),
        None => SessionLogger::new(verbosity),
    };

    logger.info(&format!(
        "Starting scrape of {} cities x {} categories -> {}",
        cities.len(),
        categories.len(),
        session_dir.display()
    ));

    let mut tracker = StatsTracker::new(started_at);
    let pipeline = Pipeline::new(config, writer, logger.clone())?;
    pipeline.run(&cities, &categories, started_at, &mut tracker).await?;
    tracker.finish();

    let report = tracker.report();
    if let Err(e) = tracker.write_report(&session_dir) {
        logger.error(&format!("Failed to write session report: {}", e));
    }
    logger.print_final_summary(&report, &session_dir);

    if logger.is_log_export_enabled() {
        match logger.export_logs() {
            Ok(()) => {
                if let Some(path) = &cli.log_file {
                    println!("Execution logs exported to: {} ({} entries)", path, logger.log_count());
                }
            }
            Err(e) => eprintln!("Warning: failed to export logs: {}", e),
        }
    }

    Ok(())
}

fn load_cities_for_run(cli: &Cli) -> Result<Vec<CityRecord>> {
    if let Some(input_file) = &cli.input_file {
        return catalog::load_cities(Path::new(input_file));
    }

    // Single-city mode: --city is a slug or a full city page URL.
    let identifier = cli.city.clone().unwrap_or_default();
    let city_name = if identifier.starts_with("http") {
        urls::extract_city_slug(&identifier)
            .ok_or_else(|| anyhow::anyhow!("Could not extract a city slug from URL: {}", identifier))?
            .replace('-', " ")
    } else {
        identifier.clone()
    };

    Ok(vec![CityRecord {
        city: city_name,
        country: cli.country.clone().unwrap_or_else(|| "Unknown".to_string()),
        region: cli.region.clone().unwrap_or_default(),
        slug_or_url: identifier,
    }])
}

fn run_merge(session_dir: &Path) -> Result<()> {
    match merge::merge_session(session_dir) {
        Ok(summary) => {
            println!(
                "Merged {} files ({} rows, {} columns) into {}",
                summary.files_merged,
                summary.rows_written,
                summary.columns.len(),
                summary.output_path.display()
            );
            Ok(())
        }
        Err(merge::MergeError::NoFilesFound(dir)) => {
            eprintln!("No CSV files found under {}", dir.display());
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn run_upload(
    config: &AppConfig,
    dataset: &str,
    reset_table: bool,
    yes: bool,
    database_override: Option<&str>,
) -> Result<()> {
    let dataset_path = resolve_dataset_path(Path::new(dataset))?;
    let db_path = database_override.unwrap_or(&config.database.path);

    let mut uploader = db::Uploader::open(Path::new(db_path), &config.database.table)?;

    if reset_table {
        if !confirm_reset(&config.database.table, yes)? {
            eprintln!("Table reset not confirmed. Aborting upload.");
            std::process::exit(1);
        }
        uploader.create_or_reset_table()?;
    } else if !uploader.table_exists()? {
        // Creating an absent table is not destructive; no confirmation needed.
        uploader.create_or_reset_table()?;
    }

    let summary = uploader.import(&dataset_path)?;
    println!(
        "Imported {} of {} rows from {} into '{}'",
        summary.rows_imported,
        summary.rows_read,
        dataset_path.display(),
        config.database.table
    );

    if !summary.errors.is_empty() {
        eprintln!("{} row(s) failed to import:", summary.errors.len());
        for error in &summary.errors {
            eprintln!("  row {}: {}", error.row, error.message);
        }
    }

    Ok(())
}

/// Accept either a merged CSV file or a session directory containing one.
fn resolve_dataset_path(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        let merged = path.join(merge::MERGED_FILENAME);
        if !merged.exists() {
            anyhow::bail!(
                "{} has no {} - run `cityscraper merge {}` first",
                path.display(),
                merge::MERGED_FILENAME,
                path.display()
            );
        }
        return Ok(merged);
    }
    if !path.exists() {
        anyhow::bail!("Dataset not found: {}", path.display());
    }
    Ok(path.to_path_buf())
}

/// Interactive confirmation for the destructive table reset. Defaults to
/// "no"; in non-interactive mode --yes is the only way through.
fn confirm_reset(table: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !AppConfig::is_interactive() {
        eprintln!("--reset-table requires --yes in non-interactive mode.");
        return Ok(false);
    }

    print!("This will DROP and recreate table '{}', deleting all its rows. Continue? [y/N] ", table);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

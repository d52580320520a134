use anyhow::{Context, Result};
use clap::{Parser as _, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use trend_stitcher::analyzer::{AnalysisOrchestrator, AnalysisRun, BatchStatus, LogProgress, RunSettings};
use trend_stitcher::client::{DataLabClient, MeasurementClient, RetryingClient};
use trend_stitcher::config::{load_config_or_default, AppConfig};
use trend_stitcher::export::{export_result, select_groups};
use trend_stitcher::normalizer::normalize_groups;
use trend_stitcher::parser::{template_csv, CsvGroupParser, Parser};
use trend_stitcher::utils::{output_stem, today};

/// Comparable search-trend series for any number of keyword groups
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and stitch the groups listed in an input table
    Run {
        /// CSV with a group name column and an optional keywords column
        input: PathBuf,

        /// Output directory for result tables
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,

        /// Only export these groups (comma separated)
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },
    /// Write a starter input table
    Template {
        #[arg(default_value = "keywords_input.csv")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Template { path } => {
            fs::write(&path, template_csv())
                .with_context(|| format!("writing template to {}", path.display()))?;
            info!("Template written to {}", path.display());
            Ok(())
        }
        Command::Run {
            input,
            output_dir,
            select,
        } => {
            let mut config = load_config_or_default(&cli.config)?;
            config.apply_env(|key| std::env::var(key).ok());
            run(&config, input, output_dir, select).await
        }
    }
}

async fn run(config: &AppConfig, input: PathBuf, output_dir: PathBuf, select: Vec<String>) -> Result<()> {
    // Configuration problems must surface before any request is made.
    let settings = RunSettings::from_config(config)?;
    let credentials = config.credentials()?;

    let rows = CsvGroupParser::new()
        .parse_file(&input)
        .with_context(|| format!("reading {}", input.display()))?;
    let groups = normalize_groups(&rows, config.max_terms_per_group)?;
    info!("Loaded {} keyword groups, anchor: {}", groups.len(), groups[0].name());

    let datalab = DataLabClient::new(config, credentials)?;
    let client: Arc<dyn MeasurementClient> = if config.retries > 0 {
        Arc::new(RetryingClient::new(
            datalab,
            config.retries,
            Duration::from_millis(config.retry_backoff_millis),
        ))
    } else {
        Arc::new(datalab)
    };

    let orchestrator = AnalysisOrchestrator::new(client, settings).with_progress(LogProgress);
    let analysis = orchestrator.run(groups).await?;
    log_summary(&analysis);

    let selected = select_groups(&analysis.result, &select);
    if selected.is_empty() {
        warn!("Selection {:?} matched no groups, nothing exported", select);
        return Ok(());
    }
    export_result(&selected, &output_dir, &output_stem(today()))?;
    Ok(())
}

fn log_summary(analysis: &AnalysisRun) {
    for report in &analysis.reports {
        match &report.status {
            BatchStatus::Reference { rows } => info!("Batch {}: reference ({} rows)", report.index + 1, rows),
            BatchStatus::Merged { rows, dropped } => {
                info!("Batch {}: merged {} rows, dropped {}", report.index + 1, rows, dropped)
            }
            BatchStatus::Empty => warn!("Batch {} ({}): no data", report.index + 1, report.groups.join(", ")),
            BatchStatus::Skipped(reason) => {
                warn!("Batch {} ({}): skipped, {}", report.index + 1, report.groups.join(", "), reason)
            }
        }
        for failure in &report.failures {
            warn!("  segment {} failed: {}", failure.segment, failure.error);
        }
    }
    info!(
        "Anchor {}: {} rows across {} groups",
        analysis.anchor,
        analysis.result.len(),
        analysis.result.group_names().len()
    );
}

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::config::AnalyzerConfig;
use crate::cli::AnalyzeArgs;
use crate::discovery;
use crate::output::{CsvReportWriter, JsonReportWriter, ReportWriter, RunSummary};
use crate::pipeline::analyzer::ContentAnalyzer;
use crate::pipeline::fetcher::Fetcher;
use crate::pipeline::scheduler::{BatchOptions, BatchScheduler};

/// Discover URLs from a seed page and write them as a JSON list
pub async fn discover(
    url: String,
    limit: Option<usize>,
    depth: Option<u32>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = AnalyzerConfig::load_default()?;
    config.apply_env_overrides();

    if let Some(limit) = limit {
        config.discovery.max_pages = limit;
    }
    if let Some(depth) = depth {
        config.discovery.max_depth = depth;
    }

    let fetcher = Fetcher::new(&config.fetch)?;
    let urls = discovery::discover(&fetcher, &url, &config.discovery).await?;

    let output_path =
        output.unwrap_or_else(|| config.output.directory.join("discovered_urls.json"));
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {}", parent.display()))?;
    }

    let contents =
        serde_json::to_string_pretty(&urls).context("Failed to serialize URL list")?;
    std::fs::write(&output_path, contents)
        .context(format!("Failed to write URL list: {}", output_path.display()))?;

    info!("{} URLs written to {}", urls.len(), output_path.display());
    Ok(())
}

/// Run the batch fetch-and-analyze pipeline over a list of URLs
pub async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let mut config = AnalyzerConfig::load_default()?;
    config.apply_env_overrides();

    // Command line parameters win over file and environment values
    if let Some(batch_size) = args.batch_size {
        config.batch.batch_size = batch_size;
    }
    if let Some(workers) = args.workers {
        config.batch.max_workers = workers;
    }
    if let Some(delay) = args.delay {
        anyhow::ensure!(delay >= 0.0, "--delay cannot be negative");
        config.batch.inter_batch_delay_ms = (delay * 1000.0) as u64;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.batch.max_attempts = max_attempts;
    }
    if let Some(timeout) = args.timeout {
        config.fetch.timeout_secs = timeout;
    }
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.output.directory.clone());

    let urls = gather_urls(args.urls, args.urls_file).await?;
    anyhow::ensure!(!urls.is_empty(), "No URLs provided");
    info!("Analyzing {} URLs", urls.len());

    let fetcher = Arc::new(Fetcher::new(&config.fetch)?);
    let analyzer = Arc::new(ContentAnalyzer::new().context("Failed to build analyzer")?);
    let options = BatchOptions {
        batch_size: config.batch.batch_size,
        max_workers: config.batch.max_workers,
        inter_batch_delay: Duration::from_millis(config.batch.inter_batch_delay_ms),
        max_attempts: config.batch.max_attempts,
        retry_base_delay: Duration::from_millis(config.batch.retry_base_delay_ms),
        retry_max_delay: Duration::from_millis(config.batch.retry_max_delay_ms),
        delay_jitter: true,
    };

    let scheduler = BatchScheduler::new(fetcher, analyzer, options)?;

    // First Ctrl-C stops new work; in-flight fetches run to completion
    let cancel = scheduler.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run after in-flight fetches finish");
            cancel.cancel();
        }
    });

    let result = scheduler.run(urls).await;

    let json_path = output_dir.join("analysis.json");
    let csv_path = output_dir.join("analysis.csv");
    JsonReportWriter.write_report(&result, &json_path).await?;
    CsvReportWriter.write_report(&result, &csv_path).await?;

    let summary = RunSummary::from_result(&result);
    let stats = scheduler.stats().snapshot().await;

    info!("Results saved to:");
    info!("  JSON: {}", json_path.display());
    info!("  CSV:  {}", csv_path.display());
    info!("Statistics:");
    info!("  Total URLs: {}", summary.total);
    info!("  Successful: {}", summary.succeeded);
    info!("  Failed: {}", summary.failed);
    info!("  Success rate: {:.1}%", summary.success_rate);
    info!(
        "  Fetch attempts: {} ({} bytes downloaded)",
        stats.total_attempts, stats.bytes_downloaded
    );

    Ok(())
}

/// Merge positional URLs with the lines of an optional URLs file
async fn gather_urls(mut urls: Vec<String>, urls_file: Option<PathBuf>) -> Result<Vec<String>> {
    if let Some(path) = urls_file {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context(format!("Failed to read URLs file: {}", path.display()))?;
        urls.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }
    Ok(urls)
}

/// Show the effective configuration
pub async fn show_config() -> Result<()> {
    let mut config = AnalyzerConfig::load_default()?;
    config.apply_env_overrides();
    println!("Current configuration:");
    println!("{:#?}", config);
    Ok(())
}

/// Write the default configuration file
pub async fn init_config() -> Result<()> {
    let config = AnalyzerConfig::default();
    let path = config.save_as_default()?;
    println!("Default configuration written to {}", path.display());
    Ok(())
}

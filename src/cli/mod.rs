pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file (or set CONTENT_ANALYZER_LOG_FILE)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover URLs from a seed page
    Discover {
        /// Seed URL to collect links from
        #[arg(required = true)]
        url: String,

        /// Maximum number of URLs to collect
        #[arg(short, long)]
        limit: Option<usize>,

        /// Maximum link depth below the seed page
        #[arg(short, long)]
        depth: Option<u32>,

        /// Output file for the discovered URL list
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch and analyze a list of URLs in batches
    Analyze(AnalyzeArgs),

    /// Show or initialize the configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

/// Arguments for the analyze command
#[derive(Args)]
pub struct AnalyzeArgs {
    /// URLs to analyze
    pub urls: Vec<String>,

    /// File with one URL per line ('#' lines are ignored)
    #[arg(long)]
    pub urls_file: Option<PathBuf>,

    /// Number of URLs per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Concurrent workers within a batch
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Delay between batches in seconds
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Total fetch attempts per URL
    #[arg(short, long)]
    pub max_attempts: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Directory for the JSON and CSV reports
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Discover {
            url,
            limit,
            depth,
            output,
        } => {
            info!("Discovering URLs from {}", url);
            commands::discover(url, limit, depth, output).await
        }
        Commands::Analyze(args) => commands::analyze(args).await,
        Commands::Config { init } => {
            if init {
                commands::init_config().await
            } else {
                commands::show_config().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_log_file_flag_parses() {
        let cli = Cli::try_parse_from(["analyzer", "--log-file", "/tmp/run.log", "config"]).unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/run.log")));

        let cli = Cli::try_parse_from(["analyzer", "config"]).unwrap();
        assert_eq!(cli.log_file, None);
    }
}

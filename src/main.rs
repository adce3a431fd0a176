use anyhow::Result;
use tracing::{error, info};

use content_analyzer::cli;
use content_analyzer::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Initialize logging
    let log_file = logging::resolve_log_file(args.log_file.clone());
    logging::init_logging(args.verbose, log_file)?;

    info!("Starting Content Analyzer v{}", env!("CARGO_PKG_VERSION"));

    // Process commands
    match cli::process_command(args).await {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e)
        }
    }
}

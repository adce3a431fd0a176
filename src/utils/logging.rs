use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable that supplies a log file when no flag is given
const LOG_FILE_ENV: &str = "CONTENT_ANALYZER_LOG_FILE";

/// Log file to use: the `--log-file` flag wins over the environment
pub fn resolve_log_file(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| env::var(LOG_FILE_ENV).ok().map(PathBuf::from))
}

/// Initialize the logging system
///
/// Stderr output always; when `log_file` is set, the same events are
/// also appended to that file without ANSI escapes.
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("content_analyzer={}", level).parse()?)
        .add_directive("warn".parse()?);

    let stderr_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .context(format!("Failed to create log directory: {}", parent.display()))?;
                }
            }
            let file = fs::File::create(&path)
                .context(format!("Failed to create log file: {}", path.display()))?;
            let file_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file);
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_environment() {
        env::set_var(LOG_FILE_ENV, "/tmp/from_env.log");
        let resolved = resolve_log_file(Some(PathBuf::from("/tmp/from_flag.log")));
        env::remove_var(LOG_FILE_ENV);
        assert_eq!(resolved, Some(PathBuf::from("/tmp/from_flag.log")));
    }

    #[test]
    fn test_init_logging_creates_log_file() {
        let path = env::temp_dir().join(format!("analyzer_test_{}_run.log", std::process::id()));

        // init() installs the global subscriber; only this test does so.
        init_logging(true, Some(path.clone())).unwrap();

        assert!(path.exists());
        let _ = fs::remove_file(&path);
    }
}

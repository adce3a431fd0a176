use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyzerConfig {
    pub fetch: FetchSettings,
    pub batch: BatchSettings,
    pub discovery: DiscoverySettings,
    pub output: OutputSettings,
}

/// HTTP fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User agents rotated at random, one per request
    pub user_agents: Vec<String>,

    /// Optional HTTP proxy URL
    pub proxy: Option<String>,
}

/// Batch pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// URLs processed per batch
    pub batch_size: usize,

    /// Concurrent pipelines within a batch (must not exceed batch_size)
    pub max_workers: usize,

    /// Delay between batches in milliseconds
    pub inter_batch_delay_ms: u64,

    /// Total fetch attempts allowed per URL
    pub max_attempts: u32,

    /// Base retry backoff in milliseconds; doubles per attempt
    pub retry_base_delay_ms: u64,

    /// Upper bound on the retry backoff in milliseconds
    pub retry_max_delay_ms: u64,
}

/// URL discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Maximum number of URLs to collect, seed included
    pub max_pages: usize,

    /// Maximum link depth below the seed page
    pub max_depth: u32,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory where reports are written
    pub directory: PathBuf,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".to_string(),
            ],
            proxy: None,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_workers: 3,
            inter_batch_delay_ms: 1000,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_depth: 2,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
        }
    }
}

impl AnalyzerConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        if let Some(proj_dirs) =
            directories::ProjectDirs::from("com", "content-analyzer", "content-analyzer")
        {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        }
    }

    /// Path of the default configuration file
    pub fn default_config_path() -> PathBuf {
        Self::config_dir().join("default.yaml")
    }

    /// Load the default configuration, falling back to built-in defaults
    /// when no file exists yet
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            debug!("No configuration file found, using built-in defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save the configuration as the default configuration file
    pub fn save_as_default(&self) -> Result<PathBuf> {
        let config_path = Self::default_config_path();

        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents =
            serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        fs::write(&config_path, contents).context(format!(
            "Failed to write configuration file: {}",
            config_path.display()
        ))?;

        info!("Configuration written to {}", config_path.display());
        Ok(config_path)
    }

    /// Apply `CONTENT_ANALYZER_*` environment variable overrides
    ///
    /// Unparseable values are ignored with a warning rather than
    /// failing the run.
    pub fn apply_env_overrides(&mut self) {
        if let Some(timeout) = read_env_parsed::<u64>("CONTENT_ANALYZER_TIMEOUT") {
            self.fetch.timeout_secs = timeout;
        }
        if let Some(delay) = read_env_parsed::<f64>("CONTENT_ANALYZER_DELAY") {
            if delay >= 0.0 {
                self.batch.inter_batch_delay_ms = (delay * 1000.0) as u64;
            } else {
                warn!("Ignoring negative CONTENT_ANALYZER_DELAY");
            }
        }
        if let Some(retries) = read_env_parsed::<u32>("CONTENT_ANALYZER_RETRIES") {
            self.batch.max_attempts = retries;
        }
        if let Ok(proxy) = std::env::var("CONTENT_ANALYZER_PROXY") {
            if !proxy.is_empty() {
                self.fetch.proxy = Some(proxy);
            }
        }
    }
}

fn read_env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring unparseable {} value: {}", name, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.batch.batch_size, 5);
        assert!(config.batch.max_workers <= config.batch.batch_size);
        assert_eq!(config.batch.max_attempts, 3);
        assert_eq!(config.batch.inter_batch_delay_ms, 1000);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert!(!config.fetch.user_agents.is_empty());
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let config = AnalyzerConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AnalyzerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.batch.batch_size, config.batch.batch_size);
        assert_eq!(parsed.fetch.timeout_secs, config.fetch.timeout_secs);
        assert_eq!(parsed.output.directory, config.output.directory);
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::convert::PollSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Conversion service configuration
    pub api: ApiConfig,

    /// Polling behaviour
    pub polling: PollingConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the conversion service
    pub base_url: String,

    /// Value sent in the target-host header
    pub host: String,

    /// Service credential (RAPIDAPI_KEY / --api-key take precedence)
    pub key: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Poll ticks before giving up
    pub max_attempts: u32,

    /// Delay between status checks in milliseconds
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for downloaded MP3 files (current directory if unset)
    pub download_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://youtube-mp36.p.rapidapi.com".to_string(),
            host: "youtube-mp36.p.rapidapi.com".to_string(),
            key: None,
            request_timeout_secs: 20,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        let defaults = PollSettings::default();
        Self {
            max_attempts: defaults.max_attempts,
            interval_ms: defaults.interval.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Load and validate a configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("ytmp3").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("API base URL must use HTTP or HTTPS protocol");
        }

        if self.api.host.trim().is_empty() {
            anyhow::bail!("API host must be configured");
        }

        if self.polling.interval_ms == 0 {
            anyhow::bail!("Polling interval must be greater than zero");
        }

        Ok(())
    }

    /// Apply a credential given on the command line or in the environment
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api.key = Some(key);
        }
        self
    }

    /// The service credential, required before any conversion
    pub fn api_key(&self) -> Result<&str> {
        self.api
            .key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("No API key configured. Set RAPIDAPI_KEY, pass --api-key, or add api.key to the config file")
    }

    /// Polling bounds for the controller
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            max_attempts: self.polling.max_attempts,
            interval: Duration::from_millis(self.polling.interval_ms),
        }
    }

    /// Directory where downloads land
    pub fn download_dir(&self) -> Result<PathBuf> {
        match &self.app.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Could not determine current directory"),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  API Base URL: {}", self.api.base_url);
        println!("  API Host: {}", self.api.host);
        println!(
            "  API Key: {}",
            if self.api_key().is_ok() { "configured" } else { "not set" }
        );
        println!("  Request Timeout: {}s", self.api.request_timeout_secs);
        println!("  Max Attempts: {}", self.polling.max_attempts);
        println!("  Poll Interval: {}ms", self.polling.interval_ms);
        if let Some(dir) = &self.app.download_dir {
            println!("  Download Dir: {}", dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let config = Config::default();
        assert_eq!(config.api.host, "youtube-mp36.p.rapidapi.com");
        assert_eq!(config.polling.max_attempts, 30);
        assert_eq!(config.poll_settings().interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
        assert!(config.api_key().is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.api.key = Some("abc123".to_string());
        config.polling.interval_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.api_key().unwrap(), "abc123");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(&path, "polling:\n  max_attempts: 5\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.polling.max_attempts, 5);
        assert_eq!(loaded.polling.interval_ms, 1000);
        assert_eq!(loaded.api, ApiConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_key_overrides_file_key() {
        let mut config = Config::default();
        config.api.key = Some("from-file".to_string());

        let config = config.with_api_key(Some("from-env".to_string()));
        assert_eq!(config.api_key().unwrap(), "from-env");

        let config = config.with_api_key(Some(String::new()));
        assert_eq!(config.api_key().unwrap(), "from-env");
    }
}

//! Configuration management for prospector
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Account identifier that keys the daily send quota
    #[serde(default = "default_account_id")]
    pub account_id: String,

    /// Only keep discovered businesses from this country
    #[serde(default = "default_country")]
    pub country: String,

    /// Business directory search API
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Email discovery service (optional enrichment)
    #[serde(default)]
    pub enrich: EnrichConfig,

    /// Website technical analysis
    #[serde(default)]
    pub analyze: AnalyzeConfig,

    /// Transactional email delivery
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Outreach sequence processing
    #[serde(default)]
    pub outreach: OutreachConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Business directory API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// API base URL
    #[serde(default = "default_directory_base_url")]
    pub base_url: String,

    /// Environment variable name holding the API key
    #[serde(default = "default_directory_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,

    /// Maximum results per category search
    #[serde(default = "default_directory_limit")]
    pub limit: u32,
}

/// Email discovery service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// API base URL
    #[serde(default = "default_enrich_base_url")]
    pub base_url: String,

    /// Environment variable name holding the API key; enrichment is
    /// skipped entirely when the variable is unset
    #[serde(default = "default_enrich_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_enrich_timeout")]
    pub timeout_secs: u64,

    /// Minimum confidence for an email-finder hit to be used
    #[serde(default = "default_enrich_min_confidence")]
    pub min_confidence: i64,
}

/// Website analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    /// Fetch timeout in seconds; a timeout marks the site broken
    #[serde(default = "default_analyze_timeout")]
    pub timeout_secs: u64,

    /// User agent string for analysis fetches
    #[serde(default = "default_analyze_user_agent")]
    pub user_agent: String,
}

/// Transactional email provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Provider API base URL
    #[serde(default = "default_delivery_base_url")]
    pub base_url: String,

    /// Environment variable name holding the provider API key
    #[serde(default = "default_delivery_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,

    /// Verified sender address; sends fail until this is set
    #[serde(default)]
    pub from_email: String,

    /// Sender display name
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Base URL of the hosted unsubscribe landing page; the recipient
    /// address is appended as `?email=`
    #[serde(default)]
    pub unsubscribe_base_url: String,
}

/// Outreach sequence processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    /// Delay between consecutive sends within one pass (milliseconds)
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,

    /// Maximum dispatch attempts before a step is marked failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,

    /// Retry backoff base in seconds, doubled per prior attempt
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: i64,

    /// Daily send limit applied when an account row is first created
    #[serde(default = "default_daily_limit")]
    pub daily_limit: i64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for prospector data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_id: default_account_id(),
            country: default_country(),
            directory: DirectoryConfig::default(),
            enrich: EnrichConfig::default(),
            analyze: AnalyzeConfig::default(),
            delivery: DeliveryConfig::default(),
            outreach: OutreachConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_base_url(),
            api_key_env: default_directory_api_key_env(),
            timeout_secs: default_directory_timeout(),
            limit: default_directory_limit(),
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            base_url: default_enrich_base_url(),
            api_key_env: default_enrich_api_key_env(),
            timeout_secs: default_enrich_timeout(),
            min_confidence: default_enrich_min_confidence(),
        }
    }
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_analyze_timeout(),
            user_agent: default_analyze_user_agent(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: default_delivery_base_url(),
            api_key_env: default_delivery_api_key_env(),
            timeout_secs: default_delivery_timeout(),
            from_email: String::new(),
            from_name: default_from_name(),
            unsubscribe_base_url: String::new(),
        }
    }
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            send_delay_ms: default_send_delay_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
            daily_limit: default_daily_limit(),
        }
    }
}

impl Config {
    /// Get the default base directory for prospector (~/.prospector)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prospector")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("leads.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("leads.db"),
            base_dir: base,
        };

        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the directory API key from environment
    pub fn directory_api_key(&self) -> Result<String> {
        std::env::var(&self.directory.api_key_env).map_err(|_| {
            Error::Config(format!("{} not configured", self.directory.api_key_env))
        })
    }

    /// Get the email discovery API key from environment, if set
    pub fn enrich_api_key(&self) -> Option<String> {
        std::env::var(&self.enrich.api_key_env).ok()
    }

    /// Get the email provider API key from environment
    pub fn delivery_api_key(&self) -> Result<String> {
        std::env::var(&self.delivery.api_key_env).map_err(|_| {
            Error::Config(format!(
                "{} not configured. Add your email provider API key to the environment.",
                self.delivery.api_key_env
            ))
        })
    }

    /// Resolved sender identity; the address must be a provider-verified
    /// sender, so an empty value is a configuration error
    pub fn sender(&self) -> Result<(String, String)> {
        if self.delivery.from_email.is_empty() {
            return Err(Error::Config(
                "delivery.from_email is not set; configure a verified sender address".to_string(),
            ));
        }
        Ok((
            self.delivery.from_email.clone(),
            self.delivery.from_name.clone(),
        ))
    }

    /// Check if prospector is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.account_id, "default");
        assert_eq!(parsed.country, "US");
        assert_eq!(parsed.outreach.daily_limit, 100);
        assert_eq!(parsed.outreach.max_attempts, 3);
    }

    #[test]
    fn test_load_from_missing_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(config.directory.limit, 50);
        assert_eq!(config.paths.db_file, tmp.path().join("leads.db"));
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.delivery.from_email = "outreach@example.com".to_string();
        config.save().unwrap();

        let loaded = Config::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(loaded.delivery.from_email, "outreach@example.com");
        let (email, name) = loaded.sender().unwrap();
        assert_eq!(email, "outreach@example.com");
        assert_eq!(name, "Website Services");
    }

    #[test]
    fn test_sender_requires_from_email() {
        let config = Config::default();
        assert!(config.sender().is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::ai::chat::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::animator::DEFAULT_TICK;
use crate::presentation::DEFAULT_PATTERN_PERIOD;
use crate::storage::FileStore;

/// On-disk config (`<config dir>/kelvin/config.json`). Every field is optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub reveal_interval_ms: Option<u64>,
    pub pattern_period_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("kelvin").join("config.json"))
    }
}

/// Values that win over the config file (command line, then environment)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

impl Overrides {
    /// `KELVIN_ENDPOINT` / `KELVIN_MODEL`, filling only what is still unset.
    pub fn with_env(mut self) -> Self {
        if self.endpoint.is_none() {
            self.endpoint = std::env::var("KELVIN_ENDPOINT").ok().filter(|v| !v.is_empty());
        }
        if self.model.is_none() {
            self.model = std::env::var("KELVIN_MODEL").ok().filter(|v| !v.is_empty());
        }
        self
    }
}

/// Fully resolved settings the client runs with
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: String,
    pub model: String,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub reveal_interval: Duration,
    pub pattern_period: Duration,
}

impl Settings {
    pub fn resolve(config: Config, overrides: Overrides) -> Result<Self> {
        let data_dir = match overrides.data_dir.or(config.data_dir) {
            Some(dir) => dir,
            None => FileStore::default_dir()?,
        };
        let export_dir = match overrides.export_dir.or(config.export_dir) {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        Ok(Self {
            endpoint: overrides
                .endpoint
                .or(config.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: overrides
                .model
                .or(config.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            data_dir,
            export_dir,
            reveal_interval: config
                .reveal_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TICK),
            pattern_period: config
                .pattern_period_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_PATTERN_PERIOD),
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("kelvin.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kelvin").join("config.json");
        let config = Config {
            model: Some("mixtral".to_string()),
            reveal_interval_ms: Some(8),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_parses() {
        let config: Config = serde_json::from_str(r#"{"endpoint":"http://localhost:8080"}"#).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.model, None);
    }

    #[test]
    fn test_resolve_defaults() {
        let overrides = Overrides {
            data_dir: Some(PathBuf::from("/tmp/kelvin-data")),
            export_dir: Some(PathBuf::from("/tmp/kelvin-out")),
            ..Overrides::default()
        };
        let settings = Settings::resolve(Config::default(), overrides).unwrap();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.model, "llama3-8b-8192");
        assert_eq!(settings.reveal_interval, Duration::from_millis(16));
        assert_eq!(settings.pattern_period, Duration::from_secs(5));
        assert_eq!(settings.log_path(), PathBuf::from("/tmp/kelvin-data/kelvin.log"));
    }

    #[test]
    fn test_overrides_beat_config() {
        let config = Config {
            endpoint: Some("http://config".to_string()),
            model: Some("config-model".to_string()),
            data_dir: Some(PathBuf::from("/config/data")),
            export_dir: Some(PathBuf::from("/config/out")),
            reveal_interval_ms: Some(0),
            pattern_period_secs: Some(10),
        };
        let overrides = Overrides {
            endpoint: Some("http://flag".to_string()),
            ..Overrides::default()
        };
        let settings = Settings::resolve(config, overrides).unwrap();
        assert_eq!(settings.endpoint, "http://flag");
        assert_eq!(settings.model, "config-model");
        assert_eq!(settings.data_dir, PathBuf::from("/config/data"));
        // Zero would spin; fall back to the default pace
        assert_eq!(settings.reveal_interval, DEFAULT_TICK);
        assert_eq!(settings.pattern_period, Duration::from_secs(10));
    }
}

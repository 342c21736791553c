use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::parser::{FieldOverrides, DEFAULT_THRESHOLD};
use crate::stats::{coerce_limit, DEFAULT_PRECISION, MAX_PRECISION};

/// Run configuration. Every key is optional in the JSON file; missing keys
/// keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct Config {
    /// Maximum number of URLs in the report; `null` for no limit
    #[serde(deserialize_with = "deserialize_limit")]
    pub report_size: Option<i64>,
    pub report_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Where the analyzer writes its own log; stderr when unset
    pub analyzer_log: Option<PathBuf>,
    pub report_template: Option<PathBuf>,
    pub parse_threshold: f64,
    pub round_precision: u32,
    pub field_patterns: FieldOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_size: Some(1000),
            report_dir: PathBuf::from("./reports"),
            log_dir: PathBuf::from("./log"),
            analyzer_log: None,
            report_template: None,
            parse_threshold: DEFAULT_THRESHOLD,
            round_precision: DEFAULT_PRECISION,
            field_patterns: FieldOverrides::default(),
        }
    }
}

fn deserialize_limit<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_limit(&value).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overridden key by key from the file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config file {:?}", path))?;

        info!(action = "loaded", component = "config", file_path = ?path, "Loaded config file");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.parse_threshold) {
            anyhow::bail!(
                "PARSE_THRESHOLD must be within [0, 1], got {}",
                self.parse_threshold
            );
        }

        if self.round_precision > MAX_PRECISION {
            anyhow::bail!(
                "ROUND_PRECISION must be at most {}, got {}",
                MAX_PRECISION,
                self.round_precision
            );
        }

        if let Some(size) = self.report_size {
            if size < 0 {
                anyhow::bail!("REPORT_SIZE must not be negative, got {}", size);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_keeps_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_overrides_single_keys() {
        let config = Config::from_json(r#"{"REPORT_SIZE": 10, "LOG_DIR": "/var/log/nginx"}"#).unwrap();

        assert_eq!(config.report_size, Some(10));
        assert_eq!(config.log_dir, PathBuf::from("/var/log/nginx"));
        assert_eq!(config.report_dir, PathBuf::from("./reports"));
        assert_eq!(config.parse_threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_report_size_coercion() {
        assert_eq!(Config::from_json(r#"{"REPORT_SIZE": "25"}"#).unwrap().report_size, Some(25));
        assert_eq!(Config::from_json(r#"{"REPORT_SIZE": null}"#).unwrap().report_size, None);
        assert!(Config::from_json(r#"{"REPORT_SIZE": "lots"}"#).is_err());
        assert!(Config::from_json(r#"{"REPORT_SIZE": -1}"#).is_err());
    }

    #[test]
    fn test_rejects_bad_threshold_and_unknown_keys() {
        assert!(Config::from_json(r#"{"PARSE_THRESHOLD": 1.2}"#).is_err());
        assert!(Config::from_json(r#"{"REPORT_SIZ": 10}"#).is_err());
    }

    #[test]
    fn test_rejects_oversized_precision() {
        assert!(Config::from_json(r#"{"ROUND_PRECISION": 400}"#).is_err());
        assert_eq!(Config::from_json(r#"{"ROUND_PRECISION": 15}"#).unwrap().round_precision, 15);
    }

    #[test]
    fn test_field_patterns() {
        let config = Config::from_json(r#"{"FIELD_PATTERNS": {"remote_addr": "[0-9.]+"}}"#).unwrap();
        assert_eq!(config.field_patterns.remote_addr.as_deref(), Some("[0-9.]+"));
        assert_eq!(config.field_patterns.request, None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("config.json"))).is_err());
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"REPORT_DIR": "out", "ROUND_PRECISION": 2}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.report_dir, PathBuf::from("out"));
        assert_eq!(config.round_precision, 2);
    }
}

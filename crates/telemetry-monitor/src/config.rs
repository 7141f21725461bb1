//! YAML configuration for the monitor.
//!
//! ```yaml
//! apitoken: "..."
//! metrics: [battery, temperatureMeasurement, switch]
//! ignore: [lqi]
//! interval: 120
//! database: smartthings
//! influx:
//!   url: http://localhost:8086
//! valuemap:
//!   door: { opening: 1, closing: 0 }
//! ```

use crate::ConfigError;
use anyhow::Context;
use influx_sink::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_APITOKEN: &str = "ST_INFLUX_APITOKEN";
pub const ENV_INFLUX_PASSWORD: &str = "ST_INFLUX_INFLUX_PASSWORD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub apitoken: String,
    /// Capability ids whose readings are collected.
    pub metrics: Vec<String>,
    /// Metric keys never written.
    pub ignore: Vec<String>,
    /// Poll interval in seconds.
    pub interval: u64,
    pub database: String,
    /// Value of the fixed `source` tag.
    pub source: String,
    pub battery_stale_hours: u32,
    pub influx: InfluxConfig,
    pub retry: RetryConfig,
    /// Per metric key: encoded state -> number.
    pub valuemap: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            apitoken: String::new(),
            metrics: vec![
                "battery".to_string(),
                "temperatureMeasurement".to_string(),
                "switch".to_string(),
            ],
            ignore: Vec::new(),
            interval: 120,
            database: "smartthings".to_string(),
            source: crate::SOURCE_TAG_DEFAULT.to_string(),
            battery_stale_hours: 24,
            influx: InfluxConfig::default(),
            retry: RetryConfig::default(),
            valuemap: BTreeMap::new(),
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            username: None,
            password: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            delay_ms: policy.delay.as_millis() as u64,
            max_jitter_ms: policy.max_jitter.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_millis(self.delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Structural checks; the token is checked separately because the mock
    /// backend runs without one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.metrics.is_empty() {
            return Err(ConfigError::NoMetrics);
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::NoDatabase);
        }
        Ok(())
    }

    pub fn require_token(&self) -> Result<&str, ConfigError> {
        let token = self.apitoken.trim();
        if token.is_empty() {
            Err(ConfigError::MissingToken)
        } else {
            Ok(token)
        }
    }

    /// Overlay secrets from the environment (or any other lookup).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_APITOKEN).filter(|v| !v.is_empty()) {
            self.apitoken = token;
        }
        if let Some(password) = lookup(ENV_INFLUX_PASSWORD).filter(|v| !v.is_empty()) {
            self.influx.password = Some(password);
        }
    }
}

/// Read a YAML config file and overlay environment secrets.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<MonitorConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    let mut config: MonitorConfig = if raw.trim().is_empty() {
        MonitorConfig::default()
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = MonitorConfig::default();
        assert_eq!(config.interval, 120);
        assert_eq!(config.database, "smartthings");
        assert_eq!(config.source, "docker");
        assert_eq!(config.retry.attempts, 10);
        assert_eq!(config.retry.delay_ms, 100);
        assert!(config.validate().is_ok());
        assert_eq!(config.require_token(), Err(ConfigError::MissingToken));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "apitoken: abc\nmetrics: [battery]\nignore: [lqi, rssi]\ninterval: 300\nvaluemap:\n  door:\n    opening: 1\n    closing: 0\n"
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.metrics, vec!["battery".to_string()]);
        assert_eq!(config.ignore.len(), 2);
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.database, "smartthings");
        assert_eq!(config.valuemap["door"]["opening"], 1.0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config("/nonexistent/st-influx.yaml").unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let mut config = MonitorConfig::default();
        config.interval = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
        config.interval = 60;
        config.metrics.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoMetrics));
        config.metrics.push("switch".into());
        config.database = " ".into();
        assert_eq!(config.validate(), Err(ConfigError::NoDatabase));
    }

    #[test]
    fn overrides_replace_secrets() {
        let mut config = MonitorConfig::default();
        config.apply_overrides(|key| match key {
            ENV_APITOKEN => Some("from-env".to_string()),
            ENV_INFLUX_PASSWORD => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.require_token(), Ok("from-env"));
        assert_eq!(config.influx.password.as_deref(), Some("secret"));
    }
}

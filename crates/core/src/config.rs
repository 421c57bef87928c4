//! Configuration -- `httplog.toml` parsing and runtime settings.
//!
//! [`HttplogConfig`] is the top-level structure; each component reads only
//! its own section.
//!
//! # Loading priority
//! 1. CLI flags (applied by the binary)
//! 2. Environment variables (`HTTPLOG_MONITOR_THRESHOLD=50`)
//! 3. Config file (`httplog.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), httplog_core::error::HttplogError> {
//! use httplog_core::config::HttplogConfig;
//!
//! let config = HttplogConfig::load("httplog.toml").await?;
//! let config = HttplogConfig::parse("[monitor]\nthreshold = 20")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HttplogError};

/// Default alert threshold, in hits per second.
pub const DEFAULT_THRESHOLD: u64 = 100;
/// Default period between two stats reports, in seconds.
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 10;
/// Default alert window, in seconds.
pub const DEFAULT_ALERT_WINDOW_SECS: u64 = 120;
/// Default tailer poll interval, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// httplog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttplogConfig {
    /// Process-wide settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Monitored file and aggregation timers
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Prometheus exporter
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl HttplogConfig {
    /// Load a TOML file, then apply environment overrides and validate.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HttplogError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file without environment overrides or validation.
    ///
    /// The file may legitimately leave `monitor.log_file` empty when the
    /// path is provided on the command line, so validation is left to the
    /// caller once every layer has been applied.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HttplogError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HttplogError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HttplogError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, HttplogError> {
        toml::from_str(toml_str).map_err(|e| {
            HttplogError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Override fields from environment variables.
    ///
    /// Naming: `HTTPLOG_{SECTION}_{FIELD}`, e.g. `HTTPLOG_MONITOR_LOG_FILE`.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "HTTPLOG_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "HTTPLOG_GENERAL_LOG_FORMAT");

        // Monitor
        override_string(&mut self.monitor.log_file, "HTTPLOG_MONITOR_LOG_FILE");
        override_u64(&mut self.monitor.threshold, "HTTPLOG_MONITOR_THRESHOLD");
        override_u64(
            &mut self.monitor.stats_interval_secs,
            "HTTPLOG_MONITOR_STATS_INTERVAL_SECS",
        );
        override_u64(
            &mut self.monitor.alert_window_secs,
            "HTTPLOG_MONITOR_ALERT_WINDOW_SECS",
        );
        override_u64(
            &mut self.monitor.poll_interval_ms,
            "HTTPLOG_MONITOR_POLL_INTERVAL_MS",
        );
        override_bool(&mut self.monitor.color, "HTTPLOG_MONITOR_COLOR");

        // Metrics
        override_bool(&mut self.metrics.enabled, "HTTPLOG_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "HTTPLOG_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "HTTPLOG_METRICS_PORT");
    }

    /// Check every field against its domain.
    pub fn validate(&self) -> Result<(), HttplogError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.monitor.log_file.is_empty() {
            return Err(invalid("monitor.log_file", "a log file path is required"));
        }
        if self.monitor.threshold == 0 {
            return Err(invalid(
                "monitor.threshold",
                "must be at least 1 (0 would alert on an empty window)",
            ));
        }
        if self.monitor.stats_interval_secs == 0 {
            return Err(invalid("monitor.stats_interval_secs", "must be at least 1"));
        }
        if self.monitor.alert_window_secs == 0 {
            return Err(invalid("monitor.alert_window_secs", "must be at least 1"));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(invalid("monitor.poll_interval_ms", "must be at least 1"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must not be 0 when metrics are enabled"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> HttplogError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Diagnostic log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Diagnostic log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Monitored file and aggregation timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Access log to follow
    pub log_file: String,
    /// Alert threshold in hits per second, at least 1
    pub threshold: u64,
    /// Seconds between two stats reports
    pub stats_interval_secs: u64,
    /// Length of the alert window in seconds
    pub alert_window_secs: u64,
    /// Tailer poll interval when no full line is available (milliseconds)
    pub poll_interval_ms: u64,
    /// ANSI colors in alert reports
    pub color: bool,
}

impl MonitorConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn alert_window(&self) -> Duration {
        Duration::from_secs(self.alert_window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_file: String::new(),
            threshold: DEFAULT_THRESHOLD,
            stats_interval_secs: DEFAULT_STATS_INTERVAL_SECS,
            alert_window_secs: DEFAULT_ALERT_WINDOW_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            color: true,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose the scrape endpoint
    pub enabled: bool,
    /// Listen address
    pub listen_addr: String,
    /// Listen port
    pub port: u16,
    /// Scrape path
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- environment override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> HttplogConfig {
        let mut config = HttplogConfig::default();
        config.monitor.log_file = "/var/log/access.log".to_owned();
        config
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = HttplogConfig::default();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.monitor.threshold, 100);
        assert_eq!(config.monitor.stats_interval(), Duration::from_secs(10));
        assert_eq!(config.monitor.alert_window(), Duration::from_secs(120));
        assert_eq!(config.monitor.poll_interval(), Duration::from_millis(100));
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_requires_log_file() {
        let err = HttplogConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("monitor.log_file"));
        valid_config().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = HttplogConfig::parse("").unwrap();
        assert_eq!(config.monitor.threshold, DEFAULT_THRESHOLD);
        assert!(config.monitor.color);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[monitor]
log_file = "/tmp/access.log"
threshold = 5
"#;
        let config = HttplogConfig::parse(toml).unwrap();
        assert_eq!(config.monitor.log_file, "/tmp/access.log");
        assert_eq!(config.monitor.threshold, 5);
        // untouched fields keep their defaults
        assert_eq!(config.monitor.alert_window_secs, 120);
        assert_eq!(config.general.log_level, "warn");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"

[monitor]
log_file = "/var/log/nginx/access.log"
threshold = 10
stats_interval_secs = 5
alert_window_secs = 60
poll_interval_ms = 50
color = false

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9200
endpoint = "/metrics"
"#;
        let config = HttplogConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.monitor.stats_interval_secs, 5);
        assert_eq!(config.monitor.poll_interval(), Duration::from_millis(50));
        assert!(!config.monitor.color);
        assert_eq!(config.metrics.port, 9200);
        config.validate().unwrap();
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = HttplogConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            HttplogError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = valid_config();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = valid_config();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let mut config = valid_config();
        config.monitor.stats_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.monitor.alert_window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.monitor.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut config = valid_config();
        config.monitor.threshold = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            HttplogError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "monitor.threshold"
        ));

        config.monitor.threshold = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_metrics_port_only_when_enabled() {
        let mut config = valid_config();
        config.metrics.port = 0;
        config.validate().unwrap();

        config.metrics.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.port"));
    }

    #[test]
    #[serial]
    fn env_overrides_apply_per_field() {
        // SAFETY: #[serial] keeps env mutation away from other tests.
        unsafe {
            std::env::set_var("HTTPLOG_MONITOR_THRESHOLD", "42");
            std::env::set_var("HTTPLOG_MONITOR_LOG_FILE", "/srv/access.log");
            std::env::set_var("HTTPLOG_METRICS_ENABLED", "true");
        }

        let mut config = HttplogConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.monitor.threshold, 42);
        assert_eq!(config.monitor.log_file, "/srv/access.log");
        assert!(config.metrics.enabled);

        unsafe {
            std::env::remove_var("HTTPLOG_MONITOR_THRESHOLD");
            std::env::remove_var("HTTPLOG_MONITOR_LOG_FILE");
            std::env::remove_var("HTTPLOG_METRICS_ENABLED");
        }
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val = 7;
        // SAFETY: #[serial] keeps env mutation away from other tests.
        unsafe { std::env::set_var("TEST_HTTPLOG_U64_BAD", "seven") };
        override_u64(&mut val, "TEST_HTTPLOG_U64_BAD");
        assert_eq!(val, 7);
        unsafe { std::env::remove_var("TEST_HTTPLOG_U64_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_HTTPLOG_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = valid_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = HttplogConfig::parse(&toml_str).unwrap();
        assert_eq!(config.monitor.log_file, parsed.monitor.log_file);
        assert_eq!(config.metrics.listen_addr, parsed.metrics.listen_addr);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = HttplogConfig::from_file("/nonexistent/path/httplog.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HttplogError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("httplog.toml");
        std::fs::write(&path, "[monitor]\nlog_file = \"/tmp/a.log\"\nthreshold = 3\n").unwrap();

        let config = HttplogConfig::load(&path).await.unwrap();
        assert_eq!(config.monitor.threshold, 3);
    }
}

//! CLI argument definitions for httplog.
//!
//! Uses `clap` v4 derive macros. Flags sit on top of the configuration
//! layers: defaults < `--config` file < `HTTPLOG_*` environment < flags.

use std::path::PathBuf;

use clap::Parser;

use httplog_core::config::HttplogConfig;
use httplog_core::error::HttplogError;

/// Monitor live web server logs.
///
/// Follows a Common Log Format access log, prints traffic statistics every
/// few seconds and raises an alert when the average request rate over the
/// alert window crosses the threshold.
#[derive(Parser, Debug)]
#[command(name = "httplog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the log file to monitor.
    pub filename: Option<String>,

    /// Alert threshold (requests/s).
    #[arg(short, long)]
    pub threshold: Option<u64>,

    /// Path to an httplog.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds between two stats reports.
    #[arg(long, value_name = "SECS")]
    pub stats_interval: Option<u64>,

    /// Alert window length in seconds.
    #[arg(long, value_name = "SECS")]
    pub alert_window: Option<u64>,

    /// Disable colored alerts.
    #[arg(long)]
    pub no_color: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, value_name = "PORT")]
    pub metrics_port: Option<u16>,

    /// Validate the configuration and exit without monitoring.
    #[arg(long)]
    pub validate: bool,
}

impl Cli {
    /// Resolve the effective configuration and validate it.
    pub async fn load_config(&self) -> Result<HttplogConfig, HttplogError> {
        let mut config = match &self.config {
            Some(path) => HttplogConfig::from_file(path).await?,
            None => HttplogConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply the flags that were given on top of `config`.
    pub fn apply_overrides(&self, config: &mut HttplogConfig) {
        if let Some(filename) = &self.filename {
            config.monitor.log_file.clone_from(filename);
        }
        if let Some(threshold) = self.threshold {
            config.monitor.threshold = threshold;
        }
        if let Some(secs) = self.stats_interval {
            config.monitor.stats_interval_secs = secs;
        }
        if let Some(secs) = self.alert_window {
            config.monitor.alert_window_secs = secs;
        }
        if self.no_color {
            config.monitor.color = false;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(port) = self.metrics_port {
            config.metrics.enabled = true;
            config.metrics.port = port;
        }
    }
}

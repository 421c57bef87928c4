//! Monitor orchestration -- assembly and lifecycle of the three tasks.
//!
//! The [`Monitor`] owns the opened log file, the stats aggregator, the
//! alert detector and the tailer feeding both.
//!
//! # Startup Order (consumers before the producer)
//!
//! 1. Stats aggregator
//! 2. Alert detector
//! 3. File tailer
//!
//! # Shutdown Order
//!
//! Same as startup, then the file is closed. Every component is stopped
//! even when an earlier one fails; the first failure is reported.

use std::sync::Arc;

use anyhow::Result;
use tokio::fs::File;

use httplog_core::config::HttplogConfig;
use httplog_core::error::HttplogError;
use httplog_core::pipeline::{ReportSink, StdoutSink};
use httplog_monitor::{AlertDetector, FileTailer, StatsAggregator, TerminalFormatter};

use crate::metrics_server;

/// Running httplog instance.
pub struct Monitor {
    config: HttplogConfig,
    stats: Arc<StatsAggregator>,
    alerts: Arc<AlertDetector>,
    /// `None` once shut down (the file handle has been released).
    tailer: Option<FileTailer<File>>,
}

impl Monitor {
    /// Open the monitored file and build every component, reporting to
    /// stdout.
    ///
    /// # Errors
    ///
    /// - configuration fails validation
    /// - the log file cannot be opened
    pub async fn open(config: HttplogConfig) -> Result<Self> {
        Self::open_with_sink(config, Arc::new(StdoutSink)).await
    }

    /// Same as [`Monitor::open`] with reports written to `sink`.
    pub async fn open_with_sink(config: HttplogConfig, sink: Arc<dyn ReportSink>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let path = &config.monitor.log_file;
        let file = File::open(path)
            .await
            .map_err(|e| anyhow::anyhow!("file \"{}\" cannot be opened ({})", path, e))?;

        let formatter = Arc::new(TerminalFormatter::new(config.monitor.color));
        let stats = Arc::new(
            StatsAggregator::builder(config.monitor.stats_interval())
                .formatter(formatter.clone())
                .sink(sink.clone())
                .build(),
        );
        let alerts = Arc::new(
            AlertDetector::builder(config.monitor.threshold, config.monitor.alert_window())
                .formatter(formatter)
                .sink(sink)
                .build(),
        );
        let tailer = FileTailer::builder(file)
            .subscriber(stats.clone())
            .subscriber(alerts.clone())
            .poll_interval(config.monitor.poll_interval())
            .build();

        tracing::info!(
            log_file = %path,
            threshold = config.monitor.threshold,
            stats_interval_secs = config.monitor.stats_interval_secs,
            alert_window_secs = config.monitor.alert_window_secs,
            "monitor initialized"
        );

        Ok(Self {
            config,
            stats,
            alerts,
            tailer: Some(tailer),
        })
    }

    /// Start stats, alerts, then the tailer. Already running components
    /// are left alone.
    pub fn start(&self) {
        self.stats.start();
        self.alerts.start();
        if let Some(tailer) = &self.tailer {
            tailer.start();
        }
        tracing::info!("monitor started");
    }

    /// Stop every component in startup order and close the log file.
    ///
    /// The tailer stops last, so it may still deliver records to the
    /// aggregators after their tasks have exited. `update` on a stopped
    /// aggregator only adjusts its counters: it never fails and never
    /// writes a report, so those late records are harmless.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&mut self) -> Result<()> {
        let results: [(&str, Result<(), HttplogError>); 3] = [
            ("stats", self.stats.stop().await),
            ("alerts", self.alerts.stop().await),
            (
                "tailer",
                match self.tailer.take() {
                    Some(tailer) => tailer.close().await,
                    None => Ok(()),
                },
            ),
        ];

        let mut first_error = None;
        for (component, result) in results {
            if let Err(e) = result {
                tracing::error!(component, error = %e, "component stopped with error");
                first_error.get_or_insert(anyhow::anyhow!("{} failed: {}", component, e));
            }
        }

        tracing::info!("monitor stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Start monitoring and block until SIGINT or SIGTERM, then shut down.
    pub async fn run(mut self) -> Result<()> {
        if self.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&self.config.metrics)?;
        }

        self.start();
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal, "shutdown signal received");

        println!("Shutting down...");
        let result = self.shutdown().await;
        println!("Goodbye!");
        result
    }

    /// Whether any component task is still running.
    pub fn is_running(&self) -> bool {
        self.stats.is_running()
            || self.alerts.is_running()
            || self.tailer.as_ref().is_some_and(FileTailer::is_running)
    }

    /// Whether the tailer has reached the end of the file and follows it.
    pub fn is_following(&self) -> bool {
        self.tailer.as_ref().is_some_and(FileTailer::is_following)
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn alerts(&self) -> &AlertDetector {
        &self.alerts
    }

    pub fn config(&self) -> &HttplogConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

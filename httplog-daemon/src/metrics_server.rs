//! Prometheus scrape endpoint.
//!
//! Uses the HTTP listener built into `metrics-exporter-prometheus`. Once
//! installed, every `metrics::counter!()` / `metrics::gauge!()` in the
//! monitor is exported.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

use httplog_core::config::MetricsConfig;

/// Resolve the listener address from the `[metrics]` section.
///
/// # Errors
///
/// - endpoint other than `/metrics` (the exporter serves a fixed path)
/// - unparsable `listen_addr`
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is supported",
            config.endpoint
        ));
    }

    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call at most once per process.
///
/// # Errors
///
/// - invalid listener configuration, see [`listen_addr`]
/// - socket binding fails or a global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    httplog_core::metrics::describe_all();
    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

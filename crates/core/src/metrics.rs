//! Metric names and descriptions.
//!
//! Every component records through the `metrics` macros using the names
//! defined here. Without an installed recorder the macros are no-ops.
//!
//! # Naming
//!
//! - prefix: `httplog_`
//! - suffix: `_total` (counter), none (gauge)
//!
//! ```ignore
//! metrics::counter!(httplog_core::metrics::RECORDS_TOTAL).increment(1);
//! ```

// ─── label keys ─────────────────────────────────────────────────────

/// Alert kind label key (high, recovered)
pub const LABEL_KIND: &str = "kind";

// ─── tailer ─────────────────────────────────────────────────────────

/// Tailer: lines read from the log file (counter)
pub const LINES_READ_TOTAL: &str = "httplog_lines_read_total";

/// Tailer: lines parsed and dispatched to subscribers (counter)
pub const RECORDS_TOTAL: &str = "httplog_records_total";

/// Tailer: lines dropped because they did not parse (counter)
pub const PARSE_ERRORS_TOTAL: &str = "httplog_parse_errors_total";

// ─── aggregators ────────────────────────────────────────────────────

/// Stats: reports written (counter)
pub const STATS_REPORTS_TOTAL: &str = "httplog_stats_reports_total";

/// Stats: bytes transferred since start (gauge)
pub const STATS_BYTES_TRANSFERRED: &str = "httplog_stats_bytes_transferred";

/// Alerts: alerts written (counter, label: kind)
pub const ALERTS_TOTAL: &str = "httplog_alerts_total";

/// Alerts: hits counted in the last closed window (gauge)
pub const ALERT_WINDOW_HITS: &str = "httplog_alert_window_hits";

/// Alerts: 1 while in the alerting state, 0 otherwise (gauge)
pub const ALERT_ACTIVE: &str = "httplog_alert_active";

/// Register HELP text for every metric.
///
/// Call once, after the global recorder is installed.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(LINES_READ_TOTAL, "Total number of lines read from the log file");
    describe_counter!(
        RECORDS_TOTAL,
        "Total number of access log records dispatched to subscribers"
    );
    describe_counter!(
        PARSE_ERRORS_TOTAL,
        "Total number of lines dropped because they did not parse"
    );
    describe_counter!(STATS_REPORTS_TOTAL, "Total number of stats reports written");
    describe_gauge!(
        STATS_BYTES_TRANSFERRED,
        "Response bytes accounted since the monitor started"
    );
    describe_counter!(ALERTS_TOTAL, "Total number of traffic alerts by kind");
    describe_gauge!(ALERT_WINDOW_HITS, "Hits counted in the last alert window");
    describe_gauge!(ALERT_ACTIVE, "Whether the high traffic alert is active");
}

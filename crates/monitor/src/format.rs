//! Report rendering -- turns aggregator snapshots into terminal text.
//!
//! The aggregators only depend on the [`StatsFormatter`] and
//! [`AlertFormatter`] traits; [`TerminalFormatter`] is the production
//! implementation.

use colored::Colorize;

use crate::alert::{AlertKind, TrafficAlert};
use crate::stats::StatsSnapshot;

const STATS_BANNER: &str = "==================== STATS ====================";
const ALERT_BANNER: &str = "==================== ALERT ====================";
const BOARD_TITLES: [&str; 3] = ["Top 5 users", "Top 5 hosts", "Top 5 sections"];
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders a stats snapshot.
pub trait StatsFormatter: Send + Sync {
    fn format_stats(&self, snapshot: &StatsSnapshot) -> String;
}

/// Renders a traffic alert.
pub trait AlertFormatter: Send + Sync {
    fn format_alert(&self, alert: &TrafficAlert) -> String;
}

/// Plain text reports, alerts optionally colored (red high, green recovered).
#[derive(Debug, Clone, Copy)]
pub struct TerminalFormatter {
    color: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Formatter without ANSI escapes.
    pub fn plain() -> Self {
        Self::new(false)
    }
}

impl Default for TerminalFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl StatsFormatter for TerminalFormatter {
    fn format_stats(&self, snapshot: &StatsSnapshot) -> String {
        let boards = BOARD_TITLES
            .iter()
            .zip(snapshot.rankings())
            .map(|(title, ranking)| {
                let rows = ranking
                    .iter()
                    .enumerate()
                    .map(|(idx, (key, hits))| format!("  {}. {} ({})", idx + 1, key, hits))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{title}\n{rows}")
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{STATS_BANNER}\n{boards}\n\n\
             Total records processed: {} ({:.1} records/s avg)\n\
             Total bytes transferred: {} ({})\n",
            snapshot.record_count,
            snapshot.record_rate,
            snapshot.bytes_transferred,
            human_bytes(snapshot.bytes_transferred),
        )
    }
}

impl AlertFormatter for TerminalFormatter {
    fn format_alert(&self, alert: &TrafficAlert) -> String {
        let (headline, footer) = match alert.kind {
            AlertKind::High => ("High traffic generated an alert", "Triggered at"),
            AlertKind::Recovered => ("Traffic is back to normal", "Recovered at"),
        };
        let window_secs = alert.window.as_secs();

        let text = format!(
            "{ALERT_BANNER}\n\
             {headline} - hits = {}\n\
             ({:.1} reqs/s avg over the last {}s)\n\
             {footer} {}\n",
            alert.hits,
            alert.average_rate(),
            window_secs,
            alert.at.format(TIME_FORMAT),
        );

        if !self.color {
            return text;
        }
        match alert.kind {
            AlertKind::High => text.red().to_string(),
            AlertKind::Recovered => text.green().to_string(),
        }
    }
}

/// Byte count with a binary prefix, one decimal: `361.0 KiB`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 8] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

    #[allow(clippy::cast_precision_loss)]
    let mut num = bytes as f64;
    for unit in UNITS {
        if num < 1024.0 {
            return format!("{num:.1} {unit}B");
        }
        num /= 1024.0;
    }
    format!("{num:.1} YiB")
}

//! Pipeline traits -- extension points between the tailer, the aggregators
//! and the outside world.
//!
//! - [`LogParser`]: turns one raw line into a [`LogRecord`]
//! - [`Subscriber`]: receives every parsed [`LogRecord`]
//! - [`Clock`]: wall-clock source, swappable in tests
//! - [`ReportSink`]: destination of rendered reports

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};

use crate::error::{HttplogError, ParseError};
use crate::record::LogRecord;

/// Access log line parser.
///
/// Implementations are pure: the same line always yields the same result.
pub trait LogParser: Send + Sync {
    /// Name of the supported format
    fn format_name(&self) -> &str;

    /// Decode one line (trailing newline allowed)
    fn parse(&self, line: &str) -> Result<LogRecord, ParseError>;
}

/// A component registered on the tailer to receive parsed records.
///
/// `update` is called synchronously from the tailer's task, in file order.
/// It must return promptly: take a lock, bump counters, release.
pub trait Subscriber: Send + Sync {
    /// Subscriber name, used in logs
    fn name(&self) -> &str;

    /// Account for one record
    fn update(&self, record: &LogRecord) -> Result<(), HttplogError>;
}

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> DateTime<Local>;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Destination of rendered reports.
pub trait ReportSink: Send + Sync {
    /// Write one report followed by a newline.
    fn emit(&self, report: &str) -> io::Result<()>;
}

/// Writes reports to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn emit(&self, report: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{report}")?;
        out.flush()
    }
}

/// Keeps every emitted report in memory.
///
/// Clones share the same buffer, so a clone can be handed to a component
/// while the original is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports emitted so far, oldest first.
    pub fn reports(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Everything emitted so far, as it would appear on a terminal.
    pub fn contents(&self) -> String {
        self.reports()
            .iter()
            .map(|r| format!("{r}\n"))
            .collect()
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, report: &str) -> io::Result<()> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        handle.emit("first").unwrap();
        handle.emit("second").unwrap();
        assert_eq!(sink.reports(), vec!["first", "second"]);
        assert_eq!(sink.contents(), "first\nsecond\n");
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}

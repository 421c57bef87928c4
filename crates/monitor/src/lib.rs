//! httplog monitor -- tail, parse, aggregate, report.
//!
//! # Modules
//!
//! - [`parser`]: Common Log Format line parser
//! - [`tailer`]: follows the log file and fans records out to subscribers
//! - [`stats`]: periodic top-N / totals report
//! - [`alert`]: sliding window traffic alert state machine
//! - [`format`]: report rendering
//!
//! # Architecture
//!
//! ```text
//! FileTailer --(LogRecord)--> StatsAggregator --(every 10s)--> ReportSink
//!            \
//!             -------------> AlertDetector   --(every 120s)-> ReportSink
//! ```

pub mod alert;
pub mod format;
pub mod parser;
pub mod stats;
pub mod tailer;

#[cfg(test)]
mod testing;

pub use alert::{AlertDetector, AlertDetectorBuilder, AlertKind, TrafficAlert};
pub use format::{AlertFormatter, StatsFormatter, TerminalFormatter};
pub use parser::ClfParser;
pub use stats::{StatsAggregator, StatsAggregatorBuilder, StatsSnapshot};
pub use tailer::{FileTailer, FileTailerBuilder};

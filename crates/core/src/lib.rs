//! httplog core -- types and traits shared by the monitor and the daemon.
//!
//! # Modules
//!
//! - [`record`]: [`LogRecord`], the parsed access log line
//! - [`pipeline`]: [`LogParser`], [`Subscriber`], [`Clock`] and [`ReportSink`] extension points
//! - [`task`]: [`TaskController`], single background task with cooperative cancellation
//! - [`config`]: `httplog.toml` loading, env overrides, validation
//! - [`error`]: error taxonomy
//! - [`metrics`]: metric names

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod task;

// --- re-exports ---

pub use config::{GeneralConfig, HttplogConfig, MetricsConfig, MonitorConfig};
pub use error::{ConfigError, HttplogError, ParseError};
pub use pipeline::{
    Clock, LogParser, MemorySink, ReportSink, StdoutSink, Subscriber, SystemClock,
};
pub use record::LogRecord;
pub use task::{TaskController, TaskResult};

//! Access log record -- the value handed from the tailer to every subscriber.

/// One decoded access log line.
///
/// Built once by the parser and never mutated afterwards. Subscribers
/// receive it by reference and copy out only what they aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Remote host (IP or hostname)
    pub host: String,
    /// RFC 1413 identity, usually `-`
    pub ident: String,
    /// Authenticated user, `-` when anonymous
    pub authuser: String,
    /// Request time as written in the log, brackets removed
    pub timestamp: String,
    /// HTTP method
    pub method: String,
    /// Path and query string; `None` for requests without one
    pub resource: Option<String>,
    /// HTTP protocol version (`1.0`, `1.1`, ...)
    pub protocol: String,
    /// Response status code
    pub status: u16,
    /// Response size in bytes (`-` is recorded as 0)
    pub size: u64,
    /// First path component of `resource`, always starting with `/`
    pub section: String,
}

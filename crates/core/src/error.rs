//! Error types -- one enum per concern, folded into [`HttplogError`].

/// Top-level httplog error.
#[derive(Debug, thiserror::Error)]
pub enum HttplogError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A log line could not be decoded
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A background task ended abnormally (panic or cancellation by the runtime)
    #[error("task '{name}' failed: {reason}")]
    Task { name: String, reason: String },

    /// A component lock was poisoned by a panicking holder
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error (file read, report output)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// TOML could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A field holds a value outside its domain
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line does not follow the access log grammar
    #[error("line does not match the access log format")]
    Malformed,

    /// The size field does not fit in a u64
    #[error("invalid size field: {0}")]
    InvalidSize(String),

    /// The request resource has no first path component
    #[error("no section in resource {resource:?}")]
    MissingSection { resource: Option<String> },
}

//! Common Log Format parser.
//!
//! ```text
//! host ident authuser [timestamp] "METHOD resource HTTP/version" status size
//! ```
//!
//! Matching is anchored at the start of the line only, so Combined Log
//! Format lines (trailing referer and user agent) parse as well.
//!
//! # Example
//! ```
//! use httplog_core::LogParser;
//! use httplog_monitor::parser::ClfParser;
//!
//! let line = r#"127.0.0.1 - james [09/May/2018:16:00:39 +0000] "GET /report HTTP/1.0" 200 123"#;
//! let record = ClfParser::new().parse(line).unwrap();
//! assert_eq!(record.section, "/report");
//! ```

use std::sync::LazyLock;

use regex::Regex;

use httplog_core::error::ParseError;
use httplog_core::pipeline::LogParser;
use httplog_core::record::LogRecord;

static CLF_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "([A-Z]+) ([^ "]+)? HTTP/([0-9.]+)" ([0-9]{3}) ([0-9]+|-)"#,
    )
    .unwrap_or_else(|e| panic!("CLF regex is a valid literal: {e}"))
});

/// Parser for the Common Log Format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClfParser;

impl ClfParser {
    pub fn new() -> Self {
        Self
    }
}

impl LogParser for ClfParser {
    fn format_name(&self) -> &str {
        "clf"
    }

    fn parse(&self, line: &str) -> Result<LogRecord, ParseError> {
        parse_line(line)
    }
}

/// Decode one access log line.
pub fn parse_line(line: &str) -> Result<LogRecord, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let caps = CLF_LINE.captures(line).ok_or(ParseError::Malformed)?;

    // groups 1-5 and 7-9 are mandatory in the pattern
    let field = |i: usize| caps.get(i).map_or("", |m| m.as_str());

    let resource = caps.get(6).map(|m| m.as_str().to_owned());
    let section = section_of(resource.as_deref())?;

    let status = field(8).parse::<u16>().map_err(|_| ParseError::Malformed)?;
    let size = match field(9) {
        "-" => 0,
        raw => raw
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidSize(raw.to_owned()))?,
    };

    Ok(LogRecord {
        host: field(1).to_owned(),
        ident: field(2).to_owned(),
        authuser: field(3).to_owned(),
        timestamp: field(4).to_owned(),
        method: field(5).to_owned(),
        resource,
        protocol: field(7).to_owned(),
        status,
        size,
        section,
    })
}

/// First path component of a request resource, with its leading slash.
///
/// `/api/v1/users` gives `/api`. A missing resource, one without any `/`,
/// or one whose first component is empty (`/`, `//x`) has no section.
pub fn section_of(resource: Option<&str>) -> Result<String, ParseError> {
    let Some(resource) = resource else {
        return Err(ParseError::MissingSection { resource: None });
    };

    match resource.splitn(3, '/').nth(1) {
        Some(first) if !first.is_empty() => Ok(format!("/{first}")),
        _ => Err(ParseError::MissingSection {
            resource: Some(resource.to_owned()),
        }),
    }
}

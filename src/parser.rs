// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Access log line parsing.
//!
//! The monitor only needs a [`LogRecord`]; any format can be supported by
//! implementing [`LogParser`]. [`CommonLogParser`] handles the Common and
//! Combined Log Formats:
//!
//! ```text
//! 127.0.0.1 - james [09/May/2018:16:00:39 +0000] "GET /report HTTP/1.0" 200 123
//! ```

use crate::error::ParseError;
use crate::record::{LogRecord, Timestamp};
use chrono::DateTime;
use regex::Regex;

/// Time format of the bracketed field.
pub const CLF_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

const CLF_PATTERN: &str = concat!(
    r"^(?P<host>\S+)\s\S+\s\S+\s",
    r"\[(?P<time>[^\]]*)\]\s",
    r#""\S+\s(?P<section>/[^/\s?#]*)[^"]*"\s"#,
    r"(?P<status>\d{3})\s(?P<size>\S+)",
);

/// Turns one raw line into a record.
pub trait LogParser {
    fn parse(&self, line: &str) -> Result<LogRecord, ParseError>;
}

/// Parser for Common/Combined Log Format lines.
#[derive(Debug, Clone)]
pub struct CommonLogParser {
    pattern: Regex,
}

impl CommonLogParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(CLF_PATTERN)?,
        })
    }
}

impl LogParser for CommonLogParser {
    fn parse(&self, line: &str) -> Result<LogRecord, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let caps = self.pattern.captures(line).ok_or(ParseError::Malformed)?;
        let field = |name: &str| caps.name(name).map_or("", |m| m.as_str());

        let timestamp = parse_time(field("time"))?;

        let status_str = field("status");
        let status: u16 = status_str.parse().map_err(|_| ParseError::Field {
            field: "status",
            value: status_str.to_string(),
        })?;

        let size = match field("size") {
            "-" => 0,
            raw => raw.parse::<u64>().map_err(|_| ParseError::Field {
                field: "size",
                value: raw.to_string(),
            })?,
        };

        Ok(LogRecord::new(
            field("host"),
            field("section"),
            status,
            size,
            timestamp,
        )?)
    }
}

fn parse_time(raw: &str) -> Result<Timestamp, ParseError> {
    DateTime::parse_from_str(raw, CLF_TIME_FORMAT).map_err(|_| ParseError::Timestamp(raw.to_string()))
}

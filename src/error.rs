// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Hitwatch
//!
//! This module defines all error types used throughout the library.

use crate::record::Timestamp;
use thiserror::Error;

/// Result type alias for Hitwatch operations
pub type Result<T> = std::result::Result<T, HitwatchError>;

/// Main error type for Hitwatch operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HitwatchError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Line could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Window ordering violation
    #[error("Window error: {0}")]
    Window(#[from] WindowError),
}

/// Errors in the supplied configuration. Always fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A duration was zero
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    /// Threshold is negative, NaN or infinite
    #[error("Alert threshold must be a finite non-negative number, got {0}")]
    InvalidThreshold(f64),

    /// History ring cannot hold anything
    #[error("History capacity must be at least 1")]
    ZeroHistory,

    /// Configuration document could not be decoded
    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

/// Violations of the input record contract
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Section does not start with '/'
    #[error("Section must start with '/': {0:?}")]
    InvalidSection(String),

    /// Status code outside 100..=599
    #[error("Status code out of range: {0}")]
    InvalidStatus(u16),

    /// Host is empty
    #[error("Empty host")]
    EmptyHost,
}

/// Reasons a raw line yields no record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Blank line
    #[error("Empty line")]
    Empty,

    /// Line does not match the log format
    #[error("Line does not match the log format")]
    Malformed,

    /// Time field could not be decoded
    #[error("Invalid timestamp: {0:?}")]
    Timestamp(String),

    /// A numeric field could not be decoded
    #[error("Invalid {field}: {value:?}")]
    Field { field: &'static str, value: String },

    /// Fields decoded but violate the record contract
    #[error("{0}")]
    Record(#[from] RecordError),
}

/// Window ordering errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    /// Event belongs to a window that was already flushed
    #[error("Late event: window ending {boundary} already flushed (sealed through {sealed})")]
    LateEvent {
        boundary: Timestamp,
        sealed: Timestamp,
    },

    /// Event belongs to a window older than the live one that never opened
    #[error("Out-of-order event: window ending {boundary} is behind the live window ending {live_end}")]
    OutOfOrder {
        boundary: Timestamp,
        live_end: Timestamp,
    },

    /// Alert window closed at or before its start
    #[error("Alert window closed with non-positive duration: start {start}, close {close}")]
    NonPositiveElapsed { start: Timestamp, close: Timestamp },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HitwatchError::Config(ConfigError::ZeroDuration {
            name: "watch.duration_secs",
        });
        let msg = format!("{}", err);
        assert!(msg.contains("watch.duration_secs"));
        assert!(msg.contains("greater than zero"));
    }

    #[test]
    fn test_error_conversion() {
        let parse_err: ParseError = RecordError::InvalidStatus(42).into();
        let err: HitwatchError = parse_err.into();
        assert!(matches!(err, HitwatchError::Parse(ParseError::Record(_))));
    }

    #[test]
    fn test_out_of_order_names_live_window() {
        let at = |s: &str| chrono::DateTime::parse_from_rfc3339(s).unwrap();
        let err = WindowError::OutOfOrder {
            boundary: at("2025-03-09T10:00:10+00:00"),
            live_end: at("2025-03-09T10:00:20+00:00"),
        };
        let msg = err.to_string();
        assert!(msg.contains("10:00:10"));
        assert!(msg.contains("live window ending 2025-03-09 10:00:20"));
        assert!(!msg.contains("sealed"));
    }
}

// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Structured access log record consumed by the monitor.

use crate::error::RecordError;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Absolute, offset-aware event time.
pub type Timestamp = DateTime<FixedOffset>;

/// One successfully decoded access log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    host: String,
    section: String,
    status: u16,
    size: u64,
    timestamp: Timestamp,
}

impl LogRecord {
    /// Build a record, enforcing the input contract.
    pub fn new(
        host: impl Into<String>,
        section: impl Into<String>,
        status: u16,
        size: u64,
        timestamp: Timestamp,
    ) -> Result<Self, RecordError> {
        let host = host.into();
        let section = section.into();

        if host.is_empty() {
            return Err(RecordError::EmptyHost);
        }
        if !section.starts_with('/') {
            return Err(RecordError::InvalidSection(section));
        }
        if !(100..=599).contains(&status) {
            return Err(RecordError::InvalidStatus(status));
        }

        Ok(Self {
            host,
            section,
            status,
            size,
            timestamp,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Immutable snapshots for reporting.
//!
//! Readers never see live accumulators: a [`WatchSnapshot`] is built from a
//! flushed watch window, and [`WindowHistory`] keeps a bounded ring of closed
//! alert windows.

use crate::alert_window::ClosedAlertWindow;
use crate::record::Timestamp;
use crate::section::{Histogram, SectionStats};
use crate::watch::WatchWindow;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Version of the snapshot format.
pub const SNAPSHOT_VERSION: &str = "0.1.0";

/// Display summary of one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section: String,
    pub hits: u64,
    pub status: Histogram<u16>,
    /// Percentage of hits with status >= 400.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    pub total_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    pub distinct_hosts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_host: Option<String>,
}

impl From<&SectionStats> for SectionSummary {
    fn from(stats: &SectionStats) -> Self {
        Self {
            section: stats.section().to_string(),
            hits: stats.hits(),
            status: stats.status().clone(),
            error_rate: stats.error_rate(),
            total_size: stats.total_size(),
            min_size: stats.min_size(),
            max_size: stats.max_size(),
            distinct_hosts: stats.hosts().len(),
            top_host: stats.hosts().most_common().map(|(host, _)| host.clone()),
        }
    }
}

/// Statistics of one closed watch window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSnapshot {
    /// Format version.
    pub version: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub total_hits: u64,
    /// Sorted by hits, highest first, then by name.
    pub sections: Vec<SectionSummary>,
}

impl WatchSnapshot {
    /// Summarize a flushed window.
    pub fn from_window(window: &WatchWindow) -> Self {
        let mut sections: Vec<SectionSummary> =
            window.sections().map(SectionSummary::from).collect();
        sections.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.section.cmp(&b.section)));

        Self {
            version: SNAPSHOT_VERSION.to_string(),
            start: window.start(),
            end: window.end(),
            total_hits: window.total_hits(),
            sections,
        }
    }

    /// Section with the most hits.
    pub fn top_section(&self) -> Option<&SectionSummary> {
        self.sections.first()
    }

    pub fn section(&self, name: &str) -> Option<&SectionSummary> {
        self.sections.iter().find(|s| s.section == name)
    }

    /// Human-readable multi-line report.
    pub fn report(&self) -> String {
        let mut report = format!(
            "[{} - {}] {} hits\n",
            self.start.format("%H:%M:%S"),
            self.end.format("%H:%M:%S"),
            self.total_hits
        );
        for s in &self.sections {
            let statuses: Vec<String> = s
                .status
                .iter()
                .map(|(code, count)| format!("{}={}", code, count))
                .collect();
            report.push_str(&format!(
                "  {}: {} hits, errors {}, size {} bytes, status [{}]\n",
                s.section,
                s.hits,
                s.error_rate
                    .map(|rate| format!("{:.1}%", rate))
                    .unwrap_or_else(|| "-".to_string()),
                s.total_size,
                statuses.join(" ")
            ));
        }
        report
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Bounded ring of the most recent closed alert windows.
#[derive(Debug, Clone)]
pub struct WindowHistory {
    windows: VecDeque<ClosedAlertWindow>,
    capacity: usize,
}

impl WindowHistory {
    /// Ring holding at most `capacity` windows (at least one).
    ///
    /// Storage grows as windows arrive, so a large capacity costs nothing up
    /// front.
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a window, evicting the oldest when full.
    pub fn push(&mut self, window: ClosedAlertWindow) {
        if self.windows.len() == self.capacity {
            self.windows.pop_front();
        }
        self.windows.push_back(window);
    }

    pub fn latest(&self) -> Option<&ClosedAlertWindow> {
        self.windows.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ClosedAlertWindow> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the retained windows, oldest first.
    pub fn to_vec(&self) -> Vec<ClosedAlertWindow> {
        self.windows.iter().cloned().collect()
    }
}

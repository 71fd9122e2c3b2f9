// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Events emitted by the monitor.

use crate::alert_window::ClosedAlertWindow;
use crate::record::Timestamp;
use crate::snapshot::WatchSnapshot;
use serde::{Deserialize, Serialize};

/// Kind of alert transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// NORMAL -> ALERTING.
    Raised,
    /// ALERTING -> NORMAL.
    Recovered,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Raised => "RAISED",
            AlertKind::Recovered => "RECOVERED",
        }
    }
}

/// An alert state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    /// Close time of the window that caused the transition.
    pub timestamp: Timestamp,
    /// Average hits per second over that window.
    pub average: f64,
    pub threshold: f64,
    /// Human-readable message.
    pub message: String,
}

impl AlertEvent {
    /// Create an "alert raised" event.
    pub fn raised(timestamp: Timestamp, average: f64, threshold: f64) -> Self {
        Self {
            kind: AlertKind::Raised,
            timestamp,
            average,
            threshold,
            message: format!(
                "High traffic generated an alert - hits = {:.2}/s, triggered at {}",
                average,
                timestamp.format("%d/%b/%Y:%H:%M:%S %z")
            ),
        }
    }

    /// Create a "recovered" event.
    pub fn recovered(timestamp: Timestamp, average: f64, threshold: f64) -> Self {
        Self {
            kind: AlertKind::Recovered,
            timestamp,
            average,
            threshold,
            message: format!(
                "Traffic back to normal - hits = {:.2}/s, recovered at {}",
                average,
                timestamp.format("%d/%b/%Y:%H:%M:%S %z")
            ),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Everything the monitor reports to its presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Statistics of a flushed watch window.
    WatchWindowClosed(WatchSnapshot),
    /// An alert window was evaluated.
    AlertWindowClosed(ClosedAlertWindow),
    /// The alert state changed.
    Alert(AlertEvent),
}

impl MonitorEvent {
    pub fn as_alert(&self) -> Option<&AlertEvent> {
        match self {
            MonitorEvent::Alert(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_watch_snapshot(&self) -> Option<&WatchSnapshot> {
        match self {
            MonitorEvent::WatchWindowClosed(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn as_alert_window(&self) -> Option<&ClosedAlertWindow> {
        match self {
            MonitorEvent::AlertWindowClosed(window) => Some(window),
            _ => None,
        }
    }
}

// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Monitor configuration.

use crate::error::ConfigError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Master configuration for the traffic monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Watch window settings.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Alert window settings.
    pub alert: AlertConfig,

    /// History retention.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Watch window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Window length in seconds, aligned from the top of the minute.
    pub duration_secs: u32,

    /// Seconds the wall clock must pass a window end before it is flushed
    /// without a newer event.
    pub flush_grace_secs: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            flush_grace_secs: 1,
        }
    }
}

impl WatchConfig {
    /// How the configured duration falls short of exact alignment, if it does.
    ///
    /// Durations that do not divide 60 restart at every minute. Durations over
    /// 60 seconds also make consecutive windows overlap, since a window's start
    /// reaches back past the previous window's end.
    pub fn alignment_caveat(&self) -> Option<String> {
        let secs = self.duration_secs;
        if secs > 60 {
            Some(format!(
                "watch duration {}s exceeds a minute; windows restart at every minute and consecutive windows overlap",
                secs
            ))
        } else if secs > 0 && 60 % secs != 0 {
            Some(format!(
                "watch duration {}s does not divide 60; windows restart at every minute",
                secs
            ))
        } else {
            None
        }
    }
}

/// Alert window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Window length in minutes, aligned from the top of the hour.
    #[serde(default = "default_alert_minutes")]
    pub duration_minutes: u32,

    /// Average hits per second above which an alert is raised.
    pub threshold: f64,
}

fn default_alert_minutes() -> u32 {
    2
}

/// History configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of closed alert windows kept for reporting.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 12 }
    }
}

impl MonitorConfig {
    /// Default configuration with the given alert threshold.
    pub fn new(threshold: f64) -> Self {
        Self {
            watch: WatchConfig::default(),
            alert: AlertConfig {
                duration_minutes: default_alert_minutes(),
                threshold,
            },
            history: HistoryConfig::default(),
        }
    }

    /// Load from a JSON document. The result is not validated.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watch_duration()?;
        self.alert_duration()?;

        if !self.alert.threshold.is_finite() || self.alert.threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.alert.threshold));
        }
        if self.history.capacity == 0 {
            return Err(ConfigError::ZeroHistory);
        }

        if let Some(caveat) = self.watch.alignment_caveat() {
            warn!("{}", caveat);
        }
        Ok(())
    }

    /// Watch window duration in seconds.
    pub fn watch_duration(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.watch.duration_secs).ok_or(ConfigError::ZeroDuration {
            name: "watch.duration_secs",
        })
    }

    /// Alert window duration in minutes.
    pub fn alert_duration(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.alert.duration_minutes).ok_or(ConfigError::ZeroDuration {
            name: "alert.duration_minutes",
        })
    }

    pub fn flush_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.watch.flush_grace_secs))
    }
}

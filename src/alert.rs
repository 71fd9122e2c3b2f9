// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert state machine.

use crate::alert_window::ClosedAlertWindow;
use crate::event::AlertEvent;
use crate::record::Timestamp;
use serde::{Deserialize, Serialize};

/// Traffic alert status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertStatus {
    #[default]
    Normal,
    Alerting,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Normal => "NORMAL",
            AlertStatus::Alerting => "ALERTING",
        }
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self, AlertStatus::Alerting)
    }
}

/// Current status and when it was last entered.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertState {
    pub status: AlertStatus,
    /// `None` until the first transition.
    pub since: Option<Timestamp>,
    /// Average of the most recently evaluated window.
    pub last_average: Option<f64>,
}

/// Two-state machine evaluated once per closed alert window.
///
/// Events are only produced on transitions, so raised and recovered always
/// alternate.
#[derive(Debug, Clone, Default)]
pub struct AlertStateMachine {
    state: AlertState,
    transitions: u64,
}

impl AlertStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a closed window. Returns an event if the status changed.
    pub fn evaluate(&mut self, window: &ClosedAlertWindow) -> Option<AlertEvent> {
        self.state.last_average = Some(window.average());

        let event = match (self.state.status, window.is_alert()) {
            (AlertStatus::Normal, true) => {
                self.state.status = AlertStatus::Alerting;
                AlertEvent::raised(window.end(), window.average(), window.threshold())
            }
            (AlertStatus::Alerting, false) => {
                self.state.status = AlertStatus::Normal;
                AlertEvent::recovered(window.end(), window.average(), window.threshold())
            }
            _ => return None,
        };

        self.state.since = Some(window.end());
        self.transitions += 1;
        Some(event)
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn status(&self) -> AlertStatus {
        self.state.status
    }

    /// Number of transitions since startup.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }
}

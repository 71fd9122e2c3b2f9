// Hitwatch Exporter - Monitor pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Drives the traffic monitor from a line channel and a wall-clock ticker.
//!
//! The monitor is owned by a single task. After every step the task copies
//! the latest closed results into [`Published`], which HTTP handlers read
//! through a shared lock.

use crate::error::ExporterError;
use crate::metrics::{
    record_alert_event, update_alert_state, update_alert_window_metrics, update_line_metrics,
    update_watch_metrics,
};
use chrono::Utc;
use hitwatch::{
    AlertEvent, AlertKind, AlertState, ClosedAlertWindow, CommonLogParser, MonitorEvent,
    MonitorStats, Timestamp, TrafficMonitor, WatchSnapshot,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Alert events kept for the status page.
const RECENT_ALERTS: usize = 20;

/// Latest closed results, as seen by readers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Published {
    pub threshold: f64,
    pub alert: AlertState,
    pub stats: MonitorStats,
    pub last_watch: Option<WatchSnapshot>,
    /// Oldest first.
    pub history: Vec<ClosedAlertWindow>,
    /// Oldest first.
    pub recent_alerts: VecDeque<AlertEvent>,
    pub input_open: bool,
}

pub type SharedState = Arc<RwLock<Published>>;

/// Single owner of the monitor.
pub struct Pipeline {
    monitor: TrafficMonitor,
    parser: CommonLogParser,
    shared: SharedState,
    last_stats: MonitorStats,
}

impl Pipeline {
    pub fn new(monitor: TrafficMonitor, parser: CommonLogParser) -> Self {
        let shared = Arc::new(RwLock::new(Published {
            threshold: monitor.config().alert.threshold,
            input_open: true,
            ..Default::default()
        }));
        Self {
            monitor,
            parser,
            shared,
            last_stats: MonitorStats::default(),
        }
    }

    /// Handle for readers.
    pub fn shared(&self) -> SharedState {
        Arc::clone(&self.shared)
    }

    /// Feed one raw line.
    pub async fn handle_line(&mut self, line: &str) -> Result<(), ExporterError> {
        let events = self.monitor.ingest_line(&self.parser, line)?;
        self.publish(events).await;
        Ok(())
    }

    /// Advance the wall clock.
    pub async fn handle_tick(&mut self, now: Timestamp) -> Result<(), ExporterError> {
        let events = self.monitor.tick(now)?;
        if !events.is_empty() {
            debug!("Tick at {} closed {} windows", now, events.len());
        }
        self.publish(events).await;
        Ok(())
    }

    /// Run until input ends (event-time mode) or forever (wall-clock mode).
    ///
    /// With `tick_every` unset, windows only close when later records arrive.
    pub async fn run(
        mut self,
        mut lines: mpsc::Receiver<String>,
        tick_every: Option<Duration>,
    ) -> Result<(), ExporterError> {
        let ticking = tick_every.is_some();
        let mut ticker = tokio::time::interval(tick_every.unwrap_or(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut input_open = true;

        info!(
            "Monitor running ({})",
            if ticking { "wall-clock ticks" } else { "event time" }
        );

        loop {
            // Pending lines go first so a tick never overtakes buffered input.
            tokio::select! {
                biased;

                line = lines.recv(), if input_open => match line {
                    Some(line) => self.handle_line(&line).await?,
                    None => {
                        input_open = false;
                        self.shared.write().await.input_open = false;
                        info!("Input closed");
                        if !ticking {
                            break;
                        }
                    }
                },
                _ = ticker.tick(), if ticking => {
                    self.handle_tick(Timestamp::from(Utc::now())).await?;
                }
                else => break,
            }
        }
        Ok(())
    }

    async fn publish(&mut self, events: Vec<MonitorEvent>) {
        for event in &events {
            match event {
                MonitorEvent::WatchWindowClosed(snapshot) => {
                    update_watch_metrics(snapshot);
                    if snapshot.total_hits > 0 {
                        info!("{}", snapshot.report().trim_end());
                    }
                }
                MonitorEvent::AlertWindowClosed(window) => {
                    update_alert_window_metrics(window);
                    debug!(
                        "Alert window {} - {}: {:.2} hits/s",
                        window.start(),
                        window.end(),
                        window.average()
                    );
                }
                MonitorEvent::Alert(alert) => {
                    record_alert_event(alert);
                    match alert.kind {
                        AlertKind::Raised => warn!("{}", alert.message),
                        AlertKind::Recovered => info!("{}", alert.message),
                    }
                }
            }
        }

        let stats = self.monitor.stats();
        update_line_metrics(&self.last_stats, &stats);
        self.last_stats = stats;

        let alert = self.monitor.alert_state();
        update_alert_state(alert.status);

        let mut shared = self.shared.write().await;
        shared.stats = stats;
        shared.alert = alert;
        for event in events {
            match event {
                MonitorEvent::WatchWindowClosed(snapshot) => shared.last_watch = Some(snapshot),
                MonitorEvent::AlertWindowClosed(_) => {
                    shared.history = self.monitor.history().to_vec();
                }
                MonitorEvent::Alert(alert) => {
                    if shared.recent_alerts.len() == RECENT_ALERTS {
                        shared.recent_alerts.pop_front();
                    }
                    shared.recent_alerts.push_back(alert);
                }
            }
        }
    }
}

// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Main traffic monitor.
//!
//! [`TrafficMonitor`] is a single-owner state machine. Records go in through
//! [`ingest`](TrafficMonitor::ingest) or
//! [`ingest_line`](TrafficMonitor::ingest_line); the wall clock goes in through
//! [`tick`](TrafficMonitor::tick). Every call returns the events it caused, in
//! order. Nothing is flushed on drop.

use crate::alert::{AlertState, AlertStateMachine};
use crate::align::alert_window_floor;
use crate::alert_window::{AlertWindowAggregator, ClosedAlertWindow};
use crate::config::MonitorConfig;
use crate::error::{ParseError, Result, WindowError};
use crate::event::MonitorEvent;
use crate::parser::LogParser;
use crate::record::{LogRecord, Timestamp};
use crate::snapshot::{WatchSnapshot, WindowHistory};
use crate::watch::{WatchWindow, WatchWindowManager};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Ingestion counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitorStats {
    /// Raw lines seen by `ingest_line`.
    pub lines: u64,
    /// Blank lines.
    pub skipped: u64,
    /// Lines that could not be parsed.
    pub malformed: u64,
    /// Records added to a watch window.
    pub ingested: u64,
    /// Records dropped because their window was already flushed or lies
    /// behind the live one.
    pub late: u64,
    pub watch_windows: u64,
    pub alert_windows: u64,
}

/// Traffic monitor.
#[derive(Debug)]
pub struct TrafficMonitor {
    config: MonitorConfig,
    alert_duration: NonZeroU32,
    grace: chrono::Duration,
    watch: WatchWindowManager,
    /// `None` until the first watch window is flushed.
    alert: Option<AlertWindowAggregator>,
    machine: AlertStateMachine,
    history: WindowHistory,
    last_watch: Option<WatchSnapshot>,
    stats: MonitorStats,
}

impl TrafficMonitor {
    /// Create a monitor. Fails if the configuration is invalid.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let watch_duration = config.watch_duration()?;
        let alert_duration = config.alert_duration()?;

        info!(
            "traffic monitor started: watch {}s, alert {}min, threshold {}/s",
            watch_duration, alert_duration, config.alert.threshold
        );

        Ok(Self {
            grace: config.flush_grace(),
            history: WindowHistory::new(config.history.capacity),
            config,
            alert_duration,
            watch: WatchWindowManager::new(watch_duration),
            alert: None,
            machine: AlertStateMachine::new(),
            last_watch: None,
            stats: MonitorStats::default(),
        })
    }

    /// Add one record.
    ///
    /// Late records are logged, counted and dropped; they are not an error.
    pub fn ingest(&mut self, record: &LogRecord) -> Result<Vec<MonitorEvent>> {
        let mut events = Vec::new();

        match self.watch.ingest(record) {
            Ok(flushed) => {
                self.stats.ingested += 1;
                if let Some(window) = flushed {
                    self.fold_watch(window, &mut events)?;
                }
                self.close_behind_live(&mut events)?;
            }
            Err(WindowError::LateEvent { boundary, sealed }) => {
                self.stats.late += 1;
                warn!(
                    "dropping late event at {} for {}: window ending {} already closed (sealed through {})",
                    record.timestamp(),
                    record.section(),
                    boundary,
                    sealed
                );
            }
            Err(WindowError::OutOfOrder { boundary, live_end }) => {
                self.stats.late += 1;
                warn!(
                    "dropping out-of-order event at {} for {}: window ending {} is behind the live window ending {}",
                    record.timestamp(),
                    record.section(),
                    boundary,
                    live_end
                );
            }
            Err(e) => return Err(e.into()),
        }

        Ok(events)
    }

    /// Parse a raw line and ingest it.
    ///
    /// Unparseable lines are logged, counted and leave all state unchanged.
    pub fn ingest_line<P: LogParser + ?Sized>(
        &mut self,
        parser: &P,
        line: &str,
    ) -> Result<Vec<MonitorEvent>> {
        self.stats.lines += 1;
        match parser.parse(line) {
            Ok(record) => self.ingest(&record),
            Err(ParseError::Empty) => {
                self.stats.skipped += 1;
                Ok(Vec::new())
            }
            Err(e) => {
                self.stats.malformed += 1;
                warn!("skipping line: {} ({:?})", e, line.trim_end());
                Ok(Vec::new())
            }
        }
    }

    /// Advance the wall clock.
    ///
    /// Flushes the live watch window once `now` is the grace period past its
    /// end, then closes every alert window whose boundary plus grace has
    /// passed, even when no events arrived. An alert window the live watch
    /// window still feeds stays open.
    pub fn tick(&mut self, now: Timestamp) -> Result<Vec<MonitorEvent>> {
        let mut events = Vec::new();

        if let Some(window) = self.watch.flush_due(now, self.grace) {
            self.fold_watch(window, &mut events)?;
        }

        let mut through = now - self.grace;
        // The live window still feeds the alert window it ends in.
        if let Some(live_end) = self.watch.current_end() {
            through = through.min(self.boundary_before(live_end));
        }
        self.close_through(through, &mut events)?;

        Ok(events)
    }

    /// Fold a flushed watch window into the alert window it belongs to.
    fn fold_watch(&mut self, window: WatchWindow, events: &mut Vec<MonitorEvent>) -> Result<()> {
        let end = window.end();
        let snapshot = WatchSnapshot::from_window(&window);
        self.stats.watch_windows += 1;
        debug!(
            "watch window {} - {} closed: {} hits in {} sections",
            window.start(),
            end,
            snapshot.total_hits,
            snapshot.sections.len()
        );

        if self.alert.is_none() {
            self.alert = Some(AlertWindowAggregator::new(window.start(), self.alert_duration));
        }

        self.close_through(self.boundary_before(end), events)?;

        self.last_watch = Some(snapshot.clone());
        events.push(MonitorEvent::WatchWindowClosed(snapshot));

        let target = match self.alert.as_mut() {
            Some(aggregator) => {
                aggregator.absorb(window);
                aggregator.target_end()
            }
            None => return Ok(()),
        };
        if end == target {
            self.close_alert(target, events)?;
        }
        Ok(())
    }

    /// Close alert windows that end before the live watch window starts.
    fn close_behind_live(&mut self, events: &mut Vec<MonitorEvent>) -> Result<()> {
        match self.watch.current_end() {
            Some(live_end) => self.close_through(self.boundary_before(live_end), events),
            None => Ok(()),
        }
    }

    /// Close every alert window ending at or before `through`.
    ///
    /// Only the current window can hold hits. The empty windows that follow it
    /// are closed as one window ending on the last boundary at or before
    /// `through`. A gap of any length adds at most one window.
    fn close_through(&mut self, through: Timestamp, events: &mut Vec<MonitorEvent>) -> Result<()> {
        let target = match self.alert.as_ref().map(AlertWindowAggregator::target_end) {
            Some(target) if target <= through => target,
            _ => return Ok(()),
        };
        self.close_alert(target, events)?;

        let last = alert_window_floor(through, self.alert_duration);
        if last > target {
            debug!("no traffic from {} to {}, closing as one window", target, last);
            self.close_alert(last, events)?;
        }
        Ok(())
    }

    /// Latest alert boundary strictly before `t`.
    fn boundary_before(&self, t: Timestamp) -> Timestamp {
        let floor = alert_window_floor(t, self.alert_duration);
        if floor < t {
            floor
        } else {
            // Boundaries fall on whole minutes.
            alert_window_floor(t - chrono::Duration::minutes(1), self.alert_duration)
        }
    }

    /// Close the current alert window at `at` and start the next one.
    fn close_alert(&mut self, at: Timestamp, events: &mut Vec<MonitorEvent>) -> Result<()> {
        let aggregator = match self.alert.take() {
            Some(aggregator) => aggregator,
            None => return Ok(()),
        };
        let closed = aggregator.close(self.config.alert.threshold, at)?;
        self.alert = Some(closed.next(self.alert_duration));
        self.watch.seal_through(at);
        self.stats.alert_windows += 1;

        debug!(
            "alert window {} - {} closed: {} hits, {:.2}/s",
            closed.start(),
            closed.end(),
            closed.total_hits(),
            closed.average()
        );

        let transition = self.machine.evaluate(&closed);
        self.history.push(closed.clone());
        events.push(MonitorEvent::AlertWindowClosed(closed));

        if let Some(event) = transition {
            info!("[{}] {}", event.kind.as_str(), event.message);
            events.push(MonitorEvent::Alert(event));
        }
        Ok(())
    }

    pub fn alert_state(&self) -> AlertState {
        self.machine.state()
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Most recent closed alert windows, oldest first.
    pub fn history(&self) -> &WindowHistory {
        &self.history
    }

    /// Snapshot of the most recently flushed watch window.
    pub fn last_watch_snapshot(&self) -> Option<&WatchSnapshot> {
        self.last_watch.as_ref()
    }

    /// Most recent closed alert window.
    pub fn last_alert_window(&self) -> Option<&ClosedAlertWindow> {
        self.history.latest()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

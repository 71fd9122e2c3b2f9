// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert window aggregation.
//!
//! An [`AlertWindowAggregator`] folds flushed watch windows until its boundary
//! is reached, then [`close`](AlertWindowAggregator::close) turns it into an
//! immutable [`ClosedAlertWindow`]. The next aggregator always starts where the
//! closed one ended, so windows tile the timeline without gaps or overlaps.
//! Whether the closed window should raise an alert is decided elsewhere.

use crate::align::alert_window_end;
use crate::error::WindowError;
use crate::record::Timestamp;
use crate::watch::WatchWindow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

/// Live alert window accumulating hit totals.
#[derive(Debug, Clone)]
pub struct AlertWindowAggregator {
    start: Timestamp,
    target_end: Timestamp,
    total_hits: u64,
    section_hits: HashMap<String, u64>,
    watch_windows: u32,
}

impl AlertWindowAggregator {
    /// Start a window at `start`, ending on the next alert boundary.
    pub fn new(start: Timestamp, duration_minutes: NonZeroU32) -> Self {
        Self {
            start,
            target_end: alert_window_end(start, duration_minutes),
            total_hits: 0,
            section_hits: HashMap::new(),
            watch_windows: 0,
        }
    }

    /// Fold a flushed watch window into this alert window.
    pub fn absorb(&mut self, window: WatchWindow) {
        for stats in window.into_sections() {
            self.total_hits += stats.hits();
            match self.section_hits.get_mut(stats.section()) {
                Some(total) => *total += stats.hits(),
                None => {
                    self.section_hits
                        .insert(stats.section().to_string(), stats.hits());
                }
            }
        }
        self.watch_windows += 1;
    }

    /// Close the window at `now` and evaluate its average against `threshold`.
    ///
    /// Fails if `now` is not strictly after the window start.
    pub fn close(self, threshold: f64, now: Timestamp) -> Result<ClosedAlertWindow, WindowError> {
        let elapsed = match (now - self.start).to_std() {
            Ok(elapsed) if !elapsed.is_zero() => elapsed.as_secs_f64(),
            _ => {
                return Err(WindowError::NonPositiveElapsed {
                    start: self.start,
                    close: now,
                })
            }
        };

        let average = self.total_hits as f64 / elapsed;

        Ok(ClosedAlertWindow {
            start: self.start,
            end: now,
            total_hits: self.total_hits,
            section_hits: self.section_hits.into_iter().collect(),
            watch_windows: self.watch_windows,
            average,
            threshold,
            is_alert: average > threshold,
        })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Boundary at which this window is due to close.
    pub fn target_end(&self) -> Timestamp {
        self.target_end
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Hits for `section` so far.
    pub fn section_hits(&self, section: &str) -> u64 {
        self.section_hits.get(section).copied().unwrap_or(0)
    }

    /// Number of watch windows absorbed.
    pub fn watch_windows(&self) -> u32 {
        self.watch_windows
    }
}

/// Immutable result of a closed alert window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedAlertWindow {
    start: Timestamp,
    end: Timestamp,
    total_hits: u64,
    section_hits: BTreeMap<String, u64>,
    watch_windows: u32,
    /// Hits per second over `end - start`.
    average: f64,
    threshold: f64,
    is_alert: bool,
}

impl ClosedAlertWindow {
    /// Aggregator for the window that follows this one.
    pub fn next(&self, duration_minutes: NonZeroU32) -> AlertWindowAggregator {
        AlertWindowAggregator::new(self.end, duration_minutes)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    pub fn section_hits(&self) -> &BTreeMap<String, u64> {
        &self.section_hits
    }

    pub fn watch_windows(&self) -> u32 {
        self.watch_windows
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether the average exceeded the threshold.
    pub fn is_alert(&self) -> bool {
        self.is_alert
    }

    /// Up to `n` sections by hits, highest first.
    pub fn top_sections(&self, n: usize) -> Vec<(&str, u64)> {
        let mut sections: Vec<(&str, u64)> = self
            .section_hits
            .iter()
            .map(|(section, hits)| (section.as_str(), *hits))
            .collect();
        sections.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        sections.truncate(n);
        sections
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogRecord;
    use crate::watch::WatchWindowManager;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration};

    fn at(s: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn two_minutes() -> NonZeroU32 {
        NonZeroU32::new(2).unwrap()
    }

    fn window_with(hits: &[(&str, u64)], time: &str) -> WatchWindow {
        let mut manager = WatchWindowManager::new(NonZeroU32::new(10).unwrap());
        for (section, count) in hits {
            for _ in 0..*count {
                let record = LogRecord::new("h", *section, 200, 10, at(time)).unwrap();
                manager.ingest(&record).unwrap();
            }
        }
        manager
            .flush_due(at(time) + Duration::minutes(1), Duration::zero())
            .unwrap()
    }

    #[test]
    fn test_target_end_from_start() {
        let agg = AlertWindowAggregator::new(at("2025-03-09T10:00:00+00:00"), two_minutes());
        assert_eq!(agg.target_end(), at("2025-03-09T10:02:00+00:00"));
    }

    #[test]
    fn test_absorb_totals() {
        let mut agg = AlertWindowAggregator::new(at("2025-03-09T10:00:00+00:00"), two_minutes());
        agg.absorb(window_with(&[("/api", 3), ("/img", 1)], "2025-03-09T10:00:05+00:00"));
        agg.absorb(window_with(&[("/api", 2)], "2025-03-09T10:00:15+00:00"));

        assert_eq!(agg.total_hits(), 6);
        assert_eq!(agg.section_hits("/api"), 5);
        assert_eq!(agg.section_hits("/img"), 1);
        assert_eq!(agg.section_hits("/none"), 0);
        assert_eq!(agg.watch_windows(), 2);
    }

    #[test]
    fn test_close_above_threshold() {
        let mut agg = AlertWindowAggregator::new(at("2025-03-09T10:00:00+00:00"), two_minutes());
        agg.absorb(window_with(&[("/api", 1300)], "2025-03-09T10:00:05+00:00"));

        let closed = agg.close(10.0, at("2025-03-09T10:02:00+00:00")).unwrap();
        assert_relative_eq!(closed.average(), 1300.0 / 120.0);
        assert!(closed.is_alert());
        assert_relative_eq!(closed.duration_secs(), 120.0);
    }

    #[test]
    fn test_close_at_threshold_is_not_alert() {
        let mut agg = AlertWindowAggregator::new(at("2025-03-09T10:00:00+00:00"), two_minutes());
        agg.absorb(window_with(&[("/api", 1200)], "2025-03-09T10:00:05+00:00"));

        let closed = agg.close(10.0, at("2025-03-09T10:02:00+00:00")).unwrap();
        assert_relative_eq!(closed.average(), 10.0);
        assert!(!closed.is_alert());
    }

    #[test]
    fn test_close_non_positive_elapsed() {
        let start = at("2025-03-09T10:00:00+00:00");
        let agg = AlertWindowAggregator::new(start, two_minutes());
        let err = agg.clone().close(1.0, start).unwrap_err();
        assert!(matches!(err, WindowError::NonPositiveElapsed { .. }));

        let err = agg
            .close(1.0, start - Duration::seconds(5))
            .unwrap_err();
        assert!(matches!(err, WindowError::NonPositiveElapsed { .. }));
    }

    #[test]
    fn test_windows_tile() {
        let agg = AlertWindowAggregator::new(at("2025-03-09T10:00:00+00:00"), two_minutes());
        let first = agg.close(1.0, at("2025-03-09T10:02:00+00:00")).unwrap();

        let next = first.next(two_minutes());
        assert_eq!(next.start(), first.end());
        assert_eq!(next.target_end(), at("2025-03-09T10:04:00+00:00"));
        assert_eq!(next.total_hits(), 0);

        let second = next.close(1.0, at("2025-03-09T10:04:00+00:00")).unwrap();
        assert_eq!(second.start(), first.end());
    }

    #[test]
    fn test_top_sections() {
        let mut agg = AlertWindowAggregator::new(at("2025-03-09T10:00:00+00:00"), two_minutes());
        agg.absorb(window_with(
            &[("/a", 1), ("/b", 5), ("/c", 5), ("/d", 2)],
            "2025-03-09T10:00:05+00:00",
        ));
        let closed = agg.close(100.0, at("2025-03-09T10:02:00+00:00")).unwrap();
        assert_eq!(closed.top_sections(3), vec![("/b", 5), ("/c", 5), ("/d", 2)]);
    }

    #[test]
    fn test_closed_window_json() {
        let agg = AlertWindowAggregator::new(at("2025-03-09T10:00:00+00:00"), two_minutes());
        let closed = agg.close(1.0, at("2025-03-09T10:02:00+00:00")).unwrap();
        let json = closed.to_json().unwrap();
        assert!(json.contains("\"average\""));
        let restored: ClosedAlertWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, closed);
    }
}

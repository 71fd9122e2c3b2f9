// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Watch window management.
//!
//! The manager owns the live bucket set. A window is flushed either when an
//! event lands in a later window or when the wall clock passes its end
//! (see [`WatchWindowManager::flush_due`]). Flushed windows are handed out by
//! value and never touched again: anything arriving for them afterwards is a
//! late event.

use crate::align::{watch_window_end, watch_window_start};
use crate::error::WindowError;
use crate::record::{LogRecord, Timestamp};
use crate::section::SectionStats;
use std::collections::HashMap;
use std::num::NonZeroU32;

/// All section accumulators of one watch window.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchWindow {
    start: Timestamp,
    end: Timestamp,
    sections: HashMap<String, SectionStats>,
}

impl WatchWindow {
    fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
            sections: HashMap::new(),
        }
    }

    fn record(&mut self, record: &LogRecord) {
        if !self.sections.contains_key(record.section()) {
            self.sections.insert(
                record.section().to_string(),
                SectionStats::new(record.section()),
            );
        }
        if let Some(stats) = self.sections.get_mut(record.section()) {
            stats.add_hit(record.host(), record.status(), record.size());
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Inclusive end boundary.
    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn section(&self, section: &str) -> Option<&SectionStats> {
        self.sections.get(section)
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionStats> {
        self.sections.values()
    }

    /// Consume the window, yielding its accumulators.
    pub fn into_sections(self) -> impl Iterator<Item = SectionStats> {
        self.sections.into_values()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Hits across all sections.
    pub fn total_hits(&self) -> u64 {
        self.sections.values().map(SectionStats::hits).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Owner of the live watch window.
#[derive(Debug)]
pub struct WatchWindowManager {
    duration: NonZeroU32,
    current: Option<WatchWindow>,
    /// Every window ending at or before this instant is closed for good.
    sealed_through: Option<Timestamp>,
}

impl WatchWindowManager {
    pub fn new(duration: NonZeroU32) -> Self {
        Self {
            duration,
            current: None,
            sealed_through: None,
        }
    }

    /// Add a record to its watch window.
    ///
    /// If the record falls into a later window than the live one, the live
    /// window is flushed first and returned. Records belonging to an already
    /// flushed window are rejected with [`WindowError::LateEvent`], records
    /// behind the live window with [`WindowError::OutOfOrder`]. Either way all
    /// state is left untouched.
    pub fn ingest(&mut self, record: &LogRecord) -> Result<Option<WatchWindow>, WindowError> {
        let boundary = watch_window_end(record.timestamp(), self.duration);

        if let Some(sealed) = self.sealed_through {
            if boundary <= sealed {
                return Err(WindowError::LateEvent { boundary, sealed });
            }
        }

        let flushed = match self.current.as_ref().map(|w| (w.start, w.end)) {
            Some((_, end)) if end == boundary => None,
            Some((_, end)) if boundary < end => {
                // Never flushed, but already behind the live window.
                return Err(WindowError::OutOfOrder {
                    boundary,
                    live_end: end,
                });
            }
            Some(_) => self.take(),
            None => None,
        };

        self.current
            .get_or_insert_with(|| {
                WatchWindow::new(watch_window_start(boundary, self.duration), boundary)
            })
            .record(record);

        Ok(flushed)
    }

    /// Flush the live window if `now` is at least `grace` past its end.
    pub fn flush_due(&mut self, now: Timestamp, grace: chrono::Duration) -> Option<WatchWindow> {
        let due = self
            .current
            .as_ref()
            .map_or(false, |window| now >= window.end + grace);
        if due {
            self.take()
        } else {
            None
        }
    }

    /// Refuse any record whose window ends at or before `through`.
    ///
    /// The live window must already have been flushed if it ends in that range.
    pub fn seal_through(&mut self, through: Timestamp) {
        if self.sealed_through.map_or(true, |sealed| through > sealed) {
            self.sealed_through = Some(through);
        }
    }

    /// End of the live window, if any.
    pub fn current_end(&self) -> Option<Timestamp> {
        self.current.as_ref().map(WatchWindow::end)
    }

    pub fn current(&self) -> Option<&WatchWindow> {
        self.current.as_ref()
    }

    pub fn sealed_through(&self) -> Option<Timestamp> {
        self.sealed_through
    }

    pub fn duration(&self) -> NonZeroU32 {
        self.duration
    }

    fn take(&mut self) -> Option<WatchWindow> {
        let window = self.current.take()?;
        self.seal_through(window.end);
        Some(window)
    }
}

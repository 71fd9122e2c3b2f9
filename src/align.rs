// Hitwatch - HTTP access log traffic monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Time window alignment.
//!
//! Watch windows are aligned on multiples of their duration counted from the
//! top of the minute; alert windows on multiples of their duration counted in
//! minutes from the top of the hour. Both functions work in the timestamp's
//! own offset, so alignment follows the local clock of the log.

use crate::record::Timestamp;
use chrono::{Duration, Timelike};
use std::num::NonZeroU32;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// End boundary of the watch window containing `timestamp`.
///
/// Returns the smallest instant `>= timestamp` whose offset into the minute is
/// a multiple of `duration_secs`. A timestamp already on a boundary is its own
/// window end. Durations that do not divide 60 are accepted, but alignment then
/// restarts at every minute.
pub fn watch_window_end(timestamp: Timestamp, duration_secs: NonZeroU32) -> Timestamp {
    let step = i64::from(duration_secs.get()) * NANOS_PER_SEC;
    let into_minute =
        i64::from(timestamp.second()) * NANOS_PER_SEC + i64::from(timestamp.nanosecond());
    let minute_start = timestamp - Duration::nanoseconds(into_minute);

    let rounded = (into_minute + step - 1) / step * step;
    minute_start + Duration::nanoseconds(rounded)
}

/// Start of the watch window that ends at `end`.
pub fn watch_window_start(end: Timestamp, duration_secs: NonZeroU32) -> Timestamp {
    end - Duration::seconds(i64::from(duration_secs.get()))
}

/// End boundary of the alert window containing `timestamp`.
///
/// Returns the first instant strictly after `timestamp` with zero seconds and a
/// minute-of-hour that is a multiple of `duration_minutes`. A timestamp sitting
/// exactly on a boundary maps to the following one, so a window started on a
/// boundary never ends where it starts.
pub fn alert_window_end(timestamp: Timestamp, duration_minutes: NonZeroU32) -> Timestamp {
    let minutes = duration_minutes.get();
    let into_hour = Duration::minutes(i64::from(timestamp.minute()))
        + Duration::seconds(i64::from(timestamp.second()))
        + Duration::nanoseconds(i64::from(timestamp.nanosecond()));
    let hour_start = timestamp - into_hour;

    // Minute 0 of the next hour is always a multiple.
    let next = (timestamp.minute() / minutes)
        .saturating_add(1)
        .saturating_mul(minutes)
        .min(60);
    hour_start + Duration::minutes(i64::from(next))
}

/// Latest alert boundary at or before `timestamp`.
///
/// Boundaries are never more than `min(duration_minutes, 60)` minutes apart,
/// so the search starts two such steps back and walks forward.
pub fn alert_window_floor(timestamp: Timestamp, duration_minutes: NonZeroU32) -> Timestamp {
    let step = Duration::minutes(i64::from(duration_minutes.get().min(60)));
    let mut floor = alert_window_end(timestamp - step - step, duration_minutes);
    loop {
        let next = alert_window_end(floor, duration_minutes);
        if next > timestamp {
            return floor;
        }
        floor = next;
    }
}

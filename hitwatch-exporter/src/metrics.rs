// Hitwatch Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for traffic monitoring.
//!
//! This module defines all Prometheus metrics exposed by the exporter
//! and provides functions to update them from monitor events.

use hitwatch::{AlertEvent, AlertStatus, ClosedAlertWindow, MonitorStats, WatchSnapshot};
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter_vec, Encoder, Gauge, GaugeVec,
    IntCounterVec, TextEncoder,
};

lazy_static! {
    // ============================================================
    // Watch Window Metrics (from WatchSnapshot)
    // ============================================================

    /// Hits per section in the last closed watch window.
    pub static ref SECTION_HITS: GaugeVec = register_gauge_vec!(
        "hitwatch_section_hits",
        "Hits per section in the last closed watch window",
        &["section"]
    ).expect("hitwatch_section_hits registers once");

    /// Error rate per section in the last closed watch window.
    pub static ref SECTION_ERROR_RATE: GaugeVec = register_gauge_vec!(
        "hitwatch_section_error_rate",
        "Percentage of responses with status >= 400 per section in the last watch window",
        &["section"]
    ).expect("hitwatch_section_error_rate registers once");

    /// Hits in the last closed watch window.
    pub static ref WATCH_HITS: Gauge = register_gauge!(
        "hitwatch_watch_window_hits",
        "Total hits in the last closed watch window"
    ).expect("hitwatch_watch_window_hits registers once");

    // ============================================================
    // Alert Metrics
    // ============================================================

    /// Average hits per second over the last closed alert window.
    pub static ref ALERT_AVERAGE_HITS: Gauge = register_gauge!(
        "hitwatch_alert_average_hits",
        "Average hits per second over the last closed alert window"
    ).expect("hitwatch_alert_average_hits registers once");

    /// Configured alert threshold.
    pub static ref ALERT_THRESHOLD: Gauge = register_gauge!(
        "hitwatch_alert_threshold",
        "Alert threshold in hits per second"
    ).expect("hitwatch_alert_threshold registers once");

    /// Alert state (0 = normal, 1 = alerting).
    pub static ref ALERT_STATE: Gauge = register_gauge!(
        "hitwatch_alert_state",
        "Traffic alert state (0=Normal, 1=Alerting)"
    ).expect("hitwatch_alert_state registers once");

    /// Alert transitions (labeled by kind).
    pub static ref ALERT_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "hitwatch_alert_events_total",
        "Total alert transitions",
        &["kind"]
    ).expect("hitwatch_alert_events_total registers once");

    // ============================================================
    // Ingestion Metrics
    // ============================================================

    /// Input lines by outcome.
    pub static ref LINES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "hitwatch_lines_total",
        "Input lines processed, by outcome",
        &["outcome"]
    ).expect("hitwatch_lines_total registers once");
}

/// Replace the per-section gauges with the sections of `snapshot`.
pub fn update_watch_metrics(snapshot: &WatchSnapshot) {
    SECTION_HITS.reset();
    SECTION_ERROR_RATE.reset();
    WATCH_HITS.set(snapshot.total_hits as f64);

    for section in &snapshot.sections {
        SECTION_HITS
            .with_label_values(&[section.section.as_str()])
            .set(section.hits as f64);
        if let Some(rate) = section.error_rate {
            SECTION_ERROR_RATE
                .with_label_values(&[section.section.as_str()])
                .set(rate);
        }
    }
}

/// Update alert metrics from a closed alert window.
pub fn update_alert_window_metrics(window: &ClosedAlertWindow) {
    ALERT_AVERAGE_HITS.set(window.average());
    ALERT_THRESHOLD.set(window.threshold());
}

/// Record an alert transition.
pub fn record_alert_event(event: &AlertEvent) {
    ALERT_EVENTS_TOTAL
        .with_label_values(&[event.kind.as_str()])
        .inc();
}

/// Update the alert state gauge.
pub fn update_alert_state(status: AlertStatus) {
    ALERT_STATE.set(if status.is_alerting() { 1.0 } else { 0.0 });
}

/// Advance the line counters by the difference between two stats readings.
pub fn update_line_metrics(previous: &MonitorStats, current: &MonitorStats) {
    let outcomes = [
        ("ingested", previous.ingested, current.ingested),
        ("late", previous.late, current.late),
        ("malformed", previous.malformed, current.malformed),
        ("skipped", previous.skipped, current.skipped),
    ];
    for (outcome, before, after) in outcomes {
        let delta = after.saturating_sub(before);
        if delta > 0 {
            LINES_TOTAL.with_label_values(&[outcome]).inc_by(delta);
        }
    }
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

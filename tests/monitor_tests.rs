// Hitwatch - Integration Tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! End-to-end tests of the traffic monitor driven by raw log lines.

use chrono::{DateTime, Duration, Timelike};
use hitwatch::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::num::NonZeroU32;

// ============================================================================
// Helper Functions
// ============================================================================

fn at(s: &str) -> Timestamp {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn line(host: &str, path: &str, status: u16, size: u64, time: Timestamp) -> String {
    format!(
        r#"{} - - [{}] "GET {} HTTP/1.1" {} {}"#,
        host,
        time.format("%d/%b/%Y:%H:%M:%S %z"),
        path,
        status,
        size
    )
}

fn monitor(threshold: f64) -> (TrafficMonitor, CommonLogParser) {
    (
        TrafficMonitor::new(MonitorConfig::new(threshold)).unwrap(),
        CommonLogParser::new().unwrap(),
    )
}

/// Feed `count` hits spread evenly over the open interval `(start, start + span)`.
fn feed(
    monitor: &mut TrafficMonitor,
    parser: &CommonLogParser,
    start: Timestamp,
    span_secs: i64,
    count: i64,
) -> Vec<MonitorEvent> {
    let span_ms = span_secs * 1000 - 2000;
    let mut events = Vec::new();
    for i in 0..count {
        let time = start + Duration::milliseconds(1000 + i * span_ms / count.max(1));
        let host = format!("10.0.0.{}", i % 7);
        events.extend(
            monitor
                .ingest_line(parser, &line(&host, "/api/items", 200, 128, time))
                .unwrap(),
        );
    }
    events
}

fn alerts(events: &[MonitorEvent]) -> Vec<&AlertEvent> {
    events.iter().filter_map(MonitorEvent::as_alert).collect()
}

fn closed_windows(events: &[MonitorEvent]) -> Vec<&ClosedAlertWindow> {
    events.iter().filter_map(MonitorEvent::as_alert_window).collect()
}

// ============================================================================
// Section 1: Alert Scenarios
// ============================================================================

#[test]
fn test_high_traffic_raises_alert() {
    let (mut monitor, parser) = monitor(10.0);
    let start = at("2025-03-09T10:00:00+00:00");

    assert!(alerts(&feed(&mut monitor, &parser, start, 120, 1300)).is_empty());

    let events = monitor
        .ingest_line(&parser, &line("10.0.0.9", "/", 200, 1, at("2025-03-09T10:02:05+00:00")))
        .unwrap();

    let raised = alerts(&events);
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].kind, AlertKind::Raised);
    assert_eq!(raised[0].timestamp, at("2025-03-09T10:02:00+00:00"));
    assert!((raised[0].average - 10.833).abs() < 0.01);
    assert!(raised[0]
        .message
        .starts_with("High traffic generated an alert - hits = 10.83/s"));

    let window = monitor.last_alert_window().unwrap();
    assert_eq!(window.total_hits(), 1300);
    assert_eq!(window.start(), start);
    assert_eq!(monitor.alert_state().status, AlertStatus::Alerting);
}

#[test]
fn test_traffic_drop_recovers() {
    let (mut monitor, parser) = monitor(10.0);

    feed(&mut monitor, &parser, at("2025-03-09T10:00:00+00:00"), 120, 1300);
    let events = feed(&mut monitor, &parser, at("2025-03-09T10:02:00+00:00"), 120, 500);
    assert_eq!(alerts(&events).len(), 1);

    let events = monitor
        .ingest_line(&parser, &line("10.0.0.9", "/", 200, 1, at("2025-03-09T10:04:05+00:00")))
        .unwrap();
    let recovered = alerts(&events);
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].kind, AlertKind::Recovered);
    assert!((recovered[0].average - 4.167).abs() < 0.01);
    assert_eq!(recovered[0].timestamp, at("2025-03-09T10:04:00+00:00"));
    assert_eq!(monitor.alert_state().status, AlertStatus::Normal);
    assert_eq!(monitor.history().len(), 2);
}

#[test]
fn test_sustained_traffic_alerts_once() {
    let (mut monitor, parser) = monitor(10.0);
    let mut events = Vec::new();
    for window in 0..4 {
        let start = at("2025-03-09T10:00:00+00:00") + Duration::minutes(2 * window);
        events.extend(feed(&mut monitor, &parser, start, 120, 1500));
    }
    let raised = alerts(&events);
    assert_eq!(raised.len(), 1);
    assert_eq!(closed_windows(&events).len(), 3);
}

// ============================================================================
// Section 2: Parsing Failures
// ============================================================================

#[test]
fn test_line_missing_status_and_size_changes_nothing() {
    let (mut monitor, parser) = monitor(10.0);
    let start = at("2025-03-09T10:00:00+00:00");
    monitor
        .ingest_line(&parser, &line("10.0.0.1", "/api", 200, 10, start + Duration::seconds(1)))
        .unwrap();

    let events = monitor
        .ingest_line(
            &parser,
            r#"10.0.0.1 - - [09/Mar/2025:10:00:02 +0000] "GET /api HTTP/1.1""#,
        )
        .unwrap();
    assert!(events.is_empty());

    let stats = monitor.stats();
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.ingested, 1);

    let events = monitor
        .ingest_line(&parser, &line("10.0.0.1", "/api", 200, 10, start + Duration::seconds(15)))
        .unwrap();
    let snapshot = events[0].as_watch_snapshot().unwrap();
    assert_eq!(snapshot.total_hits, 1);
    assert_eq!(snapshot.section("/api").unwrap().hits, 1);
}

#[test]
fn test_blank_lines_are_skipped() {
    let (mut monitor, parser) = monitor(10.0);
    monitor.ingest_line(&parser, "").unwrap();
    monitor.ingest_line(&parser, "\n").unwrap();
    assert_eq!(monitor.stats().skipped, 2);
    assert_eq!(monitor.stats().malformed, 0);
}

// ============================================================================
// Section 3: Window Invariants
// ============================================================================

#[test]
fn test_alert_windows_tile_across_gaps() {
    let (mut monitor, parser) = monitor(1.0);
    let times = [
        "2025-03-09T10:00:05+00:00",
        "2025-03-09T10:01:05+00:00",
        "2025-03-09T10:07:30+00:00",
        "2025-03-09T10:15:01+00:00",
        "2025-03-09T10:20:01+00:00",
    ];

    let mut events = Vec::new();
    for time in times {
        events.extend(
            monitor
                .ingest_line(&parser, &line("h", "/x", 200, 1, at(time)))
                .unwrap(),
        );
    }

    // Each quiet stretch closes as a single empty window.
    let windows = closed_windows(&events);
    let spans: Vec<(u64, f64)> = windows
        .iter()
        .map(|w| (w.total_hits(), w.duration_secs()))
        .collect();
    assert_eq!(
        spans,
        vec![
            (2, 120.0),
            (0, 240.0),
            (1, 120.0),
            (0, 360.0),
            (1, 120.0),
            (0, 240.0),
        ]
    );
    assert_eq!(windows[0].start(), at("2025-03-09T10:00:00+00:00"));
    assert_eq!(windows[5].end(), at("2025-03-09T10:20:00+00:00"));
    for pair in windows.windows(2) {
        assert_eq!(pair[0].end(), pair[1].start());
    }
}

#[test]
fn test_watch_windows_are_aligned_and_ordered() {
    let (mut monitor, parser) = monitor(100.0);
    let events = feed(&mut monitor, &parser, at("2025-03-09T10:00:00+00:00"), 60, 300);

    let snapshots: Vec<&WatchSnapshot> = events
        .iter()
        .filter_map(MonitorEvent::as_watch_snapshot)
        .collect();
    assert!(!snapshots.is_empty());
    for pair in snapshots.windows(2) {
        assert!(pair[0].end < pair[1].end);
    }
    for snapshot in snapshots {
        assert_eq!(snapshot.end.second() % 10, 0);
        assert_eq!(snapshot.end.nanosecond(), 0);
        assert_eq!((snapshot.end - snapshot.start).num_seconds(), 10);
    }
}

#[test]
fn test_late_lines_are_dropped() {
    let (mut monitor, parser) = monitor(10.0);
    let base = at("2025-03-09T10:00:00+00:00");
    for secs in [1, 12, 3, 25, 14] {
        monitor
            .ingest_line(&parser, &line("h", "/a", 200, 1, base + Duration::seconds(secs)))
            .unwrap();
    }
    assert_eq!(monitor.stats().late, 2);
    assert_eq!(monitor.stats().ingested, 3);
}

#[test]
fn test_tick_closes_windows_during_silence() {
    let (mut monitor, parser) = monitor(10.0);
    feed(&mut monitor, &parser, at("2025-03-09T10:00:00+00:00"), 120, 1300);

    let events = monitor.tick(at("2025-03-09T10:06:30+00:00")).unwrap();
    let windows = closed_windows(&events);
    assert_eq!(windows.len(), 3);
    assert_eq!(windows[2].end(), at("2025-03-09T10:06:00+00:00"));

    let kinds: Vec<AlertKind> = alerts(&events).iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![AlertKind::Raised, AlertKind::Recovered]);
}

#[test]
fn test_offsets_compare_by_instant() {
    let (mut monitor, parser) = monitor(10.0);
    monitor
        .ingest_line(&parser, &line("h", "/a", 200, 1, at("2025-03-09T12:00:01+02:00")))
        .unwrap();
    let events = monitor
        .ingest_line(&parser, &line("h", "/a", 200, 1, at("2025-03-09T10:00:11+00:00")))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(monitor.stats().late, 0);
}

// ============================================================================
// Section 4: Properties
// ============================================================================

#[test]
fn test_alerts_alternate_under_random_load() {
    let mut rng = StdRng::seed_from_u64(7);
    let (mut monitor, parser) = monitor(5.0);
    let mut events = Vec::new();

    for window in 0..20 {
        let start = at("2025-03-09T10:00:00+00:00") + Duration::minutes(2 * window);
        let count = rng.gen_range(0..1300);
        events.extend(feed(&mut monitor, &parser, start, 120, count));
    }
    events.extend(monitor.tick(at("2025-03-09T11:00:00+00:00")).unwrap());

    let kinds: Vec<AlertKind> = alerts(&events).iter().map(|a| a.kind).collect();
    for pair in kinds.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    if let Some(first) = kinds.first() {
        assert_eq!(*first, AlertKind::Raised);
    }
}

#[test]
fn test_section_counts_are_consistent() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut stats = SectionStats::new("/api");
    for _ in 0..500 {
        let host = format!("host-{}", rng.gen_range(0..20));
        let status = [200, 201, 304, 404, 500][rng.gen_range(0..5)];
        stats.add_hit(&host, status, rng.gen_range(0..10_000));
    }
    assert_eq!(stats.hits(), 500);
    assert_eq!(stats.status().total(), 500);
    assert_eq!(stats.hosts().total(), 500);
}

#[test]
fn test_error_rate_bounds() {
    let mut ok = SectionStats::new("/ok");
    let mut bad = SectionStats::new("/bad");
    for _ in 0..10 {
        ok.add_hit("h", 200, 1);
        bad.add_hit("h", 503, 1);
    }
    assert_eq!(ok.error_rate(), Some(0.0));
    assert_eq!(bad.error_rate(), Some(100.0));
    assert_eq!(SectionStats::new("/empty").error_rate(), None);
}

#[test]
fn test_watch_alignment_property() {
    let mut rng = StdRng::seed_from_u64(1);
    let base = at("2025-03-09T00:00:00+00:00");
    for _ in 0..1000 {
        let t = base + Duration::milliseconds(rng.gen_range(0..86_400_000));
        for d in [1u32, 5, 10, 15, 30, 60] {
            let end = watch_window_end(t, NonZeroU32::new(d).unwrap());
            assert!(end >= t);
            assert!(end - t < Duration::seconds(i64::from(d)));
            assert_eq!(end.nanosecond(), 0);
            assert_eq!(end.second() % d, 0);
        }
    }
}

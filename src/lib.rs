//! # Hitwatch - HTTP access log traffic monitor
//!
//! Watches a stream of access log records, summarizes traffic per section over
//! short watch windows, and raises or clears a high-traffic alert from the
//! average hit rate over longer alert windows.
//!
//! ## Key Features
//!
//! - **Aligned windows**: Watch windows on the top of the minute, alert windows
//!   on the top of the hour
//! - **Event time**: Windows are driven by record timestamps, with a wall-clock
//!   tick for quiet periods
//! - **Edge-triggered alerts**: Raised and recovered events always alternate
//! - **Pluggable parsing**: Common/Combined Log Format out of the box
//!
//! ## Quick Start
//!
//! ```rust
//! use hitwatch::{CommonLogParser, MonitorConfig, TrafficMonitor};
//!
//! let parser = CommonLogParser::new().unwrap();
//! let mut monitor = TrafficMonitor::new(MonitorConfig::new(10.0)).unwrap();
//!
//! let lines = [
//!     r#"10.0.0.1 - - [09/Mar/2025:10:00:01 +0000] "GET /api/users HTTP/1.1" 200 512"#,
//!     r#"10.0.0.2 - - [09/Mar/2025:10:00:04 +0000] "GET /api/orders HTTP/1.1" 500 48"#,
//!     r#"10.0.0.1 - - [09/Mar/2025:10:00:12 +0000] "GET /static/app.js HTTP/1.1" 200 9000"#,
//! ];
//!
//! let mut events = Vec::new();
//! for line in lines {
//!     events.extend(monitor.ingest_line(&parser, line).unwrap());
//! }
//!
//! // The third line closed the first watch window.
//! let snapshot = events[0].as_watch_snapshot().unwrap();
//! assert_eq!(snapshot.total_hits, 2);
//! assert_eq!(snapshot.sections[0].section, "/api");
//! ```
//!
//! ## Modules
//!
//! - [`align`]: Window boundary arithmetic
//! - [`section`]: Per-section accumulators
//! - [`watch`]: Watch window manager
//! - [`alert_window`]: Alert window aggregation
//! - [`alert`]: Alert state machine
//! - [`monitor`]: Orchestration of all of the above
//! - [`parser`]: Log line parsing

// Modules
pub mod alert;
pub mod alert_window;
pub mod align;
pub mod config;
pub mod error;
pub mod event;
pub mod monitor;
pub mod parser;
pub mod record;
pub mod section;
pub mod snapshot;
pub mod watch;

// Re-exports for convenient access
pub use alert::{AlertState, AlertStateMachine, AlertStatus};
pub use alert_window::{AlertWindowAggregator, ClosedAlertWindow};
pub use align::{alert_window_end, alert_window_floor, watch_window_end, watch_window_start};
pub use config::{AlertConfig, HistoryConfig, MonitorConfig, WatchConfig};
pub use error::{ConfigError, HitwatchError, ParseError, RecordError, Result, WindowError};
pub use event::{AlertEvent, AlertKind, MonitorEvent};
pub use monitor::{MonitorStats, TrafficMonitor};
pub use parser::{CommonLogParser, LogParser};
pub use record::{LogRecord, Timestamp};
pub use section::{Histogram, SectionStats};
pub use snapshot::{SectionSummary, WatchSnapshot, WindowHistory};
pub use watch::{WatchWindow, WatchWindowManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

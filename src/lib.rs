//! Stockwatch: Warehouse Withdrawal Watcher
//!
//! Tails the append-only CSV log a game server writes for warehouse actions and
//! raises an alert when one player takes too much of a tracked item within a
//! tumbling time window. Each (day, player, item, warehouse) alerts at most once.
//!
//! # Features
//!
//! - **Resumable Tailing**: Cursor over event ids, persisted after every cycle
//! - **Tumbling Windows**: Per-key sums that reset once the window has elapsed
//! - **Threshold Modes**: `gte` (default) or strict `gt` comparison
//! - **Daily Deduplication**: First trigger per key per day wins
//! - **Webhook Delivery**: Discord embeds with an explicit role allow-list
//!
//! # Example
//!
//! ```no_run
//! use stockwatch::alerts::MemoryNotifier;
//! use stockwatch::config::MonitorConfig;
//! use stockwatch::ingest::CsvLogSource;
//! use stockwatch::monitor::MonitorLoop;
//! use stockwatch::storage::JsonCursorStore;
//!
//! # async fn example() {
//! let config = MonitorConfig::new("https://discord.com/api/webhooks/...")
//!     .with_item(7, "Medkit", 50);
//! let source = CsvLogSource::new(&config.log_path, config.timezone);
//! let store = JsonCursorStore::new(&config.state_path);
//!
//! let mut monitor = MonitorLoop::new(config, source, MemoryNotifier::new(), store);
//! let report = monitor.run_cycle().await.unwrap();
//! println!("Alerts: {}", report.alerts_sent);
//! # }
//! ```

pub mod alerts;
pub mod config;
pub mod ingest;
pub mod monitor;
pub mod storage;
pub mod window;

// Re-export commonly used types
pub use alerts::{Alert, AlertDeduper, NotificationSink, ThresholdMode};
pub use config::{ConfigError, ItemRule, MonitorConfig};
pub use ingest::{CsvLogSource, Event, LogSource};
pub use monitor::{CycleReport, MonitorLoop};
pub use window::{WindowAggregator, WindowKey};

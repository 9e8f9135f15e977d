//! Watcher loop
//!
//! Polls the event log on a fixed interval, feeds TAKE events for tracked items
//! through the window aggregator and threshold, and hands first-time triggers
//! to the notification sink.

pub mod runner;
pub mod session;

pub use runner::{CycleReport, MonitorError, MonitorLoop, MonitorPhase};
pub use session::MonitorSession;

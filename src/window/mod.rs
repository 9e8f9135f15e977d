//! Tumbling-window aggregation keyed by day, subject, item and location

pub mod aggregator;

pub use aggregator::{day_of, WindowAggregator, WindowKey, WindowState};

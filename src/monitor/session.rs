//! In-memory state of one watcher run

use crate::alerts::AlertDeduper;
use crate::window::WindowAggregator;

/// Window sums and fired keys, owned by the loop and rebuilt empty on restart
#[derive(Debug)]
pub struct MonitorSession {
    pub windows: WindowAggregator,
    pub alerted: AlertDeduper,
}

impl MonitorSession {
    pub fn new(window: chrono::Duration) -> Self {
        Self {
            windows: WindowAggregator::new(window),
            alerted: AlertDeduper::new(),
        }
    }

    /// Forget every key from days before `today`
    pub fn evict_before(&mut self, today: &str) -> (usize, usize) {
        (
            self.windows.evict_before(today),
            self.alerted.evict_before(today),
        )
    }
}

//! Once-per-key alert deduplication

use std::collections::HashSet;

use crate::window::WindowKey;

/// Keys that already produced an alert during this run
///
/// The first trigger for a key wins; later triggers for the same key are never
/// announced, however large the sum grows.
#[derive(Debug, Default)]
pub struct AlertDeduper {
    fired: HashSet<WindowKey>,
}

impl AlertDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fired(&self, key: &WindowKey) -> bool {
        self.fired.contains(key)
    }

    /// Record a key; returns false if it was already present
    pub fn mark_fired(&mut self, key: WindowKey) -> bool {
        self.fired.insert(key)
    }

    /// Drop every key whose day sorts before `day`
    pub fn evict_before(&mut self, day: &str) -> usize {
        let before = self.fired.len();
        self.fired.retain(|key| key.day.as_str() >= day);
        before - self.fired.len()
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(day: &str, location: &str) -> WindowKey {
        WindowKey {
            day: day.to_string(),
            subject_id: 42,
            item_id: 7,
            location: location.to_string(),
        }
    }

    #[test]
    fn test_first_mark_wins() {
        let mut dedup = AlertDeduper::new();
        let k = key("2024-05-01", "LSPD");

        assert!(!dedup.has_fired(&k));
        assert!(dedup.mark_fired(k.clone()));
        assert!(dedup.has_fired(&k));
        assert!(!dedup.mark_fired(k));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_keys_are_distinct_per_day_and_location() {
        let mut dedup = AlertDeduper::new();
        dedup.mark_fired(key("2024-05-01", "LSPD"));

        assert!(!dedup.has_fired(&key("2024-05-02", "LSPD")));
        assert!(!dedup.has_fired(&key("2024-05-01", "EMS")));
    }

    #[test]
    fn test_evict_before() {
        let mut dedup = AlertDeduper::new();
        dedup.mark_fired(key("2024-04-30", "LSPD"));
        dedup.mark_fired(key("2024-05-01", "LSPD"));
        dedup.mark_fired(key("2024-05-02", "LSPD"));

        assert_eq!(dedup.evict_before("2024-05-02"), 2);
        assert!(dedup.has_fired(&key("2024-05-02", "LSPD")));
        assert!(!dedup.has_fired(&key("2024-05-01", "LSPD")));
    }
}

//! Per-key tumbling window sums

use std::collections::HashMap;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::ingest::Event;

/// Day key layout
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Aggregation and dedup unit: civil day, subject, item, location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    pub day: String,
    pub subject_id: u64,
    pub item_id: u32,
    pub location: String,
}

impl WindowKey {
    /// Key for an event; the day is taken from the event's own zoned timestamp
    pub fn for_event(event: &Event) -> Self {
        Self {
            day: day_of(&event.timestamp),
            subject_id: event.subject_id,
            item_id: event.item_id,
            location: event.location.clone(),
        }
    }
}

/// Civil day string of a zoned timestamp
pub fn day_of(ts: &DateTime<Tz>) -> String {
    ts.format(DAY_FORMAT).to_string()
}

/// Current window of one key
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub window_start: DateTime<Tz>,
    pub running_sum: u64,
}

impl WindowState {
    fn open(at: DateTime<Tz>) -> Self {
        Self {
            window_start: at,
            running_sum: 0,
        }
    }
}

/// Tumbling-window aggregator
///
/// A window opens at the first event of a key and lasts `window` long. The
/// first event at or past its end discards the old sum entirely and opens a
/// new window at that event's timestamp.
#[derive(Debug)]
pub struct WindowAggregator {
    window: chrono::Duration,
    states: HashMap<WindowKey, WindowState>,
}

impl WindowAggregator {
    pub fn new(window: chrono::Duration) -> Self {
        Self {
            window,
            states: HashMap::new(),
        }
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Add an event's quantity to its key and return the key's current sum
    pub fn apply(&mut self, event: &Event) -> u64 {
        let key = WindowKey::for_event(event);
        self.apply_at(key, event.timestamp, event.quantity)
    }

    /// Same as [`apply`](Self::apply) with the key already computed
    pub fn apply_at(&mut self, key: WindowKey, at: DateTime<Tz>, quantity: u64) -> u64 {
        let window = self.window;
        let state = self
            .states
            .entry(key)
            .or_insert_with(|| WindowState::open(at));

        if at.signed_duration_since(state.window_start) >= window {
            *state = WindowState::open(at);
        }

        state.running_sum = state.running_sum.saturating_add(quantity);
        state.running_sum
    }

    pub fn state(&self, key: &WindowKey) -> Option<&WindowState> {
        self.states.get(key)
    }

    /// Drop every key whose day sorts before `day`
    pub fn evict_before(&mut self, day: &str) -> usize {
        let before = self.states.len();
        self.states.retain(|key, _| key.day.as_str() >= day);
        before - self.states.len()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

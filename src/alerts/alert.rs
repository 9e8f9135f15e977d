//! Alert produced when a subject crosses an item limit

use chrono::DateTime;
use chrono_tz::Tz;

use crate::config::ItemRule;
use crate::ingest::Event;
use crate::window::WindowKey;

/// Everything a notification sink needs to describe one trigger
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub key: WindowKey,
    pub event_id: u64,
    pub subject_name: String,
    pub subject_id: u64,
    pub item_id: u32,
    pub item_name: String,
    pub location: String,
    /// Window sum at the triggering event
    pub total: u64,
    pub limit: u64,
    pub triggered_at: DateTime<Tz>,
}

impl Alert {
    /// Build the alert for the event that pushed `total` over the rule's limit
    pub fn new(key: WindowKey, event: &Event, rule: &ItemRule, total: u64) -> Self {
        Self {
            key,
            event_id: event.id,
            subject_name: event.subject_name.clone(),
            subject_id: event.subject_id,
            item_id: event.item_id,
            item_name: rule.name.clone(),
            location: event.location.clone(),
            total,
            limit: rule.max_per_window,
            triggered_at: event.timestamp,
        }
    }
}

//! Threshold evaluation, deduplication and alert delivery

pub mod alert;
pub mod dedup;
pub mod notifier;
pub mod threshold;

pub use alert::Alert;
pub use dedup::AlertDeduper;
pub use notifier::{
    DiscordNotifier, LogNotifier, MemoryNotifier, NotificationSink, Notifier, NotifierError,
};
pub use threshold::{trigger, ThresholdMode};

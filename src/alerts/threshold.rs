//! Threshold comparison

use serde::{Deserialize, Serialize};

/// How a window sum is compared against an item's limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    /// Trigger when sum >= limit
    #[default]
    Gte,
    /// Trigger when sum > limit
    Gt,
}

impl ThresholdMode {
    pub fn triggers(self, sum: u64, limit: u64) -> bool {
        match self {
            ThresholdMode::Gte => sum >= limit,
            ThresholdMode::Gt => sum > limit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdMode::Gte => "gte",
            ThresholdMode::Gt => "gt",
        }
    }
}

/// Whether `sum` crosses `limit` under `mode`
pub fn trigger(sum: u64, limit: u64, mode: ThresholdMode) -> bool {
    mode.triggers(sum, limit)
}

//! Watcher configuration
//!
//! Loaded once at startup from a JSON file. Every field except the webhook URL
//! has a default; anything that fails validation is a [`ConfigError`] and the
//! process does not start.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::alerts::ThresholdMode;

/// Default zone for the producer's civil timestamps
pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";

/// Per-item alerting rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRule {
    /// Display name used in alerts
    pub name: String,
    /// Quantity that may be taken within one window
    pub max_per_window: u64,
}

/// Validated watcher configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Zone the log's naive timestamps are interpreted in
    pub timezone: Tz,
    /// Webhook endpoint for alert delivery
    pub webhook_url: String,
    /// Role ids mentioned (and allow-listed) on every alert
    pub alert_roles: Vec<String>,
    /// Sleep between poll cycles
    pub poll_interval: Duration,
    /// Tumbling window length
    pub window: chrono::Duration,
    /// Comparison used against `max_per_window`
    pub threshold_mode: ThresholdMode,
    /// Tracked items keyed by item id
    pub items: HashMap<u32, ItemRule>,
    /// CSV event log
    pub log_path: PathBuf,
    /// Persisted cursor file
    pub state_path: PathBuf,
    /// Upper bound on a single webhook call
    pub delivery_timeout: Duration,
    /// Log alerts instead of posting them
    pub dry_run: bool,
    /// Drop window and dedup state from previous days
    pub evict_stale_days: bool,
}

impl MonitorConfig {
    /// Create a config with defaults and the given webhook
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            timezone: chrono_tz::Europe::Moscow,
            webhook_url: webhook_url.into(),
            alert_roles: Vec::new(),
            poll_interval: Duration::from_secs(2),
            window: chrono::Duration::minutes(60),
            threshold_mode: ThresholdMode::default(),
            items: HashMap::new(),
            log_path: PathBuf::from("warehouse_logs.csv"),
            state_path: PathBuf::from("state.json"),
            delivery_timeout: Duration::from_secs(10),
            dry_run: false,
            evict_stale_days: false,
        }
    }

    /// Track an item
    pub fn with_item(mut self, item_id: u32, name: impl Into<String>, max_per_window: u64) -> Self {
        self.items.insert(
            item_id,
            ItemRule {
                name: name.into(),
                max_per_window,
            },
        );
        self
    }

    /// Set window length in minutes
    pub fn with_window_minutes(mut self, minutes: i64) -> Self {
        self.window = chrono::Duration::minutes(minutes);
        self
    }

    /// Set threshold comparison mode
    pub fn with_threshold_mode(mut self, mode: ThresholdMode) -> Self {
        self.threshold_mode = mode;
        self
    }

    /// Set the zone for log timestamps
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Enable day eviction
    pub fn with_stale_day_eviction(mut self, enabled: bool) -> Self {
        self.evict_stale_days = enabled;
        self
    }

    /// Look up the rule for an item
    pub fn item(&self, item_id: u32) -> Option<&ItemRule> {
        self.items.get(&item_id)
    }

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Parse and validate config from JSON text
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(data)?;
        raw.validate()
    }

    /// Config file path from `STOCKWATCH_CONFIG`, default `config.json`
    pub fn path_from_env() -> PathBuf {
        std::env::var("STOCKWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.json"))
    }
}

/// On-disk config shape
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default)]
    discord_webhook_url: Option<String>,
    #[serde(default)]
    alert_roles: Vec<RoleId>,
    #[serde(default = "default_poll_interval")]
    poll_interval_sec: u64,
    #[serde(default = "default_window_minutes")]
    window_minutes: i64,
    #[serde(default)]
    threshold_mode: ThresholdMode,
    #[serde(default)]
    items: HashMap<String, RawItemRule>,
    #[serde(default = "default_log_path")]
    log_path: PathBuf,
    #[serde(default = "default_state_path")]
    state_path: PathBuf,
    #[serde(default = "default_delivery_timeout")]
    delivery_timeout_sec: u64,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    evict_stale_days: bool,
}

#[derive(Debug, Deserialize)]
struct RawItemRule {
    #[serde(default)]
    name: Option<String>,
    max_per_window: u64,
}

/// Role ids are snowflakes; accept them quoted or bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleId {
    Text(String),
    Number(u64),
}

impl RoleId {
    fn into_string(self) -> String {
        match self {
            RoleId::Text(s) => s.trim().to_string(),
            RoleId::Number(n) => n.to_string(),
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_poll_interval() -> u64 {
    2
}

fn default_window_minutes() -> i64 {
    60
}

fn default_log_path() -> PathBuf {
    PathBuf::from("warehouse_logs.csv")
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_delivery_timeout() -> u64 {
    10
}

impl RawConfig {
    fn validate(self) -> Result<MonitorConfig, ConfigError> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))?;

        let webhook_url = self
            .discord_webhook_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing("discord_webhook_url"))?;

        if self.poll_interval_sec == 0 {
            return Err(ConfigError::Invalid("poll_interval_sec must be at least 1".into()));
        }
        if self.window_minutes <= 0 {
            return Err(ConfigError::Invalid("window_minutes must be at least 1".into()));
        }
        if self.delivery_timeout_sec == 0 {
            return Err(ConfigError::Invalid("delivery_timeout_sec must be at least 1".into()));
        }

        let mut items = HashMap::with_capacity(self.items.len());
        for (key, rule) in self.items {
            let item_id: u32 = key
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("item id '{}' is not an integer", key)))?;
            let name = rule
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Item {}", item_id));
            items.insert(
                item_id,
                ItemRule {
                    name,
                    max_per_window: rule.max_per_window,
                },
            );
        }

        Ok(MonitorConfig {
            timezone,
            webhook_url,
            alert_roles: self
                .alert_roles
                .into_iter()
                .map(RoleId::into_string)
                .filter(|r| !r.is_empty())
                .collect(),
            poll_interval: Duration::from_secs(self.poll_interval_sec),
            window: chrono::Duration::minutes(self.window_minutes),
            threshold_mode: self.threshold_mode,
            items,
            log_path: self.log_path,
            state_path: self.state_path,
            delivery_timeout: Duration::from_secs(self.delivery_timeout_sec),
            dry_run: self.dry_run,
            evict_stale_days: self.evict_stale_days,
        })
    }
}

/// Startup configuration errors; all are fatal
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required config key: {0}")]
    Missing(&'static str),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config =
            MonitorConfig::from_json(r#"{"discord_webhook_url": "https://example.invalid/hook"}"#)
                .unwrap();

        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.window, chrono::Duration::minutes(60));
        assert_eq!(config.threshold_mode, ThresholdMode::Gte);
        assert!(config.items.is_empty());
        assert!(config.alert_roles.is_empty());
        assert_eq!(config.log_path, PathBuf::from("warehouse_logs.csv"));
        assert_eq!(config.state_path, PathBuf::from("state.json"));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_full_config() {
        let config = MonitorConfig::from_json(
            r#"{
                "timezone": "Europe/Berlin",
                "discord_webhook_url": "https://example.invalid/hook",
                "alert_roles": ["111", 222],
                "poll_interval_sec": 5,
                "window_minutes": 30,
                "threshold_mode": "gt",
                "items": {
                    "7": {"name": "Medkit", "max_per_window": 50},
                    "9": {"max_per_window": 3}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.alert_roles, vec!["111".to_string(), "222".to_string()]);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.window, chrono::Duration::minutes(30));
        assert_eq!(config.threshold_mode, ThresholdMode::Gt);
        assert_eq!(config.item(7).unwrap().name, "Medkit");
        assert_eq!(config.item(7).unwrap().max_per_window, 50);
        assert_eq!(config.item(9).unwrap().name, "Item 9");
        assert!(config.item(8).is_none());
    }

    #[test]
    fn test_missing_webhook_is_fatal() {
        let err = MonitorConfig::from_json(r#"{"window_minutes": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("discord_webhook_url")));

        let err = MonitorConfig::from_json(r#"{"discord_webhook_url": "  "}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = MonitorConfig::from_json(
            r#"{"discord_webhook_url": "https://x", "timezone": "Mars/Olympus"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = MonitorConfig::from_json(
            r#"{"discord_webhook_url": "https://x", "items": {"medkit": {"max_per_window": 1}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = MonitorConfig::from_json(
            r#"{"discord_webhook_url": "https://x", "threshold_mode": "lte"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err =
            MonitorConfig::from_json(r#"{"discord_webhook_url": "https://x", "window_minutes": 0}"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = MonitorConfig::load("/definitely/not/here/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_builder() {
        let config = MonitorConfig::new("https://x")
            .with_item(7, "Medkit", 50)
            .with_window_minutes(15)
            .with_threshold_mode(ThresholdMode::Gt);

        assert_eq!(config.item(7).unwrap().max_per_window, 50);
        assert_eq!(config.window, chrono::Duration::minutes(15));
        assert_eq!(config.threshold_mode, ThresholdMode::Gt);
    }
}

//! Notification sinks for alerts

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::alert::Alert;
use crate::ingest::event::TIMESTAMP_FORMAT;

/// Embed color (red)
pub const ALERT_COLOR: u32 = 15158332;

/// Something that can deliver an alert
#[allow(async_fn_in_trait)]
pub trait NotificationSink {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotifierError>;
}

/// Posts alerts to a Discord webhook as an embed
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    url: String,
    roles: Vec<String>,
    window: chrono::Duration,
}

impl DiscordNotifier {
    /// Create a notifier; every request is bounded by `timeout`
    pub fn new(
        url: impl Into<String>,
        roles: Vec<String>,
        window: chrono::Duration,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifierError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            roles,
            window,
        })
    }

    /// Space-separated role mentions
    pub fn mentions(&self) -> String {
        self.roles
            .iter()
            .map(|role| format!("<@&{}>", role))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Embed describing the alert
    pub fn embed(&self, alert: &Alert) -> Value {
        let fields = json!([
            { "name": "Nickname", "value": format!("`{}`", alert.subject_name), "inline": true },
            { "name": "Static ID", "value": format!("`{}`", alert.subject_id), "inline": true },
            { "name": "Fraction", "value": format!("`{}`", alert.location), "inline": true },
            {
                "name": "Item",
                "value": format!("`{}` (ID `{}`)", alert.item_name, alert.item_id),
                "inline": false
            },
            {
                "name": "Total taken",
                "value": format!("`{}` / limit `{}`", alert.total, alert.limit),
                "inline": true
            },
            {
                "name": "Triggered at",
                "value": format!("`{}`", alert.triggered_at.format(TIMESTAMP_FORMAT)),
                "inline": true
            },
        ]);

        json!({
            "title": "⚠️ Possible warehouse drain",
            "description": format!(
                "Player took too many items within {} minutes.",
                self.window.num_minutes()
            ),
            "color": ALERT_COLOR,
            "fields": fields,
            "timestamp": alert
                .triggered_at
                .with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
        })
    }

    /// Full webhook body
    ///
    /// `allowed_mentions.parse` is always empty so only the configured roles
    /// can be pinged, never `@everyone` or users named in the embed.
    pub fn payload(&self, alert: &Alert) -> Value {
        json!({
            "content": self.mentions(),
            "allowed_mentions": {
                "parse": [],
                "roles": self.roles,
            },
            "embeds": [self.embed(alert)],
        })
    }
}

impl NotificationSink for DiscordNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotifierError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(alert))
            .send()
            .await
            .map_err(|e| NotifierError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifierError::Status(response.status().as_u16()));
        }

        tracing::debug!(
            event_id = alert.event_id,
            subject_id = alert.subject_id,
            "Webhook notification sent"
        );

        Ok(())
    }
}

/// Writes alerts to the log instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotifierError> {
        tracing::warn!(
            subject_name = %alert.subject_name,
            subject_id = alert.subject_id,
            item_id = alert.item_id,
            item_name = %alert.item_name,
            location = %alert.location,
            total = alert.total,
            limit = alert.limit,
            day = %alert.key.day,
            "Alert triggered (dry run)"
        );
        Ok(())
    }
}

/// Keeps delivered alerts in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    delivered: Mutex<Vec<Alert>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose deliveries all fail after being recorded
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.delivered.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().len()
    }
}

impl NotificationSink for MemoryNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotifierError> {
        self.delivered.lock().push(alert.clone());
        if self.fail {
            return Err(NotifierError::Status(500));
        }
        Ok(())
    }
}

/// Sink chosen at startup
#[derive(Debug, Clone)]
pub enum Notifier {
    Discord(DiscordNotifier),
    Log(LogNotifier),
}

impl NotificationSink for Notifier {
    async fn deliver(&self, alert: &Alert) -> Result<(), NotifierError> {
        match self {
            Notifier::Discord(n) => n.deliver(alert).await,
            Notifier::Log(n) => n.deliver(alert).await,
        }
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to send webhook: {0}")]
    Http(String),

    #[error("Webhook returned status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowKey;
    use chrono::TimeZone;
    use chrono_tz::Europe::Moscow;

    fn alert() -> Alert {
        Alert {
            key: WindowKey {
                day: "2024-05-01".to_string(),
                subject_id: 42,
                item_id: 7,
                location: "LSPD".to_string(),
            },
            event_id: 3,
            subject_name: "Nick".to_string(),
            subject_id: 42,
            item_id: 7,
            item_name: "Medkit".to_string(),
            location: "LSPD".to_string(),
            total: 55,
            limit: 50,
            triggered_at: Moscow.with_ymd_and_hms(2024, 5, 1, 10, 45, 0).unwrap(),
        }
    }

    fn notifier(roles: &[&str]) -> DiscordNotifier {
        DiscordNotifier::new(
            "http://127.0.0.1:9/hook",
            roles.iter().map(|r| r.to_string()).collect(),
            chrono::Duration::minutes(60),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_mentions() {
        assert_eq!(notifier(&["111", "222"]).mentions(), "<@&111> <@&222>");
        assert_eq!(notifier(&[]).mentions(), "");
    }

    #[test]
    fn test_payload_restricts_mentions() {
        let payload = notifier(&["111"]).payload(&alert());

        assert_eq!(payload["content"], "<@&111>");
        assert_eq!(payload["allowed_mentions"]["parse"], json!([]));
        assert_eq!(payload["allowed_mentions"]["roles"], json!(["111"]));
        assert_eq!(payload["embeds"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_embed_fields() {
        let embed = notifier(&[]).embed(&alert());

        assert_eq!(embed["color"], ALERT_COLOR);
        // Moscow is UTC+3
        assert_eq!(embed["timestamp"], "2024-05-01T07:45:00Z");
        assert_eq!(
            embed["description"],
            "Player took too many items within 60 minutes."
        );

        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0]["value"], "`Nick`");
        assert_eq!(fields[1]["value"], "`42`");
        assert_eq!(fields[2]["value"], "`LSPD`");
        assert_eq!(fields[3]["value"], "`Medkit` (ID `7`)");
        assert_eq!(fields[4]["value"], "`55` / limit `50`");
        assert_eq!(fields[5]["value"], "`2024-05-01 10:45:00`");
    }

    #[tokio::test]
    async fn test_log_notification() {
        // Log notification should always succeed
        assert!(LogNotifier.deliver(&alert()).await.is_ok());
        assert!(Notifier::Log(LogNotifier).deliver(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_notifier() {
        let sink = MemoryNotifier::new();
        sink.deliver(&alert()).await.unwrap();
        assert_eq!(sink.count(), 1);
        assert_eq!(sink.alerts()[0].total, 55);

        let failing = MemoryNotifier::failing();
        assert!(matches!(
            failing.deliver(&alert()).await,
            Err(NotifierError::Status(500))
        ));
        assert_eq!(failing.count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_error() {
        // port 9 (discard) is not listening on loopback
        let result = notifier(&[]).deliver(&alert()).await;
        assert!(matches!(result, Err(NotifierError::Http(_))));
    }
}

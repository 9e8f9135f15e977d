//! Withdrawal events and log row parsing

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Timestamp layout of the `ts_msk` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Location used when a row has no warehouse
pub const UNKNOWN_LOCATION: &str = "N/A";

/// Warehouse action recorded by the game server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Take,
    Put,
    Other(String),
}

impl Action {
    /// Parse an action column, case-insensitive
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase();
        match normalized.as_str() {
            "TAKE" => Action::Take,
            "PUT" => Action::Put,
            _ => Action::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Take => "TAKE",
            Action::Put => "PUT",
            Action::Other(s) => s,
        }
    }
}

/// One valid row of the event log
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: u64,
    pub subject_name: String,
    pub subject_id: u64,
    pub action: Action,
    pub item_id: u32,
    pub quantity: u64,
    pub timestamp: DateTime<Tz>,
    pub location: String,
}

/// Row as it appears in the CSV file, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRow {
    pub event_id: String,
    pub player_name: String,
    pub player_static_id: String,
    pub action: String,
    pub item_id: String,
    pub quantity: String,
    pub ts_msk: String,
    #[serde(default)]
    pub warehouse_id: Option<String>,
}

impl RawRow {
    /// Validate the row and interpret its timestamp in `tz`
    pub fn parse(&self, tz: Tz) -> Result<Event, RowError> {
        let id = parse_field("event_id", &self.event_id)?;
        let subject_id = parse_field("player_static_id", &self.player_static_id)?;
        let item_id = parse_field("item_id", &self.item_id)?;
        let quantity: u64 = parse_field("quantity", &self.quantity)?;
        if quantity == 0 {
            return Err(RowError::NonPositiveQuantity);
        }

        let subject_name = self.player_name.trim();
        if subject_name.is_empty() {
            return Err(RowError::MissingField("player_name"));
        }
        if self.action.trim().is_empty() {
            return Err(RowError::MissingField("action"));
        }

        let timestamp = parse_timestamp(&self.ts_msk, tz)?;

        let location = self
            .warehouse_id
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .unwrap_or(UNKNOWN_LOCATION)
            .to_string();

        Ok(Event {
            id,
            subject_name: subject_name.to_string(),
            subject_id,
            action: Action::parse(&self.action),
            item_id,
            quantity,
            timestamp,
            location,
        })
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, RowError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RowError::MissingField(field));
    }
    trimmed.parse().map_err(|_| RowError::InvalidInteger {
        field,
        value: trimmed.to_string(),
    })
}

/// Interpret a naive `YYYY-MM-DD HH:MM:SS` string as civil time in `tz`
///
/// Ambiguous local times (clock set back) resolve to the earlier instant.
/// Local times skipped by a forward shift do not exist and are rejected.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Result<DateTime<Tz>, RowError> {
    let trimmed = raw.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .map_err(|_| RowError::InvalidTimestamp(trimmed.to_string()))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| RowError::NonexistentLocalTime(trimmed.to_string()))
}

/// Reasons a log row is dropped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} is not a valid integer: '{value}'")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Quantity must be positive")]
    NonPositiveQuantity,

    #[error("Invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("Local time does not exist in configured zone: '{0}'")]
    NonexistentLocalTime(String),

    #[error("Unreadable row: {0}")]
    Csv(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::Moscow;

    fn raw(quantity: &str) -> RawRow {
        RawRow {
            event_id: "12".into(),
            player_name: "Nick".into(),
            player_static_id: "12345".into(),
            action: " take ".into(),
            item_id: "7".into(),
            quantity: quantity.into(),
            ts_msk: "2024-05-01 10:30:00".into(),
            warehouse_id: Some("LSPD".into()),
        }
    }

    #[test]
    fn test_parse_valid_row() {
        let event = raw("20").parse(Moscow).unwrap();
        assert_eq!(event.id, 12);
        assert_eq!(event.subject_name, "Nick");
        assert_eq!(event.subject_id, 12345);
        assert_eq!(event.action, Action::Take);
        assert_eq!(event.item_id, 7);
        assert_eq!(event.quantity, 20);
        assert_eq!(event.location, "LSPD");
        assert_eq!(event.timestamp.hour(), 10);
        assert_eq!(event.timestamp.minute(), 30);
    }

    #[test]
    fn test_missing_location_defaults() {
        let mut row = raw("1");
        row.warehouse_id = None;
        assert_eq!(row.parse(Moscow).unwrap().location, UNKNOWN_LOCATION);

        row.warehouse_id = Some("   ".into());
        assert_eq!(row.parse(Moscow).unwrap().location, UNKNOWN_LOCATION);
    }

    #[test]
    fn test_malformed_fields() {
        assert_eq!(
            raw("lots").parse(Moscow).unwrap_err(),
            RowError::InvalidInteger {
                field: "quantity",
                value: "lots".into()
            }
        );
        assert_eq!(raw("0").parse(Moscow).unwrap_err(), RowError::NonPositiveQuantity);
        assert!(matches!(
            raw("-3").parse(Moscow).unwrap_err(),
            RowError::InvalidInteger { .. }
        ));

        let mut row = raw("1");
        row.event_id = String::new();
        assert_eq!(row.parse(Moscow).unwrap_err(), RowError::MissingField("event_id"));

        let mut row = raw("1");
        row.ts_msk = "01.05.2024 10:30".into();
        assert!(matches!(
            row.parse(Moscow).unwrap_err(),
            RowError::InvalidTimestamp(_)
        ));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(Action::parse("TAKE"), Action::Take);
        assert_eq!(Action::parse("take"), Action::Take);
        assert_eq!(Action::parse("Put"), Action::Put);
        assert_eq!(Action::parse("craft"), Action::Other("CRAFT".into()));
        assert_eq!(Action::parse("craft").as_str(), "CRAFT");
    }

    #[test]
    fn test_nonexistent_local_time() {
        // Berlin skipped 02:00-03:00 on 2024-03-31
        let err = parse_timestamp("2024-03-31 02:30:00", chrono_tz::Europe::Berlin).unwrap_err();
        assert!(matches!(err, RowError::NonexistentLocalTime(_)));
    }
}

//! Appends events to the CSV log
//!
//! The watcher itself never writes the log; this is the producer side used by
//! the `feeder` tool and by tests to lay down fixtures.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use chrono_tz::Tz;

use super::csv_source::IngestError;
use super::event::{Action, RawRow, TIMESTAMP_FORMAT, UNKNOWN_LOCATION};

/// Column order of the log file
pub const FIELDS: [&str; 8] = [
    "event_id",
    "player_name",
    "player_static_id",
    "action",
    "item_id",
    "quantity",
    "ts_msk",
    "warehouse_id",
];

/// Event to append; the writer assigns the id
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub subject_name: String,
    pub subject_id: u64,
    pub action: Action,
    pub item_id: u32,
    pub quantity: u64,
    pub timestamp: DateTime<Tz>,
    pub location: Option<String>,
}

impl NewEvent {
    pub fn take(
        subject_name: impl Into<String>,
        subject_id: u64,
        item_id: u32,
        quantity: u64,
        timestamp: DateTime<Tz>,
    ) -> Self {
        Self {
            subject_name: subject_name.into(),
            subject_id,
            action: Action::Take,
            item_id,
            quantity,
            timestamp,
            location: None,
        }
    }

    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    fn to_raw(&self, id: u64) -> RawRow {
        RawRow {
            event_id: id.to_string(),
            player_name: self.subject_name.clone(),
            player_static_id: self.subject_id.to_string(),
            action: self.action.as_str().to_string(),
            item_id: self.item_id.to_string(),
            quantity: self.quantity.to_string(),
            ts_msk: self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            warehouse_id: Some(
                self.location
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            ),
        }
    }
}

/// Append-only writer for the event log
#[derive(Debug, Clone)]
pub struct EventWriter {
    path: PathBuf,
}

impl EventWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Highest `event_id` present in the log, 0 if none
    ///
    /// Rows whose other columns are malformed still count, so ids are never reused.
    pub fn last_event_id(&self) -> Result<u64, IngestError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_slice());

        let column = reader
            .headers()
            .ok()
            .and_then(|h| h.iter().position(|name| name == "event_id"))
            .unwrap_or(0);

        Ok(reader
            .records()
            .filter_map(Result::ok)
            .filter_map(|record| record.get(column).and_then(|v| v.parse::<u64>().ok()))
            .max()
            .unwrap_or(0))
    }

    /// Append an event and return the id it was given
    pub fn append(&self, event: &NewEvent) -> Result<u64, IngestError> {
        let id = self.last_event_id()? + 1;
        self.append_with_id(id, event)?;
        Ok(id)
    }

    /// Append an event under an explicit id
    pub fn append_with_id(&self, id: u64, event: &NewEvent) -> Result<(), IngestError> {
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(FIELDS).map_err(csv_to_io)?;
        }
        writer.serialize(event.to_raw(id)).map_err(csv_to_io)?;
        writer.flush()?;

        Ok(())
    }

    /// Append a raw line verbatim, for producing deliberately broken rows
    pub fn append_raw_line(&self, line: &str) -> Result<(), IngestError> {
        use std::io::Write;

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(file, "{}", FIELDS.join(","))?;
        }
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

fn csv_to_io(e: csv::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e)
}

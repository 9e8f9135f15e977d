//! Event log ingest
//!
//! The game server appends one CSV row per warehouse action. The watcher only
//! ever asks for "everything above this id"; the writer half exists for the
//! feeder tool and fixtures.

pub mod csv_source;
pub mod event;
pub mod writer;

pub use csv_source::{CsvLogSource, IngestError, LogSource};
pub use event::{Action, Event, RawRow, RowError, UNKNOWN_LOCATION};
pub use writer::{EventWriter, NewEvent};

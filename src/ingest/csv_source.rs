//! CSV-backed event log reader

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono_tz::Tz;

use super::event::{Event, RawRow, RowError};

/// Source of log events above a cursor
pub trait LogSource {
    /// Every valid event with `id > cursor`, ascending by id
    fn fetch_since(&self, cursor: u64) -> Result<Vec<Event>, IngestError>;
}

/// Reads the whole CSV log on every fetch
///
/// There is no hidden offset state: two fetches with the same cursor over the
/// same file return the same events.
#[derive(Debug, Clone)]
pub struct CsvLogSource {
    path: PathBuf,
    timezone: Tz,
}

impl CsvLogSource {
    pub fn new<P: AsRef<Path>>(path: P, timezone: Tz) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timezone,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every row, keeping per-row failures alongside their line numbers
    pub fn read_all(&self) -> Result<Vec<(u64, Result<Event, RowError>)>, IngestError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(parse_rows(data.as_slice(), self.timezone))
    }
}

impl LogSource for CsvLogSource {
    fn fetch_since(&self, cursor: u64) -> Result<Vec<Event>, IngestError> {
        let mut events = Vec::new();

        for (line, parsed) in self.read_all()? {
            match parsed {
                Ok(event) if event.id > cursor => events.push(event),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line,
                        error = %e,
                        "Skipping malformed log row"
                    );
                }
            }
        }

        events.sort_by_key(|e| e.id);
        Ok(events)
    }
}

/// Decode CSV bytes into events; line numbers are 1-based and include the header
pub fn parse_rows<R: Read>(reader: R, tz: Tz) -> Vec<(u64, Result<Event, RowError>)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = match csv_reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => return vec![(1, Err(RowError::Csv(e.to_string())))],
    };

    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        match csv_reader.read_record(&mut record) {
            Ok(true) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                let parsed = record
                    .deserialize::<RawRow>(Some(&headers))
                    .map_err(|e| RowError::Csv(e.to_string()))
                    .and_then(|raw| raw.parse(tz));
                rows.push((line, parsed));
            }
            Ok(false) => break,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                let fatal = e.is_io_error();
                rows.push((line, Err(RowError::Csv(e.to_string()))));
                if fatal {
                    break;
                }
            }
        }
    }
    rows
}

/// Log read failures that abort a fetch
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Moscow;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str =
        "event_id,player_name,player_static_id,action,item_id,quantity,ts_msk,warehouse_id\n";

    fn write_log(dir: &TempDir, body: &str) -> CsvLogSource {
        let path = dir.path().join("warehouse_logs.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        CsvLogSource::new(path, Moscow)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let source = CsvLogSource::new(temp_dir.path().join("nope.csv"), Moscow);
        assert!(source.fetch_since(0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.csv");
        std::fs::File::create(&path).unwrap();
        let source = CsvLogSource::new(path, Moscow);
        assert!(source.fetch_since(0).unwrap().is_empty());

        let source = write_log(&temp_dir, "");
        assert!(source.fetch_since(0).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_since_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_log(
            &temp_dir,
            "3,Nick,12345,TAKE,7,5,2024-05-01 10:02:00,LSPD\n\
             1,Nick,12345,TAKE,7,5,2024-05-01 10:00:00,LSPD\n\
             2,Ivan,22222,PUT,7,5,2024-05-01 10:01:00,LSPD\n",
        );

        let ids: Vec<u64> = source.fetch_since(0).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let ids: Vec<u64> = source.fetch_since(1).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);

        assert!(source.fetch_since(3).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_log(
            &temp_dir,
            "1,Nick,12345,TAKE,7,5,2024-05-01 10:00:00,LSPD\n\
             2,Nick,12345,TAKE,7,6,2024-05-01 10:01:00,LSPD\n",
        );

        assert_eq!(source.fetch_since(0).unwrap(), source.fetch_since(0).unwrap());
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_log(
            &temp_dir,
            "1,Nick,12345,TAKE,7,20,2024-05-01 10:00:00,LSPD\n\
             2,Nick,12345,TAKE,7,many,2024-05-01 10:10:00,LSPD\n\
             x,Nick,12345,TAKE,7,1,2024-05-01 10:15:00,LSPD\n\
             4,Nick,12345,TAKE\n\
             5,Nick,12345,TAKE,7,20,2024-05-01 10:20:00,LSPD\n",
        );

        let events = source.fetch_since(0).unwrap();
        let ids: Vec<u64> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 5]);

        let failures: Vec<u64> = source
            .read_all()
            .unwrap()
            .into_iter()
            .filter(|(_, parsed)| parsed.is_err())
            .map(|(line, _)| line)
            .collect();
        assert_eq!(failures, vec![3, 4, 5]);
    }

    #[test]
    fn test_missing_warehouse_column() {
        let events = parse_rows(
            "event_id,player_name,player_static_id,action,item_id,quantity,ts_msk\n\
             1,Nick,12345,TAKE,7,20,2024-05-01 10:00:00\n"
                .as_bytes(),
            Moscow,
        );
        assert_eq!(events.len(), 1);
        let event = events[0].1.as_ref().unwrap();
        assert_eq!(event.location, "N/A");
    }

    #[test]
    fn test_quoted_names_with_commas() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_log(
            &temp_dir,
            "1,\"Doe, John\",12345,TAKE,7,5,2024-05-01 10:00:00,\"Marabunta Grande\"\n",
        );

        let events = source.fetch_since(0).unwrap();
        assert_eq!(events[0].subject_name, "Doe, John");
        assert_eq!(events[0].location, "Marabunta Grande");
    }
}

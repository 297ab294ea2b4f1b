//! Persisted VOC baseline.
//!
//! The record is two decimal lines, TVOC first then eCO2.  The store only
//! touches the filesystem for the duration of one load or save.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::PersistenceError;
use crate::sensors::Baseline;

pub trait BaselineStore {
    /// `Ok(None)` means nothing has been saved yet (cold start).
    fn load_baseline(&mut self) -> Result<Option<Baseline>, PersistenceError>;
    fn save_baseline(&mut self, baseline: Baseline) -> Result<(), PersistenceError>;
}

/// Baseline record in a text file, replaced via write-then-rename.
#[derive(Debug, Clone)]
pub struct FileBaselineStore {
    path: PathBuf,
}

impl FileBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".tmp");
        p.into()
    }
}

pub fn parse_record(text: &str) -> Result<Baseline, PersistenceError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut next = |name: &str| -> Result<u16, PersistenceError> {
        let line = lines
            .next()
            .ok_or_else(|| PersistenceError::Malformed(format!("missing {name} line")))?;
        line.parse()
            .map_err(|_| PersistenceError::Malformed(format!("bad {name} value {line:?}")))
    };
    let tvoc = next("tvoc")?;
    let eco2 = next("eco2")?;
    Ok(Baseline { eco2, tvoc })
}

pub fn format_record(baseline: Baseline) -> String {
    format!("{}\n{}\n", baseline.tvoc, baseline.eco2)
}

impl BaselineStore for FileBaselineStore {
    fn load_baseline(&mut self) -> Result<Option<Baseline>, PersistenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no baseline record");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        parse_record(&text).map(Some)
    }

    fn save_baseline(&mut self, baseline: Baseline) -> Result<(), PersistenceError> {
        let staging = self.staging_path();
        {
            let mut f = fs::File::create(&staging)?;
            f.write_all(format_record(baseline).as_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), ?baseline, "baseline record written");
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileBaselineStore {
        FileBaselineStore::new(dir.path().join("baseline.txt"))
    }

    // -- Record format ----------------------------------------------------

    #[test]
    fn record_is_tvoc_then_eco2() {
        let text = format_record(Baseline {
            eco2: 35_000,
            tvoc: 36_000,
        });
        assert_eq!(text, "36000\n35000\n");
    }

    #[test]
    fn parse_tolerates_whitespace() {
        let b = parse_record(" 100 \r\n\n 200\n").unwrap();
        assert_eq!(b, Baseline { eco2: 200, tvoc: 100 });
    }

    #[test]
    fn parse_rejects_short_record() {
        let err = parse_record("100\n").unwrap_err();
        assert!(err.to_string().contains("missing eco2"), "{err}");
    }

    #[test]
    fn parse_rejects_out_of_range() {
        let err = parse_record("70000\n1\n").unwrap_err();
        assert!(err.to_string().contains("bad tvoc"), "{err}");
    }

    // -- File store -------------------------------------------------------

    #[test]
    fn missing_file_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).load_baseline().unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let b = Baseline {
            eco2: 0x8a12,
            tvoc: 0x8c40,
        };
        store.save_baseline(b).unwrap();
        assert_eq!(store.load_baseline().unwrap(), Some(b));
        assert!(!store.staging_path().exists());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.save_baseline(Baseline { eco2: 1, tvoc: 2 }).unwrap();
        store.save_baseline(Baseline { eco2: 3, tvoc: 4 }).unwrap();
        assert_eq!(
            store.load_baseline().unwrap(),
            Some(Baseline { eco2: 3, tvoc: 4 })
        );
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        fs::write(dir.path().join("baseline.txt"), "garbage").unwrap();
        assert!(matches!(
            store.load_baseline(),
            Err(PersistenceError::Malformed(_))
        ));
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBaselineStore::new(dir.path().join("missing").join("baseline.txt"));
        assert!(matches!(
            store.save_baseline(Baseline { eco2: 1, tvoc: 1 }),
            Err(PersistenceError::Io(_))
        ));
    }
}

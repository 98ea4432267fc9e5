use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;

use crate::dataset::{Dataset, DatasetError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid dataset: {0}")]
    Dataset(#[from] DatasetError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Summary row for a stored dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredYear {
    pub year: u16,
    pub entries: usize,
    pub scheduled: bool,
}

/// Uploaded yearly datasets as a year → JSON file map under the XDG data
/// directory. Imports are validated before anything is written; the
/// stored bytes are the original dump, so a stored year round-trips
/// exactly.
pub struct YearStore {
    dir: PathBuf,
}

impl YearStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store under the XDG data directory, e.g.
    /// `~/.local/share/chartcast/years`.
    pub fn open_default() -> Self {
        let dir = if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
            dirs.data_dir().join("years")
        } else {
            // Fallback: current directory
            PathBuf::from("years")
        };
        Self { dir }
    }

    fn path(&self, year: u16) -> PathBuf {
        self.dir.join(format!("{year}.json"))
    }

    /// Validate and store a raw dataset dump. Returns the stored year.
    pub fn import(&self, raw: &str) -> Result<u16> {
        let data = Dataset::from_json(raw)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(data.year), raw)?;
        log::info!("Stored dataset for year {}", data.year);
        Ok(data.year)
    }

    /// Load a stored year, `None` when absent.
    pub fn load(&self, year: u16) -> Result<Option<Dataset>> {
        let path = self.path(year);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Dataset::from_file(&path)?))
    }

    /// Remove a stored year. Returns whether anything was deleted.
    pub fn delete(&self, year: u16) -> Result<bool> {
        let path = self.path(year);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    /// Summaries of every stored year, ascending. Files that no longer
    /// validate are listed out by a warning rather than failing the list.
    pub fn list(&self) -> Result<Vec<StoredYear>> {
        let mut years = Vec::new();
        if !self.dir.exists() {
            return Ok(years);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(year) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u16>().ok())
            else {
                continue;
            };
            match Dataset::from_file(&path) {
                Ok(data) => years.push(StoredYear {
                    year,
                    entries: data.entries.len(),
                    scheduled: data.scheduled,
                }),
                Err(e) => {
                    log::warn!("Skipping invalid stored year {}: {e}", path.display());
                }
            }
        }
        years.sort_by_key(|y| y.year);
        Ok(years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::sample_json;

    fn store() -> (tempfile::TempDir, YearStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = YearStore::new(dir.path().join("years"));
        (dir, store)
    }

    #[test]
    fn test_import_load_delete_round_trip() {
        let (_dir, store) = store();
        let year = store.import(&sample_json()).unwrap();
        assert_eq!(year, 2017);

        let data = store.load(2017).unwrap().unwrap();
        assert_eq!(data.entries.len(), 3);
        assert!(store.load(2015).unwrap().is_none());

        assert!(store.delete(2017).unwrap());
        assert!(!store.delete(2017).unwrap());
        assert!(store.load(2017).unwrap().is_none());
    }

    #[test]
    fn test_import_rejects_invalid_dump() {
        let (_dir, store) = store();
        assert!(store.import("{\"tracks\": []}").is_err());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_summaries() {
        let (_dir, store) = store();
        store.import(&sample_json()).unwrap();
        let years = store.list().unwrap();
        assert_eq!(
            years,
            vec![StoredYear {
                year: 2017,
                entries: 3,
                scheduled: true
            }]
        );
    }
}

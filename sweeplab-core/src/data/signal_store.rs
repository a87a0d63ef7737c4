//! Signal repositories: one JSON file per strategy-year on disk, or an
//! in-memory map for tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::provider::{DataError, SignalRepository};
use crate::domain::SignalFile;

/// Default file-name pattern; `{year}` is replaced by the calendar year.
pub const DEFAULT_SIGNAL_PATTERN: &str = "{year}.json";

/// Signal files stored as `<dir>/<pattern with {year}>`.
#[derive(Debug, Clone)]
pub struct JsonSignalRepository {
    dir: PathBuf,
    pattern: String,
}

impl JsonSignalRepository {
    /// Open a signal directory. Fails if the directory cannot be listed, which
    /// is a fatal, pre-simulation configuration problem.
    pub fn open(dir: impl AsRef<Path>, pattern: &str) -> Result<Self, DataError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::read_dir(&dir).map_err(|e| DataError::UnreadableDirectory {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            dir,
            pattern: pattern.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file that would hold `year`'s signals.
    pub fn path_for(&self, year: i32) -> PathBuf {
        self.dir.join(self.pattern.replace("{year}", &year.to_string()))
    }
}

impl SignalRepository for JsonSignalRepository {
    fn name(&self) -> &str {
        "json_files"
    }

    fn load_year(&self, year: i32) -> Result<SignalFile, DataError> {
        let path = self.path_for(year);
        if !path.is_file() {
            return Err(DataError::MissingSignals { year, path });
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| DataError::Io {
            path: path.clone(),
            source,
        })?;
        let mut file: SignalFile =
            serde_json::from_str(&raw).map_err(|e| DataError::MalformedSignals {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        file.signals = file.normalized_buys();
        Ok(file)
    }
}

/// Signals held in memory, keyed by year.
#[derive(Debug, Clone, Default)]
pub struct InMemorySignalRepository {
    years: BTreeMap<i32, SignalFile>,
}

impl InMemorySignalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, file: SignalFile) {
        self.years.insert(year, file);
    }

    pub fn with_year(mut self, year: i32, file: SignalFile) -> Self {
        self.insert(year, file);
        self
    }
}

impl SignalRepository for InMemorySignalRepository {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn load_year(&self, year: i32) -> Result<SignalFile, DataError> {
        let mut file = self
            .years
            .get(&year)
            .cloned()
            .ok_or_else(|| DataError::MissingSignals {
                year,
                path: PathBuf::from(format!("<memory>/{year}")),
            })?;
        file.signals = file.normalized_buys();
        Ok(file)
    }
}

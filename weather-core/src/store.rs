//! Append-only record store.
//!
//! The on-disk form is a single JSON array of observations. Every append
//! rewrites the whole document through a temp file and a rename, so readers
//! see either the old or the new document, never a partial one.
//!
//! Records are decoded one by one: a record that does not decode is skipped
//! by readers and kept verbatim when the document is rewritten.

use std::{
    ffi::OsString,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::StoreError, model::Observation};

pub trait ObservationStore: Send + Sync + Debug {
    /// Full history in insertion order. Unreadable or corrupt storage is
    /// logged and treated as empty.
    fn load(&self) -> Vec<Observation> {
        match self.try_load() {
            Ok(observations) => observations,
            Err(err) => {
                warn!(error = %err, "record store unreadable, treating history as empty");
                Vec::new()
            }
        }
    }

    /// Full history in insertion order. Missing or empty storage is `Ok`
    /// and empty; unreadable storage is an error.
    fn try_load(&self) -> Result<Vec<Observation>, StoreError>;

    fn append(&self, observation: &Observation) -> Result<(), StoreError>;
}

/// Store backed by one JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> Result<Vec<Value>, StoreError> {
        // Raw bytes, so invalid UTF-8 surfaces as `Corrupt` rather than `Read`.
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Read { path: self.path.clone(), source }),
        };

        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&contents)
            .map_err(|source| StoreError::Corrupt { path: self.path.clone(), source })
    }

    fn write_records(&self, records: &[Value]) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp = sibling(&self.path, ".tmp");

        fs::write(&tmp, json).map_err(write_err)?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(err));
        }

        Ok(())
    }

    /// Move an undecodable document aside before it gets replaced.
    fn set_aside_corrupt(&self) {
        let backup = sibling(&self.path, ".corrupt");
        match fs::rename(&self.path, &backup) {
            Ok(()) => warn!(backup = %backup.display(), "moved corrupt record store aside"),
            Err(err) => warn!(error = %err, "could not move corrupt record store aside"),
        }
    }
}

impl ObservationStore for JsonFileStore {
    fn try_load(&self) -> Result<Vec<Observation>, StoreError> {
        let records = self.read_records()?;
        Ok(decode_records(records, &self.path))
    }

    fn append(&self, observation: &Observation) -> Result<(), StoreError> {
        let mut records = match self.read_records() {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "existing records unreadable, appending to an empty store");
                if matches!(err, StoreError::Corrupt { .. }) {
                    self.set_aside_corrupt();
                }
                Vec::new()
            }
        };

        records.push(serde_json::to_value(observation)?);
        self.write_records(&records)?;

        debug!(path = %self.path.display(), records = records.len(), "appended observation");
        Ok(())
    }
}

/// In-process store; nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    observations: Mutex<Vec<Observation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observations(observations: Vec<Observation>) -> Self {
        Self { observations: Mutex::new(observations) }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Observation>> {
        self.observations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObservationStore for MemoryStore {
    fn try_load(&self) -> Result<Vec<Observation>, StoreError> {
        Ok(self.lock().clone())
    }

    fn append(&self, observation: &Observation) -> Result<(), StoreError> {
        self.lock().push(observation.clone());
        Ok(())
    }
}

fn decode_records(records: Vec<Value>, path: &Path) -> Vec<Observation> {
    let total = records.len();
    let observations: Vec<Observation> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(observation) => Some(observation),
            Err(err) => {
                warn!(path = %path.display(), index, error = %err, "skipping invalid record");
                None
            }
        })
        .collect();

    if observations.len() < total {
        debug!(skipped = total - observations.len(), total, "some records were not decodable");
    }

    observations
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

//! Save/load persistence with corruption recovery
//!
//! Features:
//! - Versioned JSON envelope (a bare JSON array is accepted on load)
//! - Backup rotation (old save → `.bak`, then atomic write)
//! - Corruption detection and recovery from the backup

pub mod storage;

pub use storage::{FileStorage, LocalFileStorage, MemoryStorage, StorageError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current envelope version
pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    records: &'a [T],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Stored<T> {
    Envelope { version: u32, records: Vec<T> },
    Flat(Vec<T>),
}

/// Result of reading a record list
#[derive(Debug, PartialEq)]
pub enum LoadOutcome<T> {
    /// Nothing stored yet
    Missing,
    /// Primary file parsed cleanly
    Loaded(Vec<T>),
    /// Primary file was unusable, records came from the backup
    Recovered(Vec<T>),
    /// Neither primary nor backup could be used
    Corrupt(String),
}

impl<T> LoadOutcome<T> {
    /// Records to start with; empty unless something was readable
    pub fn into_records(self) -> Vec<T> {
        match self {
            LoadOutcome::Loaded(records) | LoadOutcome::Recovered(records) => records,
            LoadOutcome::Missing | LoadOutcome::Corrupt(_) => Vec::new(),
        }
    }
}

/// Name of the backup copy kept next to `name`
pub fn backup_name(name: &str) -> String {
    format!("{name}.bak")
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, String> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err("file is empty".to_string());
    }
    match serde_json::from_slice::<Stored<T>>(bytes) {
        Ok(Stored::Envelope { version, records }) if version == ENVELOPE_VERSION => Ok(records),
        Ok(Stored::Envelope { version, .. }) => Err(format!("unsupported version {version}")),
        Ok(Stored::Flat(records)) => Ok(records),
        Err(e) => Err(e.to_string()),
    }
}

/// Read a record list, falling back to the backup copy if the primary is damaged.
///
/// Never fails: problems are logged and reported through the outcome.
pub fn load_records<T: DeserializeOwned>(storage: &dyn FileStorage, name: &str) -> LoadOutcome<T> {
    let primary = match storage.load(name) {
        Ok(Some(bytes)) => parse(&bytes),
        Ok(None) => return LoadOutcome::Missing,
        Err(e) => Err(e.to_string()),
    };

    let reason = match primary {
        Ok(records) => return LoadOutcome::Loaded(records),
        Err(reason) => reason,
    };
    log::warn!("Could not read {name}: {reason}; trying backup");

    match storage.load(&backup_name(name)) {
        Ok(Some(bytes)) => match parse(&bytes) {
            Ok(records) => {
                log::warn!("Recovered {} records from backup of {name}", records.len());
                LoadOutcome::Recovered(records)
            }
            Err(e) => {
                log::warn!("Backup of {name} is unusable too: {e}");
                LoadOutcome::Corrupt(reason)
            }
        },
        _ => LoadOutcome::Corrupt(reason),
    }
}

/// Write a record list, rotating the previous contents into the backup slot.
pub fn save_records<T: Serialize>(
    storage: &dyn FileStorage,
    name: &str,
    records: &[T],
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(&EnvelopeRef {
        version: ENVELOPE_VERSION,
        records,
    })?;

    // Only rotate a primary that still parses; never overwrite a good backup with garbage
    if let Ok(Some(previous)) = storage.load(name) {
        if parse::<serde_json::Value>(&previous).is_ok() {
            storage.save(&backup_name(name), &previous)?;
        }
    }
    storage.save(name, &bytes)
}

//! Crash-safe JSON persistence
//!
//! Every collection is one JSON document in the data directory. Writes
//! go to a temporary file in the same directory, flushed and fsynced,
//! the current file is copied to a rolling `.backup` sibling, then the
//! temporary is atomically renamed into place. Loads fall back from the
//! main file to the backup, and degrade to empty with a recorded error
//! if both are unreadable.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::errors::StateResult;

/// Atomically write a collection to `<datadir>/<name>`.
pub fn save_atomic<T: Serialize>(datadir: &Path, name: &str, value: &T) -> StateResult<()> {
    fs::create_dir_all(datadir)?;
    let path = datadir.join(name);
    let tmp = datadir.join(format!(".tmp_{name}"));

    let data = serde_json::to_vec_pretty(value)?;
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.flush()?;
        file.sync_all()?;
    }

    if path.exists() {
        // Best-effort rolling backup of the last good file
        if let Err(e) = fs::copy(&path, datadir.join(format!("{name}.backup"))) {
            warn!("backup of {name} failed: {e}");
        }
    }

    fs::rename(&tmp, &path)?;
    Ok(())
}

/// Load `<datadir>/<name>`, falling back to its `.backup` on corruption.
pub fn load_with_backup<T: DeserializeOwned>(datadir: &Path, name: &str) -> Option<T> {
    let path = datadir.join(name);
    match fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => return Some(value),
            Err(e) => warn!("{name} corrupted ({e}), trying backup"),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => warn!("{name} unreadable ({e}), trying backup"),
    }

    let backup = datadir.join(format!("{name}.backup"));
    match fs::read(&backup) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => {
                warn!("{name} restored from backup");
                Some(value)
            }
            Err(e) => {
                error!("{name} backup also corrupted ({e}), starting empty");
                None
            }
        },
        Err(_) => {
            error!("{name} corrupted with no usable backup, starting empty");
            None
        }
    }
}

/*
 * Process-wide persisted state: the dangling-images toggle and per-tree settings.
 * Values are stored as JSON under string keys, mirroring a key/value memento.
 *
 * The `StateStoreOperations` trait allows different backends. `CoreStateStore` keeps a
 * single `state.json` document in the application's local config directory (see
 * `path_utils`); `InMemoryStateStore` is used by tests and by hosts that do not want
 * anything written to disk.
 */
use crate::core::path_utils;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const STATE_FILENAME: &str = "state.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("State I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("State serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Could not determine a configuration directory for persisted state")]
    NoConfigDirectory,
    #[error("State store lock was poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StateError>;

pub trait StateStoreOperations: Send + Sync {
    fn get_value(&self, key: &str) -> Result<Option<Value>>;
    fn set_value(&self, key: &str, value: Value) -> Result<()>;
    fn remove_value(&self, key: &str) -> Result<()>;
}

/*
 * Reads a stored value and deserializes it into `T`.
 *
 * Args:
 * - `store`: The state store to read from.
 * - `key`: The dotted state key, e.g. `"images.settings"`.
 *
 * Returns:
 * - `Ok(Some(T))` for a stored value of the right shape.
 * - `Ok(None)` if the key was never written.
 * - `Err(StateError)` if the store cannot be read or the value has another shape.
 */
pub fn load_typed<T: DeserializeOwned>(
    store: &dyn StateStoreOperations,
    key: &str,
) -> Result<Option<T>> {
    match store.get_value(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serializes `value` and stores it under `key`, replacing any previous value.
pub fn save_typed<T: Serialize>(store: &dyn StateStoreOperations, key: &str, value: &T) -> Result<()> {
    store.set_value(key, serde_json::to_value(value)?)
}

pub struct CoreStateStore {
    file_path: PathBuf,
    // Serializes read-modify-write cycles on the state file within this process.
    file_lock: Mutex<()>,
}

impl CoreStateStore {
    /*
     * Creates a store backed by `state.json` inside the application's local config
     * directory. The directory is created on demand; the file itself is only written
     * by the first `set_value`.
     *
     * Args:
     * - `app_name`: The application name that selects the config directory.
     *
     * Returns:
     * - `Ok(CoreStateStore)` pointing at the state file.
     * - `Err(StateError::NoConfigDirectory)` if no config directory could be resolved
     *   or created.
     */
    pub fn for_app(app_name: &str) -> Result<Self> {
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(StateError::NoConfigDirectory)?;
        Ok(Self::at_path(config_dir.join(STATE_FILENAME)))
    }

    /// Store backed by an explicit file. Used by `--state-file` and by tests.
    pub fn at_path(file_path: PathBuf) -> Self {
        CoreStateStore {
            file_path,
            file_lock: Mutex::new(()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.file_path.exists() {
            log::trace!(
                "CoreStateStore: State file {:?} does not exist yet.",
                self.file_path
            );
            return Ok(Map::new());
        }

        let file = File::open(&self.file_path)?;
        if file.metadata()?.len() == 0 {
            log::debug!("CoreStateStore: State file {:?} is empty.", self.file_path);
            return Ok(Map::new());
        }
        let document: Map<String, Value> = serde_json::from_reader(BufReader::new(file))?;
        Ok(document)
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), document)?;
        Ok(())
    }
}

impl StateStoreOperations for CoreStateStore {
    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.file_lock.lock().map_err(|_| StateError::Poisoned)?;
        let mut document = self.read_document()?;
        Ok(document.remove(key))
    }

    fn set_value(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.file_lock.lock().map_err(|_| StateError::Poisoned)?;
        let mut document = self.read_document()?;
        document.insert(key.to_string(), value);
        self.write_document(&document)?;
        log::debug!(
            "CoreStateStore: Saved key '{key}' to {:?}.",
            self.file_path
        );
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        let _guard = self.file_lock.lock().map_err(|_| StateError::Poisoned)?;
        let mut document = self.read_document()?;
        if document.remove(key).is_some() {
            self.write_document(&document)?;
            log::debug!(
                "CoreStateStore: Removed key '{key}' from {:?}.",
                self.file_path
            );
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStateStore {
    values: Mutex<HashMap<String, Value>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStoreOperations for InMemoryStateStore {
    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let values = self.values.lock().map_err(|_| StateError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| StateError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| StateError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

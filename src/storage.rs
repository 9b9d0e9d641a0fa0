//! On-disk storage for focus
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   focus.toml              # Optional configuration
//!   .focus/                 # Data directory (name configurable)
//!     store.json            # Every entity, rewritten atomically per transaction
//!     store.lock            # Exclusive lock held for the length of a transaction
//!     user                  # Persisted acting user
//!     outbox.jsonl          # Invitation notices awaiting delivery
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock};
use crate::store::{Dataset, EntityStore, STORE_SCHEMA_VERSION};

pub const STORE_FILE: &str = "store.json";
pub const STORE_LOCK_FILE: &str = "store.lock";
pub const USER_FILE: &str = "user";

/// Path layout plus file I/O helpers for a focus root
#[derive(Debug, Clone)]
pub struct Storage {
    /// Directory holding `focus.toml`
    root: PathBuf,
    /// Data directory (`<root>/.focus` by default)
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf, data_dir: PathBuf) -> Self {
        Self { root, data_dir }
    }

    /// Storage for a root, using the data directory named in its config
    pub fn for_root(root: PathBuf, config: &Config) -> Self {
        let data_dir = root.join(&config.storage.dir);
        Self::new(root, data_dir)
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn store_lock_file(&self) -> PathBuf {
        self.data_dir.join(STORE_LOCK_FILE)
    }

    pub fn user_file(&self) -> PathBuf {
        self.data_dir.join(USER_FILE)
    }

    pub fn outbox_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    /// Create the data directory and an empty store if missing.
    pub fn init(&self) -> Result<bool> {
        fs::create_dir_all(&self.data_dir)?;
        let store_file = self.store_file();
        if store_file.exists() {
            return Ok(false);
        }
        self.write_json(&store_file, &Dataset::default())?;
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.store_file().exists()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Append one record to a JSONL file. Callers serialize concurrent
    /// appends themselves.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        writeln!(file, "{}", json)?;
        file.sync_all()?;

        Ok(())
    }

    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }

    // =========================================================================
    // Acting user persistence
    // =========================================================================

    pub fn read_user(&self) -> Result<Option<String>> {
        let path = self.user_file();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let user = raw.trim();
        if user.is_empty() {
            return Ok(None);
        }
        Ok(Some(user.to_string()))
    }

    pub fn write_user(&self, user: &str) -> Result<()> {
        lock::write_atomic(self.user_file(), format!("{user}\n").as_bytes())
    }
}

/// Dataset persisted as one JSON document, guarded by a file lock
#[derive(Debug, Clone)]
pub struct FileStore {
    storage: Storage,
    lock_timeout_ms: u64,
}

impl FileStore {
    pub fn new(storage: Storage, lock_timeout_ms: u64) -> Self {
        Self {
            storage,
            lock_timeout_ms,
        }
    }

    /// Open the store for an initialized root
    pub fn open(storage: Storage, lock_timeout_ms: u64) -> Result<Self> {
        if !storage.is_initialized() {
            return Err(Error::Validation(format!(
                "no focus data at {} (run `focus init`)",
                storage.data_dir().display()
            )));
        }
        Ok(Self::new(storage, lock_timeout_ms))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn load(&self) -> Result<Dataset> {
        let path = self.storage.store_file();
        if !path.exists() {
            return Ok(Dataset::default());
        }
        let dataset: Dataset = self.storage.read_json(&path)?;
        if dataset.schema_version != STORE_SCHEMA_VERSION {
            return Err(Error::Validation(format!(
                "unsupported store schema '{}' (expected {STORE_SCHEMA_VERSION})",
                dataset.schema_version
            )));
        }
        Ok(dataset)
    }
}

impl EntityStore for FileStore {
    fn snapshot(&self) -> Result<Dataset> {
        let _lock = FileLock::acquire(self.storage.store_lock_file(), self.lock_timeout_ms)?;
        self.load()
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Dataset) -> Result<T>,
    {
        let _lock = FileLock::acquire(self.storage.store_lock_file(), self.lock_timeout_ms)?;
        let mut dataset = self.load()?;
        let value = f(&mut dataset)?;
        self.storage
            .write_json(&self.storage.store_file(), &dataset)?;
        debug!(path = %self.storage.store_file().display(), "store committed");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

    fn setup() -> (TempDir, FileStore) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().to_path_buf();
        let storage = Storage::new(root.clone(), root.join(".focus"));
        storage.init().expect("init");
        (dir, FileStore::new(storage, DEFAULT_LOCK_TIMEOUT_MS))
    }

    #[test]
    fn init_is_idempotent() {
        let (_dir, store) = setup();
        assert!(!store.storage().init().expect("second init"));
        assert!(store.storage().is_initialized());
    }

    #[test]
    fn open_requires_init() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().to_path_buf();
        let storage = Storage::new(root.clone(), root.join(".focus"));
        let err = FileStore::open(storage, 100).expect_err("uninitialized");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn failed_transaction_leaves_file_untouched() {
        let (_dir, store) = setup();
        let before = fs::read_to_string(store.storage().store_file()).expect("read");
        let result: Result<()> = store.with_transaction(|data| {
            data.upsert_completion(crate::model::DailyCompletionRecord::new(
                "alice",
                chrono::NaiveDate::from_ymd_opt(2024, 6, 3).expect("date"),
                1,
                1,
            ));
            Err(Error::Conflict("abort".to_string()))
        });
        assert!(result.is_err());
        let after = fs::read_to_string(store.storage().store_file()).expect("read");
        assert_eq!(before, after);
    }

    #[test]
    fn jsonl_round_trip_skips_blank_lines() {
        let (_dir, store) = setup();
        let path = store.storage().data_dir().join("log.jsonl");
        store
            .storage()
            .append_jsonl(&path, &serde_json::json!({"n": 1}))
            .expect("append");
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file))
            .expect("blank line");
        store
            .storage()
            .append_jsonl(&path, &serde_json::json!({"n": 2}))
            .expect("append");
        let records: Vec<serde_json::Value> = store.storage().read_jsonl(&path).expect("read");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn user_file_round_trip() {
        let (_dir, store) = setup();
        assert_eq!(store.storage().read_user().expect("read"), None);
        store.storage().write_user("alice").expect("write");
        assert_eq!(
            store.storage().read_user().expect("read"),
            Some("alice".to_string())
        );
    }
}

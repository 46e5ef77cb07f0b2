//! Key-value persistence backends
//!
//! The store core depends only on the four-operation `KvStore` contract.
//! `MemoryKv` mirrors the capacity-bounded browser storage the application
//! shell runs against; `FileKv` keeps one file per key for desktop use
//! and durable test fixtures.

use crate::error::{Result, SaccoError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default capacity for `MemoryKv`, matching browser local storage (~5 MiB)
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Synchronous string-keyed persistence contract.
///
/// Values are serialized text. `set` may reject a write (quota); reads of
/// absent keys return `Ok(None)` rather than an error.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

// A shared reference is itself a usable backend, so components that only
// borrow the storage (the migrator) can hand it to an owning `Store`.
impl<K: KvStore + ?Sized> KvStore for &K {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}

/// In-memory backend with a byte quota.
///
/// Single-threaded interior mutability: the application model is
/// cooperative, so `RefCell` suffices and no lock discipline is needed.
#[derive(Debug)]
pub struct MemoryKv {
    entries: RefCell<HashMap<String, String>>,
    quota_bytes: usize,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            quota_bytes,
        }
    }

    /// Total stored bytes (keys plus values)
    pub fn used_bytes(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.borrow_mut();
        let existing = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let used: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        let after = used - existing + key.len() + value.len();

        if after > self.quota_bytes {
            return Err(SaccoError::storage_write(
                key,
                format!("quota exceeded ({} > {} bytes)", after, self.quota_bytes),
            ));
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .borrow()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// File-backed backend: one file per key inside a managed directory.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Open the backend, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        log::debug!("Opened file kv store at: {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are dot/underscore-separated identifiers; anything else is
        // escaped so a key can never traverse out of the directory.
        let safe: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.kv", safe))
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path).map_err(|e| {
            SaccoError::read_failure(format!("{}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::write(self.path_for(key), value)
            .map_err(|e| SaccoError::storage_write(key, e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(extension) = path.extension() {
                if extension == "kv" {
                    if let Some(stem) = path.file_stem() {
                        if let Some(name) = stem.to_str() {
                            if name.starts_with(prefix) {
                                keys.push(name.to_string());
                            }
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

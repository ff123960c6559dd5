//! Content-addressed publish-time cache
//!
//! The [`VersionStore`] maps `path=version` keys to publish times. Entries
//! are immutable once written: a (path, version) pair's publish time never
//! changes upstream, so the first successful fetch is authoritative.
//!
//! Persistence is an append-only JSON-lines log. Loading decodes records
//! until EOF, deduplicating by key; a duplicate in the log is tolerated with
//! a warning. The store only guarantees consistency within one run and one
//! file, not across concurrent processes.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode cache entry: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cache lock poisoned")]
    LockPoisoned,
}

/// One persisted cache record; the on-disk log is one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedRelease {
    pub path: String,
    pub version: Version,
    pub time: DateTime<Utc>,
}

/// Thread-safe publish-time cache with optional file persistence.
///
/// Reads take the shared lock; inserts take the exclusive lock and re-check
/// the key after acquiring it, so two tasks racing to cache the same release
/// persist exactly one log entry.
pub struct VersionStore {
    entries: RwLock<HashMap<String, CachedRelease>>,
    log: Option<Mutex<File>>,
}

impl VersionStore {
    /// In-memory store without persistence.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            log: None,
        }
    }

    /// Opens (or creates) the persisted store at `file_path` and loads every
    /// previously appended record.
    pub fn open(file_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let reader = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(file_path)?;

        let mut entries = HashMap::new();
        for record in serde_json::Deserializer::from_reader(&reader).into_iter::<CachedRelease>() {
            let record = record?;
            let key = entry_key(&record.path, &record.version);
            if entries.contains_key(&key) {
                warn!("duplicate cache entry for {key}, keeping the first");
                continue;
            }
            entries.insert(key, record);
        }

        Ok(Self {
            entries: RwLock::new(entries),
            log: Some(Mutex::new(reader)),
        })
    }

    pub fn get(&self, path: &str, version: &Version) -> Option<CachedRelease> {
        let entries = self.entries.read().ok()?;
        entries.get(&entry_key(path, version)).cloned()
    }

    pub fn has(&self, path: &str, version: &Version) -> bool {
        self.entries
            .read()
            .is_ok_and(|entries| entries.contains_key(&entry_key(path, version)))
    }

    /// Inserts a release and appends it to the log. A key already present is
    /// left untouched and nothing is persisted.
    pub fn insert(&self, release: CachedRelease) -> Result<(), CacheError> {
        if self.has(&release.path, &release.version) {
            return Ok(());
        }
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        // Re-check under the exclusive lock; another task may have won the race.
        let key = entry_key(&release.path, &release.version);
        if entries.contains_key(&key) {
            return Ok(());
        }
        if let Some(log) = &self.log {
            let mut line = serde_json::to_vec(&release)?;
            line.push(b'\n');
            let mut file = log.lock().map_err(|_| CacheError::LockPoisoned)?;
            file.write_all(&line)?;
        }
        entries.insert(key, release);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entry_key(path: &str, version: &Version) -> String {
    format!("{path}={version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(path: &str, version: &str, time: &str) -> CachedRelease {
        CachedRelease {
            path: path.to_string(),
            version: Version::parse(version).unwrap(),
            time: time.parse().unwrap(),
        }
    }

    #[test]
    fn insert_and_get_round_trip_in_memory() {
        let store = VersionStore::in_memory();
        let entry = release("golang.org/x/text", "0.14.0", "2023-11-02T15:04:05Z");

        store.insert(entry.clone()).unwrap();

        let loaded = store
            .get("golang.org/x/text", &Version::parse("0.14.0").unwrap())
            .unwrap();
        assert_eq!(loaded, entry);
    }

    #[test]
    fn get_misses_on_different_version() {
        let store = VersionStore::in_memory();
        store
            .insert(release("golang.org/x/text", "0.14.0", "2023-11-02T15:04:05Z"))
            .unwrap();

        assert!(
            store
                .get("golang.org/x/text", &Version::parse("0.13.0").unwrap())
                .is_none()
        );
    }

    #[test]
    fn insert_ignores_existing_key() {
        let store = VersionStore::in_memory();
        let first = release("golang.org/x/text", "0.14.0", "2023-11-02T15:04:05Z");
        let second = release("golang.org/x/text", "0.14.0", "2024-01-01T00:00:00Z");

        store.insert(first.clone()).unwrap();
        store.insert(second).unwrap();

        let loaded = store
            .get("golang.org/x/text", &Version::parse("0.14.0").unwrap())
            .unwrap();
        assert_eq!(loaded.time, first.time);
        assert_eq!(store.len(), 1);
    }
}

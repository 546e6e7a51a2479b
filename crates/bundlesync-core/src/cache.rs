use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use bundlesync_utils::{
    fs::{ensure_dir_exists, safe_remove, staging_path, write_atomic},
    lock::FileLock,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::SyncError, SyncResult};

/// What is known about the payload stored in a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Digest of the last payload written and verified. Empty on first run
    /// and after syncing a manifest that carried no digest.
    #[serde(default)]
    pub last_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Resource the manifest named when the payload was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A named cache slot inside a cache directory.
///
/// A slot owns three files: the payload `<slot>.bundle`, the record
/// `<slot>.json` and the lock `<slot>.lock`. Downloads are staged in
/// `<slot>.bundle.part`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    dir: PathBuf,
    slot: String,
}

impl CacheStore {
    pub fn new<P: AsRef<Path>>(dir: P, slot: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            slot: slot.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn payload_path(&self) -> PathBuf {
        self.dir.join(format!("{}.bundle", self.slot))
    }

    pub fn staging_path(&self) -> PathBuf {
        staging_path(self.payload_path(), "part")
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.slot))
    }

    pub fn lock_path(&self) -> PathBuf {
        FileLock::lock_path(&self.dir, &self.slot)
    }

    pub fn has_payload(&self) -> bool {
        self.payload_path().is_file()
    }

    /// Creates the cache directory if needed.
    pub fn ensure_dir(&self) -> SyncResult<()> {
        Ok(ensure_dir_exists(&self.dir)?)
    }

    /// Takes the slot lock, waiting for other holders.
    pub fn lock(&self) -> SyncResult<FileLock> {
        Ok(FileLock::acquire(&self.dir, &self.slot)?)
    }

    /// Takes the slot lock if nobody else holds it.
    pub fn try_lock(&self) -> SyncResult<Option<FileLock>> {
        Ok(FileLock::try_acquire(&self.dir, &self.slot)?)
    }

    /// Reads the slot record.
    ///
    /// A missing record is an empty one. An unreadable record is also
    /// treated as empty so that the next sync downloads again.
    pub fn load_record(&self) -> SyncResult<CacheRecord> {
        let path = self.record_path();
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(CacheRecord::default()),
            Err(source) => {
                return Err(SyncError::IoError {
                    action: format!("reading {}", path.display()),
                    source,
                });
            }
        };

        match serde_json::from_slice(&content) {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!("ignoring unreadable cache record {}: {}", path.display(), err);
                Ok(CacheRecord::default())
            }
        }
    }

    /// Persists the slot record atomically.
    pub fn save_record(&self, record: &CacheRecord) -> SyncResult<()> {
        let path = self.record_path();
        let content = serde_json::to_vec_pretty(record).map_err(|source| {
            SyncError::Record {
                path: path.clone(),
                source,
            }
        })?;

        self.ensure_dir()?;
        write_atomic(&path, &content)?;
        debug!("saved cache record {}", path.display());
        Ok(())
    }

    /// Removes the payload, the record and any leftover staging file.
    ///
    /// Returns true if anything was removed.
    pub fn clean(&self) -> SyncResult<bool> {
        let mut removed = false;
        for path in [self.payload_path(), self.staging_path(), self.record_path()] {
            if path.exists() {
                safe_remove(&path)?;
                debug!("removed {}", path.display());
                removed = true;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_slot_paths() {
        let store = CacheStore::new("/var/cache/bundlesync", "agent");

        assert_eq!(
            store.payload_path(),
            PathBuf::from("/var/cache/bundlesync/agent.bundle")
        );
        assert_eq!(
            store.staging_path(),
            PathBuf::from("/var/cache/bundlesync/agent.bundle.part")
        );
        assert_eq!(
            store.record_path(),
            PathBuf::from("/var/cache/bundlesync/agent.json")
        );
        assert_eq!(
            store.lock_path(),
            PathBuf::from("/var/cache/bundlesync/agent.lock")
        );
    }

    #[test]
    fn test_missing_record_is_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), "agent");

        let record = store.load_record().unwrap();
        assert!(record.last_digest.is_empty());
        assert!(record.version.is_none());
    }

    #[test]
    fn test_record_round_trip() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested"), "agent");
        let record = CacheRecord {
            last_digest: "6f5902ac237024bdd0c176cb93063dc4".into(),
            version: Some("7".into()),
            resource_name: Some("AIAgentModel".into()),
            updated_at: Some(Utc::now()),
        };

        store.save_record(&record).unwrap();
        assert_eq!(store.load_record().unwrap(), record);
        assert!(!staging_path(store.record_path(), "tmp").exists());
    }

    #[test]
    fn test_unreadable_record_is_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), "agent");
        fs::write(store.record_path(), "{not json").unwrap();

        assert_eq!(store.load_record().unwrap(), CacheRecord::default());
    }

    #[test]
    fn test_slots_are_independent() {
        let dir = tempdir().unwrap();
        let first = CacheStore::new(dir.path(), "first");
        let second = CacheStore::new(dir.path(), "second");

        first
            .save_record(&CacheRecord {
                last_digest: "aa".into(),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(first.load_record().unwrap().last_digest, "aa");
        assert!(second.load_record().unwrap().last_digest.is_empty());
    }

    #[test]
    fn test_clean() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), "agent");
        fs::write(store.payload_path(), "payload").unwrap();
        fs::write(store.staging_path(), "partial").unwrap();
        store.save_record(&CacheRecord::default()).unwrap();

        assert!(store.clean().unwrap());
        assert!(!store.has_payload());
        assert!(!store.staging_path().exists());
        assert!(!store.record_path().exists());
        assert!(!store.clean().unwrap());
    }

    #[test]
    fn test_try_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path(), "agent");

        let held = store.try_lock().unwrap();
        assert!(held.is_some());
        // flock locks are per open file description, so a second open in the
        // same process conflicts.
        assert!(store.try_lock().unwrap().is_none());

        drop(held);
        assert!(store.try_lock().unwrap().is_some());
    }
}

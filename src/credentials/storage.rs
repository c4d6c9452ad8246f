//! Credential storage backends
//!
//! A credential storage is a small name/value store where every entry carries
//! an expiry, much like a browser cookie jar. Expired entries read as absent.

use super::error::{StorageError, StorageResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Name/value storage with expiry semantics
pub trait CredentialStorage: Send + Sync {
    /// Read a value. Returns `None` when missing or expired.
    fn get(&self, name: &str) -> StorageResult<Option<String>>;

    /// Write a value that expires after `expires_in_days`.
    fn set(&self, name: &str, value: &str, expires_in_days: u32) -> StorageResult<()>;

    /// Remove a value. Removing a missing value is not an error.
    fn remove(&self, name: &str) -> StorageResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Latest expiry an entry can carry; longer lifetimes are clamped to it so
/// the timestamp still round-trips through the JSON file.
fn max_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl StoredCredential {
    fn new(value: &str, expires_in_days: u32) -> Self {
        let max = max_expiry();
        let expires_at = Utc::now()
            .checked_add_signed(Duration::days(i64::from(expires_in_days)))
            .filter(|at| *at < max)
            .unwrap_or(max);

        Self {
            value: value.to_string(),
            expires_at,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// ============================================
// In-memory storage
// ============================================

/// Process-local credential storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, StoredCredential>>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored (possibly expired) entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the storage holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStorage for MemoryStorage {
    fn get(&self, name: &str) -> StorageResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        let now = Utc::now();
        Ok(entries
            .get(name)
            .filter(|c| !c.is_expired(now))
            .map(|c| c.value.clone()))
    }

    fn set(&self, name: &str, value: &str, expires_in_days: u32) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        entries.insert(name.to_string(), StoredCredential::new(value, expires_in_days));
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        entries.remove(name);
        Ok(())
    }
}

// ============================================
// File storage
// ============================================

/// Credential storage backed by a JSON file
///
/// The file is re-read on every access so that several processes (e.g. two
/// CLI invocations) observe each other's writes. Writes go through a
/// temporary file and a rename.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create a file storage at the given path. The file is created lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the credential file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<BTreeMap<String, StoredCredential>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn save(&self, entries: &BTreeMap<String, StoredCredential>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStorage for FileStorage {
    fn get(&self, name: &str) -> StorageResult<Option<String>> {
        let now = Utc::now();
        Ok(self
            .load()?
            .remove(name)
            .filter(|c| !c.is_expired(now))
            .map(|c| c.value))
    }

    fn set(&self, name: &str, value: &str, expires_in_days: u32) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        let now = Utc::now();
        let mut entries = self.load()?;
        entries.retain(|_, c| !c.is_expired(now));
        entries.insert(name.to_string(), StoredCredential::new(value, expires_in_days));
        self.save(&entries)
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        let mut entries = self.load()?;
        if entries.remove(name).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("accessToken").unwrap(), None);

        storage.set("accessToken", "abc", 7).unwrap();
        assert_eq!(storage.get("accessToken").unwrap().as_deref(), Some("abc"));

        storage.remove("accessToken").unwrap();
        assert_eq!(storage.get("accessToken").unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_memory_expired_entry_reads_absent() {
        let storage = MemoryStorage::new();
        storage.set("accessToken", "stale", 0).unwrap();

        assert_eq!(storage.get("accessToken").unwrap(), None);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.remove("nothing").is_ok());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let storage = FileStorage::new(&path);
        storage.set("accessToken", "T1", 7).unwrap();
        storage.set("refreshToken", "R1", 30).unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("accessToken").unwrap().as_deref(), Some("T1"));
        assert_eq!(reopened.get("refreshToken").unwrap().as_deref(), Some("R1"));

        reopened.remove("accessToken").unwrap();
        assert_eq!(storage.get("accessToken").unwrap(), None);
        assert_eq!(storage.get("refreshToken").unwrap().as_deref(), Some("R1"));
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("absent.json"));

        assert_eq!(storage.get("accessToken").unwrap(), None);
        assert!(storage.remove("accessToken").is_ok());
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_drops_expired_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let storage = FileStorage::new(&path);

        storage.set("token", "old", 0).unwrap();
        storage.set("accessToken", "fresh", 7).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("\"token\""));
        assert!(content.contains("fresh"));
    }

    #[test]
    fn test_huge_lifetime_is_clamped() {
        let memory = MemoryStorage::new();
        memory.set("accessToken", "T1", u32::MAX).unwrap();
        assert_eq!(memory.get("accessToken").unwrap().as_deref(), Some("T1"));

        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileStorage::new(&path)
            .set("refreshToken", "R1", u32::MAX)
            .unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("refreshToken").unwrap().as_deref(), Some("R1"));
        assert_eq!(
            StoredCredential::new("x", u32::MAX).expires_at,
            max_expiry()
        );
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get("accessToken"),
            Err(StorageError::Serialization(_))
        ));
    }
}

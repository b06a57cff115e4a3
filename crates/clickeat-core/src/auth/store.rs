use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::session::{SessionStore, StoreError, TokenPair, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name
const SERVICE_NAME: &str = "clickeat";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// File store
// ============================================================================

/// Credential pair persisted as `session.json`, re-read on every access so
/// that writes from other processes are picked up.
///
/// Writes go to a temporary file that is renamed over `session.json`, so a
/// reader sees either the old or the new pair, never a partial file.
pub struct FileSessionStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn read(&self) -> Result<SessionRecord, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(SessionRecord::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(SessionRecord::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, mut record: SessionRecord) -> Result<(), StoreError> {
        let path = self.path();
        std::fs::create_dir_all(&self.dir)?;
        record.updated_at = Some(Utc::now());
        let contents = serde_json::to_string_pretty(&record)?;

        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(contents.as_bytes())?;
        file.persist(&path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "Session saved");
        Ok(())
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn remove(path: &Path) -> Result<(), StoreError> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn access_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.access_token)
    }

    fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.refresh_token)
    }

    fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        self.write(SessionRecord {
            access_token: Some(pair.access.clone()),
            refresh_token: Some(pair.refresh.clone()),
            updated_at: None,
        })
    }

    fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        // A read error must not rewrite the file without the refresh token
        let mut record = self.read()?;
        record.access_token = Some(token.to_string());
        self.write(record)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        Self::remove(&self.path())
    }
}

// ============================================================================
// OS keychain store
// ============================================================================

/// Credential pair kept in the OS keychain, one entry per storage key.
pub struct KeyringSessionStore {
    service: String,
}

impl KeyringSessionStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringSessionStore {
    fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.get(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.get(REFRESH_TOKEN_KEY)
    }

    fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        self.set(ACCESS_TOKEN_KEY, &pair.access)?;
        self.set(REFRESH_TOKEN_KEY, &pair.refresh)
    }

    fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.set(ACCESS_TOKEN_KEY, token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.delete(ACCESS_TOKEN_KEY)?;
        self.delete(REFRESH_TOKEN_KEY)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Non-durable store for tests and short-lived embedding.
#[derive(Default)]
pub struct MemorySessionStore {
    record: RwLock<SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        let store = Self::default();
        if let Ok(mut record) = store.record.write() {
            record.access_token = Some(pair.access);
            record.refresh_token = Some(pair.refresh);
        }
        store
    }

    /// Only an access token, as left behind by an older client version.
    pub fn with_access_only(access: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut record) = store.record.write() {
            record.access_token = Some(access.into());
        }
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn access_token(&self) -> Result<Option<String>, StoreError> {
        let record = self.record.read().map_err(|_| StoreError::Poisoned)?;
        Ok(record.access_token.clone())
    }

    fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        let record = self.record.read().map_err(|_| StoreError::Poisoned)?;
        Ok(record.refresh_token.clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let mut record = self.record.write().map_err(|_| StoreError::Poisoned)?;
        record.access_token = Some(pair.access.clone());
        record.refresh_token = Some(pair.refresh.clone());
        record.updated_at = Some(Utc::now());
        Ok(())
    }

    fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        let mut record = self.record.write().map_err(|_| StoreError::Poisoned)?;
        record.access_token = Some(token.to_string());
        record.updated_at = Some(Utc::now());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut record = self.record.write().map_err(|_| StoreError::Poisoned)?;
        *record = SessionRecord::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_missing_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested"));
        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_file_store_save_refresh_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("clickeat"));

        store.save(&TokenPair::new("A1", "R1")).unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), Some(TokenPair::new("A1", "R1")));

        store.set_access_token("A2").unwrap();
        assert_eq!(store.access_token().unwrap().as_deref(), Some("A2"));
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("R1"));

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.access_token().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_uses_storage_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&TokenPair::new("A1", "R1")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[ACCESS_TOKEN_KEY], "A1");
        assert_eq!(raw[REFRESH_TOKEN_KEY], "R1");
        assert!(raw.get("updated_at").is_some());
    }

    #[test]
    fn test_file_store_shared_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSessionStore::new(dir.path());
        let reader = FileSessionStore::new(dir.path());

        writer.save(&TokenPair::new("A1", "R1")).unwrap();
        writer.set_access_token("A2").unwrap();
        assert_eq!(reader.access_token().unwrap().as_deref(), Some("A2"));
    }

    #[test]
    fn test_file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.access_token(), Err(StoreError::Serde(_))));
        assert!(store.set_access_token("A2").is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{not json");
    }

    #[test]
    fn test_file_store_concurrent_writers_keep_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&TokenPair::new("A1", "R1")).unwrap();

        std::thread::scope(|s| {
            for writer in 0..2 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..200 {
                        store.set_access_token(&format!("A{}-{}", writer, i)).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("R1"));
        assert!(store.access_token().unwrap().is_some());
    }

    #[test]
    fn test_file_store_reader_never_sees_partial_write() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&TokenPair::new("A1", "R1")).unwrap();
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..300 {
                    store.set_access_token(&format!("A{}", i)).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });
            s.spawn(|| {
                // Another handle on the same file, as a second process would have
                let reader = FileSessionStore::new(dir.path());
                while !done.load(Ordering::SeqCst) {
                    assert_eq!(reader.refresh_token().unwrap().as_deref(), Some("R1"));
                }
            });
        });
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemorySessionStore::with_pair(TokenPair::new("A1", "R1"));
        assert!(store.is_authenticated());

        store.set_access_token("A2").unwrap();
        assert_eq!(store.load().unwrap(), Some(TokenPair::new("A2", "R1")));

        store.clear().unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token().unwrap(), None);
    }

    #[test]
    fn test_memory_store_access_only() {
        let store = MemorySessionStore::with_access_only("A1");
        assert!(store.is_authenticated());
        assert_eq!(store.refresh_token().unwrap(), None);
        assert_eq!(store.load().unwrap(), None);
    }
}

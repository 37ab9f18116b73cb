//! Remote sync boundary.
//!
//! The engine talks to its persistence collaborator through `SyncStore`:
//! one canonical load at bootstrap, best-effort full-snapshot saves after
//! every mutation. The remote is trusted to be last-write-wins; overlapping
//! saves are tolerated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;

use portfolio::SubscriptionRecord;

/// Error types for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport or parse problem at the remote store
    #[error("Sync unavailable: {0}")]
    Unavailable(String),
}

/// Provider status exposed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub provider: String,
    pub is_cloud_active: bool,
}

/// Contract for the external persistence collaborator.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Load the full remote copy. `None` means the remote has no copy yet.
    async fn load_all(&self) -> Result<Option<Vec<SubscriptionRecord>>, SyncError>;

    /// Replace the full remote copy with this snapshot.
    async fn save_all(&self, records: &[SubscriptionRecord]) -> Result<(), SyncError>;

    /// Provider status.
    fn status(&self) -> SyncStatus;
}

/// In-memory store with failure injection, for tests and offline runs.
pub struct MemorySyncStore {
    records: RwLock<Option<Vec<SubscriptionRecord>>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    save_count: AtomicU32,
}

impl MemorySyncStore {
    /// Create an empty store (no remote copy).
    pub fn new() -> Self {
        Self {
            records: RwLock::new(None),
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            save_count: AtomicU32::new(0),
        }
    }

    /// Create a store seeded with a remote copy.
    pub fn with_records(records: Vec<SubscriptionRecord>) -> Self {
        let store = Self::new();
        *store.records.try_write().expect("fresh lock") = Some(records);
        store
    }

    /// Make loads fail with `SyncError::Unavailable`.
    pub fn with_failing_loads(self) -> Self {
        self.fail_loads.store(true, Ordering::SeqCst);
        self
    }

    /// Make saves fail with `SyncError::Unavailable`.
    pub fn with_failing_saves(self) -> Self {
        self.fail_saves.store(true, Ordering::SeqCst);
        self
    }

    /// Number of save_all calls that reached the store.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }

    /// The currently stored copy.
    pub async fn stored(&self) -> Option<Vec<SubscriptionRecord>> {
        self.records.read().await.clone()
    }
}

impl Default for MemorySyncStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncStore for MemorySyncStore {
    async fn load_all(&self) -> Result<Option<Vec<SubscriptionRecord>>, SyncError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(SyncError::Unavailable("Injected load failure".to_string()));
        }
        Ok(self.records.read().await.clone())
    }

    async fn save_all(&self, records: &[SubscriptionRecord]) -> Result<(), SyncError> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SyncError::Unavailable("Injected save failure".to_string()));
        }
        *self.records.write().await = Some(records.to_vec());
        Ok(())
    }

    fn status(&self) -> SyncStatus {
        SyncStatus {
            provider: "memory".to_string(),
            is_cloud_active: true,
        }
    }
}

/// JSON document on local disk.
pub struct FileSyncStore {
    path: PathBuf,
}

impl FileSyncStore {
    /// Create a store backed by the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SyncStore for FileSyncStore {
    async fn load_all(&self) -> Result<Option<Vec<SubscriptionRecord>>, SyncError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::Unavailable(e.to_string())),
        };

        let records = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Unavailable(format!("Corrupt store: {}", e)))?;
        Ok(Some(records))
    }

    async fn save_all(&self, records: &[SubscriptionRecord]) -> Result<(), SyncError> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| SyncError::Unavailable(e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| SyncError::Unavailable(e.to_string()))
    }

    fn status(&self) -> SyncStatus {
        SyncStatus {
            provider: "file".to_string(),
            is_cloud_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio::Ledger;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_counters() {
        let store = MemorySyncStore::new();
        assert!(store.load_all().await.unwrap().is_none());

        let snapshot = Ledger::seed();
        store.save_all(&snapshot).await.unwrap();

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_all().await.unwrap().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemorySyncStore::new().with_failing_loads().with_failing_saves();

        assert!(store.load_all().await.is_err());
        assert!(store.save_all(&[]).await.is_err());
        // Failed saves still count as attempts that reached the store
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSyncStore::new(dir.path().join("subscriptions.json"));

        assert!(store.load_all().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_and_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscriptions.json");
        let store = FileSyncStore::new(&path);

        let snapshot = Ledger::seed();
        store.save_all(&snapshot).await.unwrap();
        let loaded = store.load_all().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);

        tokio::fs::write(&path, b"not json").await.unwrap();
        assert!(matches!(
            store.load_all().await,
            Err(SyncError::Unavailable(_))
        ));
    }
}

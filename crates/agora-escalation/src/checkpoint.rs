//! Scan checkpoint persistence
//!
//! The checkpoint records the last block a scan fully processed. It is
//! written after every successful chunk, so a crash mid-scan resumes at the
//! next block without re-scanning or skipping anything.

use agora_types::{AgoraError, Result};
use std::sync::atomic::{AtomicI64, Ordering};

/// Persisted scan cursor
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last fully processed block, or `None` before the first scan
    async fn load(&self) -> Result<Option<u64>>;

    /// Persist a newly processed block
    async fn store(&self, block: u64) -> Result<()>;
}

const CHECKPOINT_KEY: &str = "last_block";

/// Checkpoint backed by an embedded sled tree
pub struct SledCheckpointStore {
    tree: sled::Tree,
}

impl SledCheckpointStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree("scan_checkpoint").map_err(AgoraError::storage)?;
        Ok(Self { tree })
    }
}

#[async_trait::async_trait]
impl CheckpointStore for SledCheckpointStore {
    async fn load(&self) -> Result<Option<u64>> {
        let value = self.tree.get(CHECKPOINT_KEY).map_err(AgoraError::storage)?;
        match value {
            None => Ok(None),
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    AgoraError::storage("corrupt checkpoint: expected 8 bytes")
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
        }
    }

    async fn store(&self, block: u64) -> Result<()> {
        self.tree
            .insert(CHECKPOINT_KEY, block.to_be_bytes().to_vec())
            .map_err(AgoraError::storage)?;
        self.tree.flush_async().await.map_err(AgoraError::storage)?;
        Ok(())
    }
}

/// In-memory checkpoint for tests; -1 encodes "never stored"
pub struct MemoryCheckpointStore {
    last: AtomicI64,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(-1),
        }
    }

    pub fn starting_at(block: u64) -> Self {
        Self {
            last: AtomicI64::new(block as i64),
        }
    }
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<u64>> {
        let v = self.last.load(Ordering::SeqCst);
        Ok(if v < 0 { None } else { Some(v as u64) })
    }

    async fn store(&self, block: u64) -> Result<()> {
        self.last.store(block as i64, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sled_checkpoint_round_trips() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledCheckpointStore::open(&db).unwrap();

        assert_eq!(store.load().await.unwrap(), None);
        store.store(12_345).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(12_345));
        store.store(12_400).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(12_400));
    }

    #[tokio::test]
    async fn memory_checkpoint_starts_empty() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(store.load().await.unwrap(), None);
        store.store(7).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(7));
    }
}

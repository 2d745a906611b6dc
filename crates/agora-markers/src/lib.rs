//! Agora Markers - Resolution idempotency store
//!
//! A processed marker records that a dispute case has had its resolution
//! dispatched. Markers are keyed on the case-insensitive normalization of
//! the case id ([`CaseId`] does this at construction), created once, and
//! never deleted: the set is append-only and survives process restarts.
//!
//! The contract for a scheduled resolver is check-then-act: consult
//! [`ProcessedMarkerStore::is_processed`] before dispatching any external
//! resolution action, skip if true, otherwise act and then mark. The
//! sequence is not atomic across overlapping invocations for the same case;
//! the resolver layers a single-flight lease on top (see agora-escalation).

use agora_types::{AgoraError, CaseId, Result};
use dashmap::DashSet;
use tracing::debug;

/// Durable, per-key-consistent marker set
#[async_trait::async_trait]
pub trait ProcessedMarkerStore: Send + Sync {
    /// Whether the case was already marked processed
    async fn is_processed(&self, case: &CaseId) -> Result<bool>;

    /// Mark the case processed. Repeated marks are safe no-ops.
    async fn mark_processed(&self, case: &CaseId) -> Result<()>;
}

/// Marker store backed by an embedded sled tree
pub struct SledMarkerStore {
    tree: sled::Tree,
}

impl SledMarkerStore {
    /// Open (or create) the marker tree inside the given database
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree("processed_cases").map_err(AgoraError::storage)?;
        Ok(Self { tree })
    }
}

#[async_trait::async_trait]
impl ProcessedMarkerStore for SledMarkerStore {
    async fn is_processed(&self, case: &CaseId) -> Result<bool> {
        self.tree
            .contains_key(case.as_str())
            .map_err(AgoraError::storage)
    }

    async fn mark_processed(&self, case: &CaseId) -> Result<()> {
        self.tree
            .insert(case.as_str(), vec![1u8])
            .map_err(AgoraError::storage)?;
        // Marker durability is what makes at-most-once hold across restarts.
        self.tree.flush_async().await.map_err(AgoraError::storage)?;
        debug!(case = %case, "case marked processed");
        Ok(())
    }
}

/// In-memory marker store for tests and simulations
#[derive(Default)]
pub struct MemoryMarkerStore {
    processed: DashSet<String>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProcessedMarkerStore for MemoryMarkerStore {
    async fn is_processed(&self, case: &CaseId) -> Result<bool> {
        Ok(self.processed.contains(case.as_str()))
    }

    async fn mark_processed(&self, case: &CaseId) -> Result<()> {
        self.processed.insert(case.as_str().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[tokio::test]
    async fn mark_then_check_round_trips() {
        let db = temp_db();
        let store = SledMarkerStore::open(&db).unwrap();
        let case = CaseId::new("case-42");

        assert!(!store.is_processed(&case).await.unwrap());
        store.mark_processed(&case).await.unwrap();
        assert!(store.is_processed(&case).await.unwrap());
    }

    #[tokio::test]
    async fn repeated_marks_are_no_ops() {
        let db = temp_db();
        let store = SledMarkerStore::open(&db).unwrap();
        let case = CaseId::new("case-42");

        store.mark_processed(&case).await.unwrap();
        store.mark_processed(&case).await.unwrap();
        store.mark_processed(&case).await.unwrap();
        assert!(store.is_processed(&case).await.unwrap());
    }

    #[tokio::test]
    async fn case_spellings_share_one_marker() {
        let store = MemoryMarkerStore::new();
        store.mark_processed(&CaseId::new("CASE-0xAB")).await.unwrap();
        assert!(store.is_processed(&CaseId::new("case-0xab")).await.unwrap());
        assert!(store.is_processed(&CaseId::new("Case-0xAb")).await.unwrap());
    }

    #[tokio::test]
    async fn markers_survive_reopen() {
        // Unique per invocation so a crashed earlier run can't leave state behind.
        let dir = std::env::temp_dir().join(format!("agora-markers-{}", uuid::Uuid::new_v4()));
        let case = CaseId::new("case-persist");
        {
            let db = sled::open(&dir).unwrap();
            let store = SledMarkerStore::open(&db).unwrap();
            store.mark_processed(&case).await.unwrap();
        }
        {
            let db = sled::open(&dir).unwrap();
            let store = SledMarkerStore::open(&db).unwrap();
            assert!(store.is_processed(&case).await.unwrap());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}

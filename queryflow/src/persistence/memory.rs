//! In-memory context store with per-key TTL.

use super::{storage_key, ContextStore, DEFAULT_TTL};
use crate::context::WorkflowContext;
use crate::errors::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredEntry {
    document: serde_json::Value,
    expires_at: Instant,
}

/// A process-local [`ContextStore`] backed by a concurrent map.
///
/// Expiry is lazy: an entry past its deadline is removed on the next read
/// of its key. Save/load pairs are consistent within the process, with no
/// caching layer in between.
#[derive(Debug)]
pub struct InMemoryContextStore {
    entries: DashMap<String, StoredEntry>,
    ttl: Duration,
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContextStore {
    /// Creates a store with the default one-hour TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates a store with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the number of live (possibly expired, not yet collected)
    /// entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrites the raw document stored for a workflow.
    ///
    /// Test hook for simulating a corrupted snapshot.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, workflow_id: Uuid, document: serde_json::Value) {
        self.entries.insert(
            storage_key(workflow_id),
            StoredEntry {
                document,
                expires_at: Instant::now() + DEFAULT_TTL,
            },
        );
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn save(&self, ctx: &WorkflowContext) -> Result<(), StorageError> {
        let key = storage_key(ctx.workflow_id);
        let expires_at = Instant::now() + self.ttl;

        self.entries.insert(
            key,
            StoredEntry {
                document: ctx.to_document(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn load(&self, workflow_id: Uuid) -> Result<Option<WorkflowContext>, StorageError> {
        let key = storage_key(workflow_id);

        // Clone out of the map before any removal; holding a read guard
        // across a remove on the same shard would deadlock.
        let snapshot = self
            .entries
            .get(&key)
            .map(|entry| (entry.document.clone(), entry.expires_at > Instant::now()));

        let document = match snapshot {
            Some((document, true)) => document,
            Some((_, false)) => {
                self.entries.remove(&key);
                return Ok(None);
            }
            None => return Ok(None),
        };

        match WorkflowContext::from_document(document) {
            Ok(ctx) => Ok(Some(ctx)),
            Err(err) => {
                tracing::warn!(
                    workflow_id = %workflow_id,
                    error = %err,
                    "persisted context snapshot failed to deserialize; reporting not-found"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SchemaDescriptor;
    use crate::core::WorkflowStatus;

    fn sample_context() -> WorkflowContext {
        let schema = SchemaDescriptor::new().with_table("users", ["id", "status"]);
        WorkflowContext::new("count all active users", schema)
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = InMemoryContextStore::new();
        let ctx = sample_context();

        store.save(&ctx).await.unwrap();
        let loaded = store.load(ctx.workflow_id).await.unwrap().unwrap();

        assert_eq!(ctx, loaded);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = InMemoryContextStore::new();
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_prior_snapshot() {
        let store = InMemoryContextStore::new();
        let mut ctx = sample_context();

        store.save(&ctx).await.unwrap();
        ctx.status = WorkflowStatus::Running;
        ctx.touch();
        store.save(&ctx).await.unwrap();

        let loaded = store.load(ctx.workflow_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Running);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_not_found() {
        let store = InMemoryContextStore::with_ttl(Duration::ZERO);
        let ctx = sample_context();

        store.save(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(store.load(ctx.workflow_id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_snapshot_reads_as_not_found() {
        let store = InMemoryContextStore::new();
        let ctx = sample_context();

        store.insert_raw(ctx.workflow_id, serde_json::json!({"garbage": true}));

        assert!(store.load(ctx.workflow_id).await.unwrap().is_none());
    }
}

// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::models::{Edge, EdgeKind, UserId};

/// Errors surfaced by the durable-store collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable; recoverable, callers should retry with backoff.
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
    /// Backend returned data the engine cannot interpret.
    #[error("durable store corrupted: {0}")]
    Corrupted(String),
}

/// Abstract durable-store collaborator. The edge store is a cache/index
/// layer over this interface; durability guarantees (fsync, replication)
/// belong to the implementation, not the engine.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn load_edge(
        &self,
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> Result<Option<Edge>, StorageError>;

    async fn save_edge(&self, edge: &Edge) -> Result<(), StorageError>;

    async fn delete_edge(
        &self,
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> Result<(), StorageError>;

    /// All edges touching `user`, in either direction. Feeds hydration and
    /// consistency repair of the in-memory adjacency projection.
    async fn scan_adjacency(&self, user: &str) -> Result<Vec<Edge>, StorageError>;
}

type EdgeKey = (UserId, UserId, EdgeKind);

/// In-process durable store used by tests and embedders without durability
/// needs. Supports fault injection so unavailability paths are testable.
#[derive(Default)]
pub struct MemoryStore {
    edges: RwLock<HashMap<EdgeKey, Edge>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            edges: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Fault injection: when unavailable, every call fails with
    /// [`StorageError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn edge_count(&self) -> usize {
        self.edges.read().len()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "memory store marked unavailable".to_string(),
            ))
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load_edge(
        &self,
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> Result<Option<Edge>, StorageError> {
        self.check_available()?;
        let key = (source.to_string(), target.to_string(), kind);
        Ok(self.edges.read().get(&key).cloned())
    }

    async fn save_edge(&self, edge: &Edge) -> Result<(), StorageError> {
        self.check_available()?;
        let key = (edge.source.clone(), edge.target.clone(), edge.kind);
        self.edges.write().insert(key, edge.clone());
        Ok(())
    }

    async fn delete_edge(
        &self,
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        let key = (source.to_string(), target.to_string(), kind);
        self.edges.write().remove(&key);
        Ok(())
    }

    async fn scan_adjacency(&self, user: &str) -> Result<Vec<Edge>, StorageError> {
        self.check_available()?;
        Ok(self
            .edges
            .read()
            .values()
            .filter(|e| e.source == user || e.target == user)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdgeState;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn round_trips_edges() {
        let store = MemoryStore::new();
        let edge = Edge::new("a".into(), "b".into(), EdgeKind::Follow, EdgeState::Active);
        assert_ok!(store.save_edge(&edge).await);

        let loaded = store.load_edge("a", "b", EdgeKind::Follow).await.unwrap();
        assert_eq!(loaded, Some(edge));

        store.delete_edge("a", "b", EdgeKind::Follow).await.unwrap();
        assert!(store
            .load_edge("a", "b", EdgeKind::Follow)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn scan_returns_both_directions() {
        let store = MemoryStore::new();
        store
            .save_edge(&Edge::new("a".into(), "b".into(), EdgeKind::Follow, EdgeState::Active))
            .await
            .unwrap();
        store
            .save_edge(&Edge::new("c".into(), "a".into(), EdgeKind::Mute, EdgeState::Active))
            .await
            .unwrap();
        store
            .save_edge(&Edge::new("b".into(), "c".into(), EdgeKind::Follow, EdgeState::Active))
            .await
            .unwrap();

        let edges = store.scan_adjacency("a").await.unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[tokio::test]
    async fn fault_injection_fails_calls() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.load_edge("a", "b", EdgeKind::Follow).await,
            Err(StorageError::Unavailable(_))
        ));
    }
}

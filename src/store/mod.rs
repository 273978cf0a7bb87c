// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

pub mod adjacency;
pub mod cursor;

use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{validate_pair, validate_user_id, GraphError, Result};
use crate::events::{EventBus, MutationEvent, MutationOp, MutationSink};
use crate::models::{
    Edge, EdgeKind, EdgeOutcome, EdgeState, FollowEntry, PerTargetOutcome, RejectReason, UserId,
};
use crate::storage::{DurableStore, StorageError};

use adjacency::{AdjEntry, SetKind, UserEdges};

/// Consistency mode for read paths that may hydrate a user's adjacency
/// projection from the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConsistency {
    /// Fail with `Unavailable` when the durable store cannot be reached for
    /// a user the index has not seen yet.
    Strict,
    /// Serve whatever the in-memory index already holds; an unseen user
    /// reads as empty.
    AllowStale,
}

/// The canonical edge store: a sharded in-memory index over the durable
/// collaborator, with per-unordered-pair mutation serialization.
///
/// Mutations for a `{A, B}` pair are serialized by one of `pair_lock_count`
/// async mutexes so the cross-kind invariant (a block suppressing follows)
/// and idempotency hold under concurrent duplicate requests. Mutations on
/// disjoint pairs proceed independently. Reads take a single shard read
/// lock and never wait on unrelated pairs.
pub struct EdgeStore {
    shards: Vec<RwLock<HashMap<UserId, UserEdges>>>,
    pair_locks: Vec<Mutex<()>>,
    durable: Arc<dyn DurableStore>,
    sinks: RwLock<Vec<Arc<dyn MutationSink>>>,
    bus: EventBus,
    max_bulk_targets: usize,
}

impl EdgeStore {
    pub fn new(config: &Config, durable: Arc<dyn DurableStore>) -> Self {
        let shard_count = config.store.shard_count.max(1);
        let pair_lock_count = config.store.pair_lock_count.max(1);
        info!(
            shard_count,
            pair_lock_count, "initializing edge store"
        );
        EdgeStore {
            shards: (0..shard_count)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
            pair_locks: (0..pair_lock_count).map(|_| Mutex::new(())).collect(),
            durable,
            sinks: RwLock::new(Vec::new()),
            bus: EventBus::new(config.store.event_channel_capacity),
            max_bulk_targets: config.store.max_bulk_targets,
        }
    }

    /// Register a synchronous mutation sink (analytics, activity feed).
    /// Sinks are invoked in commit order before each mutation call returns.
    pub fn add_sink(&self, sink: Arc<dyn MutationSink>) {
        self.sinks.write().push(sink);
    }

    /// Subscribe to the external mutation-event feed.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MutationEvent> {
        self.bus.subscribe()
    }

    // ---- mutations -----------------------------------------------------

    /// Create or refresh an edge. Idempotent: an existing edge yields
    /// `AlreadyExists`. Follow attempts across an active block yield
    /// `Rejected(Blocked)`; a follow of a private account creates a PENDING
    /// edge. Block creation atomically removes follow edges in both
    /// directions within the same pair-locked transaction.
    pub async fn upsert_edge(
        &self,
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> Result<EdgeOutcome> {
        validate_pair(source, target)?;
        let _pair = self.pair_locks[self.pair_index(source, target)].lock().await;
        self.ensure_hydrated(source, ReadConsistency::Strict).await?;
        self.ensure_hydrated(target, ReadConsistency::Strict).await?;

        // Decision phase under a read view of both users.
        let existing = self.read_user(source, |u| {
            u.and_then(|u| u.out_edge(target, kind).cloned())
        });
        if existing.is_some() {
            debug!(source, target, kind = kind.as_str(), "edge already exists");
            return Ok(EdgeOutcome::AlreadyExists);
        }

        match kind {
            EdgeKind::Follow => self.create_follow(source, target).await,
            EdgeKind::Block => self.create_block(source, target).await,
            EdgeKind::Mute => self.create_mute(source, target).await,
        }
    }

    async fn create_follow(&self, source: &str, target: &str) -> Result<EdgeOutcome> {
        if self.pair_blocked(source, target) {
            debug!(source, target, "follow rejected: pair is blocked");
            return Ok(EdgeOutcome::Rejected(RejectReason::Blocked));
        }

        let target_private = self.read_user(target, |u| u.map(|u| u.private).unwrap_or(false));
        let state = if target_private {
            EdgeState::Pending
        } else {
            EdgeState::Active
        };
        let edge = Edge::new(source.to_string(), target.to_string(), EdgeKind::Follow, state);
        self.durable.save_edge(&edge).await?;

        let reciprocal = self.read_user(target, |u| u.map(|u| u.follows(source)).unwrap_or(false));
        self.apply_pair(
            source,
            target,
            |u| u.apply_outgoing(&edge),
            |u| u.apply_incoming(&edge),
        );

        let op = match state {
            EdgeState::Active => MutationOp::Follow,
            EdgeState::Pending => MutationOp::FollowRequested,
        };
        self.commit_events(vec![
            MutationEvent::new(source, target, op, state).reciprocal(reciprocal)
        ]);
        debug!(source, target, state = ?state, "follow edge created");
        Ok(match state {
            EdgeState::Active => EdgeOutcome::Created,
            EdgeState::Pending => EdgeOutcome::Pending,
        })
    }

    async fn create_block(&self, source: &str, target: &str) -> Result<EdgeOutcome> {
        // Suppressed follows are deleted, not masked; unblock does not
        // restore them. Pending requests are cancelled the same way.
        let follow_out = self.read_user(source, |u| {
            u.and_then(|u| u.out_edge(target, EdgeKind::Follow).cloned())
        });
        let follow_in = self.read_user(target, |u| {
            u.and_then(|u| u.out_edge(source, EdgeKind::Follow).cloned())
        });

        // A failure partway through leaves the durable store with some
        // follows deleted and no block, while memory keeps the pre-block
        // view. Deletes are idempotent, so a caller retry converges; a
        // `rebuild_user` re-derives the projection from whatever committed.
        if follow_out.is_some() {
            self.durable.delete_edge(source, target, EdgeKind::Follow).await?;
        }
        if follow_in.is_some() {
            self.durable.delete_edge(target, source, EdgeKind::Follow).await?;
        }
        let block = Edge::new(
            source.to_string(),
            target.to_string(),
            EdgeKind::Block,
            EdgeState::Active,
        );
        self.durable.save_edge(&block).await?;

        let mut events = Vec::new();
        if let Some(removed) = &follow_out {
            // The opposite follow is still in place at this commit point.
            let reciprocal = follow_in.as_ref().map(|e| e.is_active()).unwrap_or(false)
                && removed.is_active();
            events.push(
                MutationEvent::new(source, target, MutationOp::Unfollow, removed.state)
                    .reciprocal(reciprocal)
                    .induced(),
            );
        }
        if let Some(removed) = &follow_in {
            events.push(
                MutationEvent::new(target, source, MutationOp::Unfollow, removed.state).induced(),
            );
        }
        events.push(MutationEvent::new(
            source,
            target,
            MutationOp::Block,
            EdgeState::Active,
        ));

        self.apply_pair(
            source,
            target,
            |u| {
                u.remove_outgoing(target, EdgeKind::Follow);
                if let Some(removed) = &follow_in {
                    u.remove_incoming(removed);
                }
                u.apply_outgoing(&block);
            },
            |u| {
                u.remove_outgoing(source, EdgeKind::Follow);
                if let Some(removed) = &follow_out {
                    u.remove_incoming(removed);
                }
                u.apply_incoming(&block);
            },
        );

        self.commit_events(events);
        info!(source, target, "block created, follow edges suppressed");
        Ok(EdgeOutcome::Created)
    }

    async fn create_mute(&self, source: &str, target: &str) -> Result<EdgeOutcome> {
        let edge = Edge::new(
            source.to_string(),
            target.to_string(),
            EdgeKind::Mute,
            EdgeState::Active,
        );
        self.durable.save_edge(&edge).await?;
        self.apply_pair(
            source,
            target,
            |u| u.apply_outgoing(&edge),
            |u| u.apply_incoming(&edge),
        );
        self.commit_events(vec![MutationEvent::new(
            source,
            target,
            MutationOp::Mute,
            EdgeState::Active,
        )]);
        Ok(EdgeOutcome::Created)
    }

    /// Remove an edge. Idempotent: removing a non-existent edge returns
    /// `NotFound` as a successful no-op so bulk callers can retry freely.
    pub async fn remove_edge(
        &self,
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> Result<EdgeOutcome> {
        validate_pair(source, target)?;
        let _pair = self.pair_locks[self.pair_index(source, target)].lock().await;
        self.ensure_hydrated(source, ReadConsistency::Strict).await?;
        self.ensure_hydrated(target, ReadConsistency::Strict).await?;

        let existing = self.read_user(source, |u| {
            u.and_then(|u| u.out_edge(target, kind).cloned())
        });
        let Some(removed) = existing else {
            return Ok(EdgeOutcome::NotFound);
        };

        self.durable.delete_edge(source, target, kind).await?;

        // Whether the pair stays half-connected after this removal.
        let reciprocal = kind == EdgeKind::Follow
            && removed.is_active()
            && self.read_user(target, |u| u.map(|u| u.follows(source)).unwrap_or(false));

        self.apply_pair(
            source,
            target,
            |u| {
                u.remove_outgoing(target, kind);
            },
            |u| u.remove_incoming(&removed),
        );

        let op = match kind {
            EdgeKind::Follow => MutationOp::Unfollow,
            EdgeKind::Block => MutationOp::Unblock,
            EdgeKind::Mute => MutationOp::Unmute,
        };
        self.commit_events(vec![
            MutationEvent::new(source, target, op, removed.state).reciprocal(reciprocal)
        ]);
        debug!(source, target, kind = kind.as_str(), "edge removed");
        Ok(EdgeOutcome::Removed)
    }

    /// Apply an upsert to each target independently. One outcome per
    /// target; a rejection on one target never aborts the rest. The pair
    /// lock is scoped per target, so unrelated mutations interleave with
    /// the batch. When `deadline` passes, the outcomes computed so far are
    /// returned (partial results, not an error).
    pub async fn bulk_upsert(
        &self,
        source: &str,
        targets: &[UserId],
        kind: EdgeKind,
        deadline: Option<Instant>,
    ) -> Result<Vec<PerTargetOutcome>> {
        self.validate_bulk(source, targets)?;
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                warn!(
                    source,
                    completed = results.len(),
                    total = targets.len(),
                    "bulk upsert hit deadline, returning partial results"
                );
                break;
            }
            let outcome = self.upsert_edge(source, target, kind).await?;
            results.push(PerTargetOutcome {
                target: target.clone(),
                outcome,
            });
        }
        Ok(results)
    }

    /// Bulk counterpart of [`EdgeStore::remove_edge`], with the same
    /// per-target isolation and deadline semantics as `bulk_upsert`.
    pub async fn bulk_remove(
        &self,
        source: &str,
        targets: &[UserId],
        kind: EdgeKind,
        deadline: Option<Instant>,
    ) -> Result<Vec<PerTargetOutcome>> {
        self.validate_bulk(source, targets)?;
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                warn!(
                    source,
                    completed = results.len(),
                    total = targets.len(),
                    "bulk remove hit deadline, returning partial results"
                );
                break;
            }
            let outcome = self.remove_edge(source, target, kind).await?;
            results.push(PerTargetOutcome {
                target: target.clone(),
                outcome,
            });
        }
        Ok(results)
    }

    fn validate_bulk(&self, source: &str, targets: &[UserId]) -> Result<()> {
        if targets.len() > self.max_bulk_targets {
            return Err(GraphError::ResourceExhausted(format!(
                "bulk batch of {} targets exceeds limit of {}",
                targets.len(),
                self.max_bulk_targets
            )));
        }
        for target in targets {
            validate_pair(source, target)?;
        }
        Ok(())
    }

    /// Approve a pending follow request from `source` on `target`'s
    /// account. The edge transitions PENDING -> ACTIVE and is
    /// re-timestamped, so it sorts as the newest follower.
    pub async fn approve_follow(&self, target: &str, source: &str) -> Result<EdgeOutcome> {
        validate_pair(source, target)?;
        let _pair = self.pair_locks[self.pair_index(source, target)].lock().await;
        self.ensure_hydrated(source, ReadConsistency::Strict).await?;
        self.ensure_hydrated(target, ReadConsistency::Strict).await?;

        let existing = self.read_user(source, |u| {
            u.and_then(|u| u.out_edge(target, EdgeKind::Follow).cloned())
        });
        let pending = match existing {
            None => {
                return Err(GraphError::NotFound(format!(
                    "no follow request from {} to {}",
                    source, target
                )))
            }
            Some(edge) if edge.is_active() => return Ok(EdgeOutcome::AlreadyExists),
            Some(edge) => edge,
        };
        if self.pair_blocked(source, target) {
            // Blocks cancel pending requests at creation; finding one here
            // means the projection diverged from the canonical edges.
            // Re-derive both projections before surfacing the error, so a
            // retry sees repaired state.
            error!(source, target, "pending follow coexists with block, repairing projections");
            self.rebuild_user(source).await?;
            self.rebuild_user(target).await?;
            return Err(GraphError::Internal(format!(
                "pending follow between blocked pair {} and {}",
                source, target
            )));
        }

        let mut approved = pending.clone();
        approved.state = EdgeState::Active;
        // Re-timestamp so the approved follow sorts as the newest entry.
        let now = crate::models::edge::edge_timestamp();
        approved.created_at = now;
        approved.updated_at = now;
        self.durable.save_edge(&approved).await?;

        let reciprocal = self.read_user(target, |u| u.map(|u| u.follows(source)).unwrap_or(false));
        self.apply_pair(
            source,
            target,
            |u| {
                u.remove_outgoing(target, EdgeKind::Follow);
                u.apply_outgoing(&approved);
            },
            |u| u.apply_incoming(&approved),
        );
        self.commit_events(vec![MutationEvent::new(
            source,
            target,
            MutationOp::FollowApproved,
            EdgeState::Active,
        )
        .reciprocal(reciprocal)]);
        info!(source, target, "follow request approved");
        Ok(EdgeOutcome::Created)
    }

    /// Reject (delete) a pending follow request from `source`.
    pub async fn reject_follow(&self, target: &str, source: &str) -> Result<EdgeOutcome> {
        validate_pair(source, target)?;
        let _pair = self.pair_locks[self.pair_index(source, target)].lock().await;
        self.ensure_hydrated(source, ReadConsistency::Strict).await?;
        self.ensure_hydrated(target, ReadConsistency::Strict).await?;

        let existing = self.read_user(source, |u| {
            u.and_then(|u| u.out_edge(target, EdgeKind::Follow).cloned())
        });
        match existing {
            None => Err(GraphError::NotFound(format!(
                "no follow request from {} to {}",
                source, target
            ))),
            Some(edge) if edge.is_active() => Err(GraphError::Conflict(format!(
                "follow from {} to {} is already active",
                source, target
            ))),
            Some(_) => {
                self.durable.delete_edge(source, target, EdgeKind::Follow).await?;
                self.apply_pair(
                    source,
                    target,
                    |u| {
                        u.remove_outgoing(target, EdgeKind::Follow);
                    },
                    |_| {},
                );
                self.commit_events(vec![MutationEvent::new(
                    source,
                    target,
                    MutationOp::Unfollow,
                    EdgeState::Pending,
                )]);
                Ok(EdgeOutcome::Removed)
            }
        }
    }

    /// Set the account-privacy bit driving the pending-follow flow. The bit
    /// is engine-owned policy state, not an edge, so no event is emitted.
    pub async fn set_private(&self, user: &str, private: bool) -> Result<()> {
        validate_user_id(user)?;
        self.ensure_hydrated(user, ReadConsistency::Strict).await?;
        let mut shard = self.shards[self.shard_index(user)].write();
        shard.entry(user.to_string()).or_default().private = private;
        Ok(())
    }

    /// Consistency repair: drop the in-memory projection for `user` and
    /// re-derive it from the canonical edges in the durable store. Writers
    /// for the affected user should be quiesced while this runs.
    pub async fn rebuild_user(&self, user: &str) -> Result<()> {
        validate_user_id(user)?;
        let edges = self.durable.scan_adjacency(user).await?;
        let mut shard = self.shards[self.shard_index(user)].write();
        let private = shard.get(user).map(|u| u.private).unwrap_or(false);
        shard.insert(user.to_string(), UserEdges::rebuild(user, private, &edges));
        info!(user, edges = edges.len(), "rebuilt adjacency projection");
        Ok(())
    }

    // ---- reads ---------------------------------------------------------

    /// Point lookup, O(1) once the source's projection is hydrated.
    pub async fn get_edge(
        &self,
        source: &str,
        target: &str,
        kind: EdgeKind,
        consistency: ReadConsistency,
    ) -> Result<Option<Edge>> {
        self.ensure_hydrated(source, consistency).await?;
        Ok(self.read_user(source, |u| u.and_then(|u| u.out_edge(target, kind).cloned())))
    }

    /// Whether `source` actively follows `target`.
    pub async fn follows_active(
        &self,
        source: &str,
        target: &str,
        consistency: ReadConsistency,
    ) -> Result<bool> {
        self.ensure_hydrated(source, consistency).await?;
        Ok(self.read_user(source, |u| u.map(|u| u.follows(target)).unwrap_or(false)))
    }

    /// Whether an ACTIVE block exists between the pair in either direction.
    /// Callers must have hydrated both users.
    pub fn pair_blocked(&self, a: &str, b: &str) -> bool {
        let a_blocks = self.read_user(a, |u| {
            u.and_then(|u| u.out_edge(b, EdgeKind::Block).map(|e| e.is_active()))
                .unwrap_or(false)
        });
        if a_blocks {
            return true;
        }
        self.read_user(b, |u| {
            u.and_then(|u| u.out_edge(a, EdgeKind::Block).map(|e| e.is_active()))
                .unwrap_or(false)
        })
    }

    /// Page through one of a user's adjacency sets, newest-first. Returns
    /// the entries and whether more remain after them.
    pub async fn page_set(
        &self,
        user: &str,
        kind: SetKind,
        after: Option<AdjEntry>,
        limit: usize,
        consistency: ReadConsistency,
    ) -> Result<(Vec<FollowEntry>, bool)> {
        self.ensure_hydrated(user, consistency).await?;
        Ok(self.read_user(user, |u| match u {
            Some(u) => u.page(kind, after.as_ref(), limit),
            None => (Vec::new(), false),
        }))
    }

    /// Size of one of a user's adjacency sets.
    pub async fn set_len(
        &self,
        user: &str,
        kind: SetKind,
        consistency: ReadConsistency,
    ) -> Result<usize> {
        self.ensure_hydrated(user, consistency).await?;
        Ok(self.read_user(user, |u| u.map(|u| u.set(kind).len()).unwrap_or(0)))
    }

    /// Newest-first snapshot of a user's following set, capped for bounded
    /// traversal cost on high-degree nodes.
    pub async fn following_snapshot(
        &self,
        user: &str,
        cap: usize,
        consistency: ReadConsistency,
    ) -> Result<Vec<FollowEntry>> {
        let (entries, _) = self
            .page_set(user, SetKind::Following, None, cap, consistency)
            .await?;
        Ok(entries)
    }

    // ---- internals -----------------------------------------------------

    fn shard_index(&self, user: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        user.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    fn pair_index(&self, a: &str, b: &str) -> usize {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = DefaultHasher::new();
        lo.hash(&mut hasher);
        hi.hash(&mut hasher);
        (hasher.finish() as usize) % self.pair_locks.len()
    }

    fn read_user<R>(&self, user: &str, f: impl FnOnce(Option<&UserEdges>) -> R) -> R {
        let shard = self.shards[self.shard_index(user)].read();
        f(shard.get(user))
    }

    /// Apply a mutation to both users' projections while holding their
    /// shard write locks together (ordered by shard index), so readers see
    /// the edge either fully applied or not at all.
    fn apply_pair(
        &self,
        source: &str,
        target: &str,
        apply_source: impl FnOnce(&mut UserEdges),
        apply_target: impl FnOnce(&mut UserEdges),
    ) {
        let si = self.shard_index(source);
        let ti = self.shard_index(target);
        if si == ti {
            let mut shard = self.shards[si].write();
            apply_source(shard.entry(source.to_string()).or_default());
            apply_target(shard.entry(target.to_string()).or_default());
        } else {
            let (first, second) = if si < ti { (si, ti) } else { (ti, si) };
            let mut first_guard = self.shards[first].write();
            let mut second_guard = self.shards[second].write();
            let (source_shard, target_shard) = if si < ti {
                (&mut *first_guard, &mut *second_guard)
            } else {
                (&mut *second_guard, &mut *first_guard)
            };
            apply_source(source_shard.entry(source.to_string()).or_default());
            apply_target(target_shard.entry(target.to_string()).or_default());
        }
    }

    async fn ensure_hydrated(&self, user: &str, consistency: ReadConsistency) -> Result<()> {
        validate_user_id(user)?;
        if self.read_user(user, |u| u.is_some()) {
            return Ok(());
        }
        match self.durable.scan_adjacency(user).await {
            Ok(edges) => {
                let mut shard = self.shards[self.shard_index(user)].write();
                // Another task may have hydrated while we scanned.
                shard
                    .entry(user.to_string())
                    .or_insert_with(|| UserEdges::rebuild(user, false, &edges));
                Ok(())
            }
            Err(StorageError::Unavailable(msg)) if consistency == ReadConsistency::AllowStale => {
                warn!(user, %msg, "durable store unavailable, serving stale view");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn commit_events(&self, events: Vec<MutationEvent>) {
        let sinks = self.sinks.read();
        for event in &events {
            for sink in sinks.iter() {
                sink.on_event(event);
            }
            self.bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (EdgeStore, Arc<MemoryStore>) {
        let durable = Arc::new(MemoryStore::new());
        let store = EdgeStore::new(&Config::default(), durable.clone());
        (store, durable)
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let (store, _) = store();
        assert_eq!(
            store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap(),
            EdgeOutcome::Created
        );
        assert_eq!(
            store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap(),
            EdgeOutcome::AlreadyExists
        );
        assert_eq!(
            store
                .set_len("b", SetKind::Followers, ReadConsistency::Strict)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn self_follow_is_invalid() {
        let (store, _) = store();
        assert!(matches!(
            store.upsert_edge("a", "a", EdgeKind::Follow).await,
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn block_suppresses_follows_both_directions() {
        let (store, durable) = store();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
        store.upsert_edge("b", "a", EdgeKind::Follow).await.unwrap();

        assert_eq!(
            store.upsert_edge("a", "b", EdgeKind::Block).await.unwrap(),
            EdgeOutcome::Created
        );
        assert!(!store
            .follows_active("a", "b", ReadConsistency::Strict)
            .await
            .unwrap());
        assert!(!store
            .follows_active("b", "a", ReadConsistency::Strict)
            .await
            .unwrap());
        // Canonical store holds only the block edge now.
        assert_eq!(durable.edge_count(), 1);

        // Follow attempts in either direction are rejected while blocked.
        assert_eq!(
            store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap(),
            EdgeOutcome::Rejected(RejectReason::Blocked)
        );
        assert_eq!(
            store.upsert_edge("b", "a", EdgeKind::Follow).await.unwrap(),
            EdgeOutcome::Rejected(RejectReason::Blocked)
        );
        assert!(logs_contain("block created"));
    }

    #[tokio::test]
    async fn unblock_allows_follow_again_without_restoring() {
        let (store, _) = store();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
        store.upsert_edge("b", "a", EdgeKind::Block).await.unwrap();
        assert_eq!(
            store.remove_edge("b", "a", EdgeKind::Block).await.unwrap(),
            EdgeOutcome::Removed
        );
        // The suppressed follow is gone for good.
        assert!(!store
            .follows_active("a", "b", ReadConsistency::Strict)
            .await
            .unwrap());
        assert_eq!(
            store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap(),
            EdgeOutcome::Created
        );
    }

    #[tokio::test]
    async fn remove_missing_edge_is_not_found_outcome() {
        let (store, _) = store();
        assert_eq!(
            store.remove_edge("a", "b", EdgeKind::Follow).await.unwrap(),
            EdgeOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn private_account_creates_pending_follow() {
        let (store, _) = store();
        store.set_private("b", true).await.unwrap();
        assert_eq!(
            store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap(),
            EdgeOutcome::Pending
        );
        // Pending follows are invisible to adjacency sets.
        assert_eq!(
            store
                .set_len("b", SetKind::Followers, ReadConsistency::Strict)
                .await
                .unwrap(),
            0
        );

        assert_eq!(
            store.approve_follow("b", "a").await.unwrap(),
            EdgeOutcome::Created
        );
        assert_eq!(
            store
                .set_len("b", SetKind::Followers, ReadConsistency::Strict)
                .await
                .unwrap(),
            1
        );
        assert!(store
            .follows_active("a", "b", ReadConsistency::Strict)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reject_follow_deletes_request() {
        let (store, _) = store();
        store.set_private("b", true).await.unwrap();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
        assert_eq!(
            store.reject_follow("b", "a").await.unwrap(),
            EdgeOutcome::Removed
        );
        assert!(matches!(
            store.reject_follow("b", "a").await,
            Err(GraphError::NotFound(_))
        ));
        assert!(!store
            .follows_active("a", "b", ReadConsistency::Strict)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn divergent_projection_is_repaired_on_approve() {
        let (store, durable) = store();
        store.set_private("b", true).await.unwrap();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();

        // Mutate the canonical edges behind the index: the request vanishes
        // and a block appears, but only "b"'s projection learns of it.
        durable.delete_edge("a", "b", EdgeKind::Follow).await.unwrap();
        durable
            .save_edge(&Edge::new(
                "b".to_string(),
                "a".to_string(),
                EdgeKind::Block,
                EdgeState::Active,
            ))
            .await
            .unwrap();
        store.rebuild_user("b").await.unwrap();

        assert!(matches!(
            store.approve_follow("b", "a").await,
            Err(GraphError::Internal(_))
        ));
        // The failed approval re-derived both projections; the stale
        // pending follow is gone.
        assert!(matches!(
            store.approve_follow("b", "a").await,
            Err(GraphError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn block_cancels_pending_request() {
        let (store, _) = store();
        store.set_private("b", true).await.unwrap();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
        store.upsert_edge("b", "a", EdgeKind::Block).await.unwrap();
        assert!(matches!(
            store.approve_follow("b", "a").await,
            Err(GraphError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn bulk_partial_failure_keeps_going() {
        let (store, _) = store();
        store.upsert_edge("c", "a", EdgeKind::Block).await.unwrap();

        let results = store
            .bulk_upsert(
                "a",
                &["b".to_string(), "c".to_string(), "d".to_string()],
                EdgeKind::Follow,
                None,
            )
            .await
            .unwrap();
        let outcomes: Vec<_> = results.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                EdgeOutcome::Created,
                EdgeOutcome::Rejected(RejectReason::Blocked),
                EdgeOutcome::Created
            ]
        );
    }

    #[tokio::test]
    async fn bulk_over_limit_is_resource_exhausted() {
        let (store, _) = store();
        let targets: Vec<UserId> = (0..101).map(|i| format!("u{}", i)).collect();
        assert!(matches!(
            store.bulk_upsert("a", &targets, EdgeKind::Follow, None).await,
            Err(GraphError::ResourceExhausted(_))
        ));
    }

    #[tokio::test]
    async fn bulk_deadline_returns_partial_results() {
        let (store, _) = store();
        let targets: Vec<UserId> = (0..10).map(|i| format!("u{}", i)).collect();
        let results = store
            .bulk_upsert("a", &targets, EdgeKind::Follow, Some(Instant::now()))
            .await
            .unwrap();
        assert!(results.len() < targets.len());
    }

    #[tokio::test]
    async fn unavailable_store_fails_strict_reads_and_mutations() {
        let (store, durable) = store();
        durable.set_available(false);
        assert!(matches!(
            store.upsert_edge("a", "b", EdgeKind::Follow).await,
            Err(GraphError::Unavailable(_))
        ));
        assert!(matches!(
            store
                .page_set("a", SetKind::Followers, None, 10, ReadConsistency::Strict)
                .await,
            Err(GraphError::Unavailable(_))
        ));
        // Stale mode serves the (empty) last known view instead.
        let (entries, more) = store
            .page_set("a", SetKind::Followers, None, 10, ReadConsistency::AllowStale)
            .await
            .unwrap();
        assert!(entries.is_empty());
        assert!(!more);
    }

    #[tokio::test]
    async fn stale_reads_serve_hydrated_view_during_outage() {
        let (store, durable) = store();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
        durable.set_available(false);
        // "b" was hydrated by the mutation; its followers list still serves.
        let (entries, _) = store
            .page_set("b", SetKind::Followers, None, 10, ReadConsistency::AllowStale)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, "a");
    }

    #[tokio::test]
    async fn rebuild_user_rederives_projection() {
        let (store, durable) = store();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
        store.upsert_edge("c", "b", EdgeKind::Follow).await.unwrap();

        store.rebuild_user("b").await.unwrap();
        assert_eq!(
            store
                .set_len("b", SetKind::Followers, ReadConsistency::Strict)
                .await
                .unwrap(),
            2
        );
        assert_eq!(durable.edge_count(), 2);
    }

    #[tokio::test]
    async fn hydrates_existing_edges_from_durable_store() {
        let durable = Arc::new(MemoryStore::new());
        {
            let seed = EdgeStore::new(&Config::default(), durable.clone());
            seed.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
            seed.upsert_edge("a", "c", EdgeKind::Mute).await.unwrap();
        }
        // Fresh index over the same durable store.
        let store = EdgeStore::new(&Config::default(), durable);
        assert!(store
            .follows_active("a", "b", ReadConsistency::Strict)
            .await
            .unwrap());
        assert_eq!(
            store
                .set_len("a", SetKind::Muted, ReadConsistency::Strict)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn events_arrive_in_commit_order() {
        let (store, _) = store();
        let mut rx = store.subscribe();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();
        store.upsert_edge("b", "a", EdgeKind::Block).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().op, MutationOp::Follow);
        let induced = rx.recv().await.unwrap();
        assert_eq!(induced.op, MutationOp::Unfollow);
        assert!(induced.induced);
        assert_eq!(rx.recv().await.unwrap().op, MutationOp::Block);
    }
}

// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use crate::models::{Edge, EdgeKind, FollowEntry, UserId};

/// One entry of a per-user ordered adjacency set. Ordering is newest-first
/// by creation time, ties broken by ascending counterpart id, which is the
/// ordering the pagination cursor relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjEntry {
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
}

impl AdjEntry {
    pub fn new(user_id: &str, created_at: DateTime<Utc>) -> Self {
        AdjEntry {
            created_at,
            user_id: user_id.to_string(),
        }
    }

    pub fn into_follow_entry(self) -> FollowEntry {
        FollowEntry {
            user_id: self.user_id,
            followed_at: self.created_at,
        }
    }
}

impl Ord for AdjEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Newest first, then ascending id for a total order.
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| self.user_id.cmp(&other.user_id))
    }
}

impl PartialOrd for AdjEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Which per-user adjacency set a list query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    Followers,
    Following,
    Blocked,
    Muted,
}

/// Derived per-user projection of the edge store: ordered adjacency sets
/// plus an O(1) point-lookup index of outgoing edges. Rebuildable from the
/// durable store at any time; maintained transactionally with it.
#[derive(Debug, Default)]
pub struct UserEdges {
    /// Engine-owned privacy bit: follows of a private account start PENDING.
    pub private: bool,
    pub following: BTreeSet<AdjEntry>,
    pub followers: BTreeSet<AdjEntry>,
    pub blocked: BTreeSet<AdjEntry>,
    pub muted: BTreeSet<AdjEntry>,
    /// Canonical outgoing edges keyed by `(target, kind)`, pending included.
    pub out_edges: HashMap<(UserId, EdgeKind), Edge>,
}

impl UserEdges {
    pub fn set(&self, kind: SetKind) -> &BTreeSet<AdjEntry> {
        match kind {
            SetKind::Followers => &self.followers,
            SetKind::Following => &self.following,
            SetKind::Blocked => &self.blocked,
            SetKind::Muted => &self.muted,
        }
    }

    pub fn set_mut(&mut self, kind: SetKind) -> &mut BTreeSet<AdjEntry> {
        match kind {
            SetKind::Followers => &mut self.followers,
            SetKind::Following => &mut self.following,
            SetKind::Blocked => &mut self.blocked,
            SetKind::Muted => &mut self.muted,
        }
    }

    pub fn out_edge(&self, target: &str, kind: EdgeKind) -> Option<&Edge> {
        self.out_edges.get(&(target.to_string(), kind))
    }

    /// Whether this user actively follows `target` (pending excluded).
    pub fn follows(&self, target: &str) -> bool {
        self.out_edge(target, EdgeKind::Follow)
            .map(|e| e.is_active())
            .unwrap_or(false)
    }

    /// Record an edge where this user is the source.
    pub fn apply_outgoing(&mut self, edge: &Edge) {
        if edge.is_active() {
            let entry = AdjEntry::new(&edge.target, edge.created_at);
            match edge.kind {
                EdgeKind::Follow => self.following.insert(entry),
                EdgeKind::Block => self.blocked.insert(entry),
                EdgeKind::Mute => self.muted.insert(entry),
            };
        }
        self.out_edges
            .insert((edge.target.clone(), edge.kind), edge.clone());
    }

    /// Record an edge where this user is the target. Only active follows
    /// contribute to the followers set; blocks and mutes by others are
    /// looked up through the source side.
    pub fn apply_incoming(&mut self, edge: &Edge) {
        if edge.kind == EdgeKind::Follow && edge.is_active() {
            self.followers
                .insert(AdjEntry::new(&edge.source, edge.created_at));
        }
    }

    /// Drop an edge where this user is the source. Returns the removed edge.
    pub fn remove_outgoing(&mut self, target: &str, kind: EdgeKind) -> Option<Edge> {
        let removed = self.out_edges.remove(&(target.to_string(), kind))?;
        if removed.is_active() {
            let entry = AdjEntry::new(target, removed.created_at);
            match kind {
                EdgeKind::Follow => self.following.remove(&entry),
                EdgeKind::Block => self.blocked.remove(&entry),
                EdgeKind::Mute => self.muted.remove(&entry),
            };
        }
        Some(removed)
    }

    /// Drop the incoming projection of an edge.
    pub fn remove_incoming(&mut self, edge: &Edge) {
        if edge.kind == EdgeKind::Follow && edge.is_active() {
            self.followers
                .remove(&AdjEntry::new(&edge.source, edge.created_at));
        }
    }

    /// Page through an adjacency set, newest-first, resuming strictly after
    /// `after`. Returns up to `limit` entries plus whether more remain.
    pub fn page(
        &self,
        kind: SetKind,
        after: Option<&AdjEntry>,
        limit: usize,
    ) -> (Vec<FollowEntry>, bool) {
        let set = self.set(kind);
        let iter: Box<dyn Iterator<Item = &AdjEntry>> = match after {
            Some(pos) => Box::new(
                set.range::<AdjEntry, _>((Bound::Excluded(pos.clone()), Bound::Unbounded)),
            ),
            None => Box::new(set.iter()),
        };

        let mut entries = Vec::with_capacity(limit.min(64));
        let mut more = false;
        for entry in iter {
            if entries.len() == limit {
                more = true;
                break;
            }
            entries.push(entry.clone().into_follow_entry());
        }
        (entries, more)
    }

    /// Rebuild the projection from a durable-store adjacency scan.
    pub fn rebuild(user: &str, private: bool, edges: &[Edge]) -> Self {
        let mut rebuilt = UserEdges {
            private,
            ..UserEdges::default()
        };
        for edge in edges {
            if edge.source == user {
                rebuilt.apply_outgoing(edge);
            }
            if edge.target == user {
                rebuilt.apply_incoming(edge);
            }
        }
        rebuilt
    }
}

// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Kind of a directed relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Follow,
    Block,
    Mute,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Follow => "follow",
            EdgeKind::Block => "block",
            EdgeKind::Mute => "mute",
        }
    }
}

/// State of an edge. Only FOLLOW edges can be pending (private-account
/// approval flow); BLOCK and MUTE are active from creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    Pending,
    Active,
}

/// A directed relationship edge. `(source, target, kind)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: UserId,
    pub target: UserId,
    pub kind: EdgeKind,
    pub state: EdgeState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current time truncated to microseconds, the resolution pagination
/// cursors round-trip. Sub-microsecond precision would make a decoded
/// cursor position compare unequal to the entry it was taken from.
pub fn edge_timestamp() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

impl Edge {
    pub fn new(source: UserId, target: UserId, kind: EdgeKind, state: EdgeState) -> Self {
        let now = edge_timestamp();
        Edge {
            source,
            target,
            kind,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == EdgeState::Active
    }
}

/// Why a mutation was rejected without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// An active block exists between the pair, in either direction.
    Blocked,
}

/// Outcome of a mutation call. Duplicate follows and removals of missing
/// edges are successful no-op outcomes, never errors, so that clients can
/// retry safely and bulk callers can treat them as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum EdgeOutcome {
    /// Edge created in ACTIVE state.
    Created,
    /// Follow request created in PENDING state (target account is private).
    Pending,
    /// The edge already existed; nothing changed.
    AlreadyExists,
    /// Edge removed.
    Removed,
    /// No such edge; removal was a no-op.
    NotFound,
    /// Mutation refused by relationship policy.
    Rejected(RejectReason),
}

impl EdgeOutcome {
    /// Whether the mutation changed graph state.
    pub fn mutated(&self) -> bool {
        matches!(
            self,
            EdgeOutcome::Created | EdgeOutcome::Pending | EdgeOutcome::Removed
        )
    }
}

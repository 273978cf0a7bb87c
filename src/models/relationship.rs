// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EdgeOutcome, UserId};

/// Composite relationship view between two users, from `a`'s perspective.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipStatus {
    pub a_follows_b: bool,
    pub b_follows_a: bool,
    pub a_blocked_b: bool,
    pub b_blocked_a: bool,
    pub a_muted_b: bool,
    /// `a` has a follow request pending on `b`.
    pub pending_outgoing: bool,
    /// `b` has a follow request pending on `a`.
    pub pending_incoming: bool,
}

impl RelationshipStatus {
    pub fn is_mutual(&self) -> bool {
        self.a_follows_b && self.b_follows_a
    }

    pub fn any_block(&self) -> bool {
        self.a_blocked_b || self.b_blocked_a
    }
}

/// One entry of a followers/following/blocked/muted list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEntry {
    pub user_id: UserId,
    pub followed_at: DateTime<Utc>,
}

/// One page of a cursor-paginated list, ordered newest-first. The cursor is
/// opaque; callers pass it back unmodified to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub entries: Vec<FollowEntry>,
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn empty() -> Self {
        Page {
            entries: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Per-target result of a bulk mutation. A failure on one target never
/// aborts the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTargetOutcome {
    pub target: UserId,
    pub outcome: EdgeOutcome,
}

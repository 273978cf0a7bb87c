// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// O(1) social metrics read from maintained counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    pub user_id: UserId,
    pub follower_count: u64,
    pub following_count: u64,
    pub mutual_count: u64,
    /// mutual_count / follower_count, 0.0 when there are no followers.
    pub mutual_ratio: f64,
    pub pending_incoming_count: u64,
}

/// Net follower change for one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthBucket {
    pub day: NaiveDate,
    pub gained: u64,
    pub lost: u64,
}

impl GrowthBucket {
    pub fn net(&self) -> i64 {
        self.gained as i64 - self.lost as i64
    }
}

/// Time-bucketed follower growth over a trailing day window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthSeries {
    pub user_id: UserId,
    pub days: u32,
    /// One bucket per day, oldest first, zero-filled for days with no
    /// activity.
    pub buckets: Vec<GrowthBucket>,
    pub total_gained: u64,
    pub total_lost: u64,
    pub net_change: i64,
}

/// A recent incoming-follow event from a user's activity ring buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

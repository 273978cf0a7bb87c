// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

use crate::config::ActivityConfig;
use crate::error::{validate_user_id, Result};
use crate::events::{MutationEvent, MutationOp, MutationSink};
use crate::models::{ActivityEvent, EdgeState, UserId};

#[derive(Debug, Default)]
struct UserActivity {
    /// Bounded ring of recent incoming follows, oldest at the front.
    recent: VecDeque<ActivityEvent>,
    live_followers: u64,
}

/// Live-feed sink: per-user ring buffer of recent incoming-follow events
/// plus a live follower counter, both maintained on the mutation feed.
/// Reads are lock-and-copy with no graph traversal.
///
/// Block visibility is a read-time concern of the caller; the buffer keeps
/// its events so an unblock does not lose history.
pub struct ActivityFeed {
    ring_capacity: usize,
    state: RwLock<HashMap<UserId, UserActivity>>,
}

impl ActivityFeed {
    pub fn new(config: &ActivityConfig) -> Self {
        ActivityFeed {
            ring_capacity: config.ring_capacity.max(1),
            state: RwLock::new(HashMap::new()),
        }
    }

    /// O(1) live follower count, independent of the analytics aggregator.
    pub fn get_live_follower_count(&self, user: &str) -> Result<u64> {
        validate_user_id(user)?;
        Ok(self
            .state
            .read()
            .get(user)
            .map(|a| a.live_followers)
            .unwrap_or(0))
    }

    /// Up to `limit` most recent incoming follows, newest first.
    pub fn recent_activity(&self, user: &str, limit: usize) -> Result<Vec<ActivityEvent>> {
        validate_user_id(user)?;
        let state = self.state.read();
        Ok(state
            .get(user)
            .map(|a| a.recent.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn record_follow(&self, event: &MutationEvent) {
        let mut state = self.state.write();
        let activity = state.entry(event.target.clone()).or_default();
        if activity.recent.len() == self.ring_capacity {
            activity.recent.pop_front();
        }
        activity.recent.push_back(ActivityEvent {
            actor_id: event.source.clone(),
            occurred_at: event.timestamp,
        });
        activity.live_followers += 1;
    }
}

impl MutationSink for ActivityFeed {
    fn on_event(&self, event: &MutationEvent) {
        match event.op {
            MutationOp::Follow | MutationOp::FollowApproved => self.record_follow(event),
            MutationOp::Unfollow if event.state == EdgeState::Active => {
                let mut state = self.state.write();
                let activity = state.entry(event.target.clone()).or_default();
                activity.live_followers = activity.live_followers.saturating_sub(1);
            }
            _ => {}
        }
    }
}

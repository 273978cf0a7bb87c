// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::config::ActivityConfig;
use crate::error::{validate_user_id, Result};
use crate::events::{MutationEvent, MutationOp, MutationSink};
use crate::models::{EdgeState, GrowthBucket, GrowthSeries, RankedUser, SocialMetrics, UserId};

#[derive(Debug, Default)]
struct UserStats {
    follower_count: u64,
    following_count: u64,
    mutual_count: u64,
    pending_incoming: u64,
    /// Per-UTC-day (gained, lost) follower deltas.
    growth: BTreeMap<NaiveDate, (u64, u64)>,
}

/// Event-sourced counter maintenance: consumes the mutation feed and keeps
/// per-user social counters and daily growth buckets. All reads are O(1)
/// (or O(days) for growth series) with no graph traversal.
///
/// Counters are updated exactly once per committed mutation; block-induced
/// unfollows arrive through the same feed, so the counters cannot diverge
/// from the adjacency index.
pub struct AnalyticsAggregator {
    max_days: u32,
    state: RwLock<HashMap<UserId, UserStats>>,
}

impl AnalyticsAggregator {
    pub fn new(config: &ActivityConfig) -> Self {
        AnalyticsAggregator {
            max_days: config.max_analytics_days.max(1),
            state: RwLock::new(HashMap::new()),
        }
    }

    /// O(1) metrics snapshot from the maintained counters. A user the feed
    /// has never mentioned reads as all zeroes.
    pub fn get_social_metrics(&self, user: &str) -> Result<SocialMetrics> {
        validate_user_id(user)?;
        let state = self.state.read();
        let stats = state.get(user);
        let follower_count = stats.map(|s| s.follower_count).unwrap_or(0);
        let mutual_count = stats.map(|s| s.mutual_count).unwrap_or(0);
        Ok(SocialMetrics {
            user_id: user.to_string(),
            follower_count,
            following_count: stats.map(|s| s.following_count).unwrap_or(0),
            mutual_count,
            mutual_ratio: if follower_count == 0 {
                0.0
            } else {
                mutual_count as f64 / follower_count as f64
            },
            pending_incoming_count: stats.map(|s| s.pending_incoming).unwrap_or(0),
        })
    }

    /// Follower growth over the trailing `days`-day window ending today
    /// (UTC), one bucket per day, oldest first, zero-filled. `days` is
    /// clamped to `1..=max_analytics_days`. Access policy for `requester`
    /// stays with the caller.
    pub fn get_growth_metrics(&self, user: &str, requester: &str, days: u32) -> Result<GrowthSeries> {
        validate_user_id(user)?;
        validate_user_id(requester)?;
        let days = days.clamp(1, self.max_days);
        let today = Utc::now().date_naive();
        let start = today - chrono::Days::new(u64::from(days) - 1);

        let state = self.state.read();
        let growth = state.get(user).map(|s| &s.growth);

        let mut buckets = Vec::with_capacity(days as usize);
        let mut total_gained = 0u64;
        let mut total_lost = 0u64;
        let mut day = start;
        while day <= today {
            let (gained, lost) = growth
                .and_then(|g| g.get(&day).copied())
                .unwrap_or((0, 0));
            total_gained += gained;
            total_lost += lost;
            buckets.push(GrowthBucket { day, gained, lost });
            day = day + chrono::Days::new(1);
        }
        Ok(GrowthSeries {
            user_id: user.to_string(),
            days,
            buckets,
            total_gained,
            total_lost,
            net_change: total_gained as i64 - total_lost as i64,
        })
    }

    /// Top `n` users by follower count, for the trending board.
    pub fn follower_leaders(&self, n: usize) -> Vec<RankedUser> {
        let state = self.state.read();
        let leaders: Vec<RankedUser> = state
            .iter()
            .filter(|(_, s)| s.follower_count > 0)
            .map(|(user, s)| RankedUser {
                user_id: user.clone(),
                score: s.follower_count as f64,
                shared_connections: 0,
            })
            .collect();
        crate::models::rank_and_truncate(leaders, n)
    }

    /// Top `n` users by net follower gain over the trailing `days` window.
    pub fn growth_leaders(&self, days: u32, n: usize) -> Vec<RankedUser> {
        let days = days.clamp(1, self.max_days);
        let today = Utc::now().date_naive();
        let start = today - chrono::Days::new(u64::from(days) - 1);

        let state = self.state.read();
        let leaders: Vec<RankedUser> = state
            .iter()
            .filter_map(|(user, s)| {
                let net: i64 = s
                    .growth
                    .range(start..=today)
                    .map(|(_, (gained, lost))| *gained as i64 - *lost as i64)
                    .sum();
                if net > 0 {
                    Some(RankedUser {
                        user_id: user.clone(),
                        score: net as f64,
                        shared_connections: 0,
                    })
                } else {
                    None
                }
            })
            .collect();
        crate::models::rank_and_truncate(leaders, n)
    }

    fn record_gain(&self, event: &MutationEvent) {
        let day = event.timestamp.date_naive();
        let mut state = self.state.write();
        {
            let target = state.entry(event.target.clone()).or_default();
            target.follower_count += 1;
            target.growth.entry(day).or_insert((0, 0)).0 += 1;
            if event.reciprocal {
                target.mutual_count += 1;
            }
        }
        let source = state.entry(event.source.clone()).or_default();
        source.following_count += 1;
        if event.reciprocal {
            source.mutual_count += 1;
        }
    }

    fn record_loss(&self, event: &MutationEvent) {
        let day = event.timestamp.date_naive();
        let mut state = self.state.write();
        {
            let target = state.entry(event.target.clone()).or_default();
            target.follower_count = target.follower_count.saturating_sub(1);
            target.growth.entry(day).or_insert((0, 0)).1 += 1;
            if event.reciprocal {
                target.mutual_count = target.mutual_count.saturating_sub(1);
            }
        }
        let source = state.entry(event.source.clone()).or_default();
        source.following_count = source.following_count.saturating_sub(1);
        if event.reciprocal {
            source.mutual_count = source.mutual_count.saturating_sub(1);
        }
    }

    fn adjust_pending(&self, target: &str, delta: i64) {
        let mut state = self.state.write();
        let stats = state.entry(target.to_string()).or_default();
        if delta > 0 {
            stats.pending_incoming += delta as u64;
        } else {
            stats.pending_incoming = stats.pending_incoming.saturating_sub((-delta) as u64);
        }
    }
}

impl MutationSink for AnalyticsAggregator {
    fn on_event(&self, event: &MutationEvent) {
        match event.op {
            MutationOp::Follow => self.record_gain(event),
            MutationOp::FollowApproved => {
                // The request leaves the pending queue as it becomes a
                // counted follower.
                self.adjust_pending(&event.target, -1);
                self.record_gain(event);
            }
            MutationOp::FollowRequested => self.adjust_pending(&event.target, 1),
            MutationOp::Unfollow => match event.state {
                EdgeState::Active => self.record_loss(event),
                EdgeState::Pending => self.adjust_pending(&event.target, -1),
            },
            // Relationship-policy edges carry no follower counters; any
            // induced unfollows arrive as their own events.
            MutationOp::Block
            | MutationOp::Unblock
            | MutationOp::Mute
            | MutationOp::Unmute => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn aggregator() -> AnalyticsAggregator {
        AnalyticsAggregator::new(&Config::default().activity)
    }

    fn follow(source: &str, target: &str) -> MutationEvent {
        MutationEvent::new(source, target, MutationOp::Follow, EdgeState::Active)
    }

    #[test]
    fn counts_followers_and_following() {
        let agg = aggregator();
        agg.on_event(&follow("a", "x"));
        agg.on_event(&follow("b", "x"));

        let x = agg.get_social_metrics("x").unwrap();
        assert_eq!(x.follower_count, 2);
        assert_eq!(x.following_count, 0);
        let a = agg.get_social_metrics("a").unwrap();
        assert_eq!(a.following_count, 1);
    }

    #[test]
    fn reciprocal_events_maintain_mutual_count() {
        let agg = aggregator();
        agg.on_event(&follow("a", "b"));
        agg.on_event(&follow("b", "a").reciprocal(true));

        let a = agg.get_social_metrics("a").unwrap();
        assert_eq!(a.mutual_count, 1);
        assert_eq!(a.follower_count, 1);
        assert!((a.mutual_ratio - 1.0).abs() < f64::EPSILON);

        agg.on_event(
            &MutationEvent::new("a", "b", MutationOp::Unfollow, EdgeState::Active).reciprocal(true),
        );
        let a = agg.get_social_metrics("a").unwrap();
        assert_eq!(a.mutual_count, 0);
        let b = agg.get_social_metrics("b").unwrap();
        assert_eq!(b.mutual_count, 0);
        assert_eq!(b.follower_count, 0);
    }

    #[test]
    fn pending_flow_tracks_request_queue() {
        let agg = aggregator();
        agg.on_event(&MutationEvent::new(
            "a",
            "x",
            MutationOp::FollowRequested,
            EdgeState::Pending,
        ));
        assert_eq!(agg.get_social_metrics("x").unwrap().pending_incoming_count, 1);
        // No follower yet.
        assert_eq!(agg.get_social_metrics("x").unwrap().follower_count, 0);

        agg.on_event(&MutationEvent::new(
            "a",
            "x",
            MutationOp::FollowApproved,
            EdgeState::Active,
        ));
        let x = agg.get_social_metrics("x").unwrap();
        assert_eq!(x.pending_incoming_count, 0);
        assert_eq!(x.follower_count, 1);
    }

    #[test]
    fn rejected_request_leaves_counters_clean() {
        let agg = aggregator();
        agg.on_event(&MutationEvent::new(
            "a",
            "x",
            MutationOp::FollowRequested,
            EdgeState::Pending,
        ));
        agg.on_event(&MutationEvent::new(
            "a",
            "x",
            MutationOp::Unfollow,
            EdgeState::Pending,
        ));
        let x = agg.get_social_metrics("x").unwrap();
        assert_eq!(x.pending_incoming_count, 0);
        assert_eq!(x.follower_count, 0);
    }

    #[test]
    fn growth_series_zero_fills_and_totals() {
        let agg = aggregator();
        agg.on_event(&follow("a", "x"));
        agg.on_event(&follow("b", "x"));
        agg.on_event(&MutationEvent::new(
            "a",
            "x",
            MutationOp::Unfollow,
            EdgeState::Active,
        ));

        let series = agg.get_growth_metrics("x", "a", 7).unwrap();
        assert_eq!(series.days, 7);
        assert_eq!(series.buckets.len(), 7);
        assert_eq!(series.total_gained, 2);
        assert_eq!(series.total_lost, 1);
        assert_eq!(series.net_change, 1);
        // Today is the last bucket; earlier days are zero-filled.
        let today = series.buckets.last().unwrap();
        assert_eq!(today.gained, 2);
        assert_eq!(today.net(), 1);
        assert!(series.buckets[..6].iter().all(|b| b.gained == 0 && b.lost == 0));
    }

    #[test]
    fn growth_days_are_clamped() {
        let agg = aggregator();
        let series = agg.get_growth_metrics("x", "a", 0).unwrap();
        assert_eq!(series.days, 1);
        let series = agg.get_growth_metrics("x", "a", 10_000).unwrap();
        assert_eq!(series.days, 365);
    }

    #[test]
    fn blocks_do_not_touch_counters() {
        let agg = aggregator();
        agg.on_event(&follow("a", "x"));
        agg.on_event(&MutationEvent::new(
            "x",
            "a",
            MutationOp::Block,
            EdgeState::Active,
        ));
        assert_eq!(agg.get_social_metrics("x").unwrap().follower_count, 1);
    }

    #[test]
    fn leaders_rank_by_score_then_id() {
        let agg = aggregator();
        agg.on_event(&follow("a", "x"));
        agg.on_event(&follow("b", "x"));
        agg.on_event(&follow("a", "y"));
        agg.on_event(&follow("b", "y"));
        agg.on_event(&follow("a", "z"));

        let leaders = agg.follower_leaders(3);
        let ids: Vec<_> = leaders.iter().map(|r| r.user_id.as_str()).collect();
        // x and y tie at two followers; ascending id breaks the tie.
        assert_eq!(ids, vec!["x", "y", "z"]);

        let gainers = agg.growth_leaders(7, 2);
        assert_eq!(gainers.len(), 2);
        assert_eq!(gainers[0].user_id, "x");
    }
}

// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::activity::ActivityFeed;
use crate::analytics::AnalyticsAggregator;
use crate::config::Config;
use crate::error::{validate_user_id, Result};
use crate::events::MutationEvent;
use crate::models::{
    ActivityEvent, EdgeKind, EdgeOutcome, GrowthSeries, Page, PerTargetOutcome, RankedUser,
    RecommendationAlgorithm, RelationshipStatus, SocialMetrics, UserId,
};
use crate::query::QueryEngine;
use crate::recommend::{RecommendationEngine, TrendingCategory};
use crate::storage::DurableStore;
use crate::store::{EdgeStore, ReadConsistency};

/// The assembled relationship-graph engine: edge store, query engine,
/// recommendations, analytics and activity sinks wired to one mutation
/// feed. This is the crate's public entry point; embedders construct it
/// over their durable-store implementation and call it from any number of
/// tasks.
pub struct SocialGraphEngine {
    store: Arc<EdgeStore>,
    query: QueryEngine,
    recommend: RecommendationEngine,
    analytics: Arc<AnalyticsAggregator>,
    activity: Arc<ActivityFeed>,
}

impl SocialGraphEngine {
    pub fn new(config: &Config, durable: Arc<dyn DurableStore>) -> Self {
        let store = Arc::new(EdgeStore::new(config, durable));
        let analytics = Arc::new(AnalyticsAggregator::new(&config.activity));
        let activity = Arc::new(ActivityFeed::new(&config.activity));
        store.add_sink(analytics.clone());
        store.add_sink(activity.clone());
        SocialGraphEngine {
            query: QueryEngine::new(store.clone(), config.query.clone()),
            recommend: RecommendationEngine::new(store.clone(), config.recommendation.clone()),
            store,
            analytics,
            activity,
        }
    }

    /// Construct with configuration loaded from the environment.
    pub fn from_env(durable: Arc<dyn DurableStore>) -> Self {
        Self::new(Config::get(), durable)
    }

    // ---- mutations -----------------------------------------------------

    pub async fn follow(&self, actor: &str, target: &str) -> Result<EdgeOutcome> {
        self.store.upsert_edge(actor, target, EdgeKind::Follow).await
    }

    pub async fn unfollow(&self, actor: &str, target: &str) -> Result<EdgeOutcome> {
        self.store.remove_edge(actor, target, EdgeKind::Follow).await
    }

    pub async fn block(&self, actor: &str, target: &str) -> Result<EdgeOutcome> {
        self.store.upsert_edge(actor, target, EdgeKind::Block).await
    }

    pub async fn unblock(&self, actor: &str, target: &str) -> Result<EdgeOutcome> {
        self.store.remove_edge(actor, target, EdgeKind::Block).await
    }

    pub async fn mute(&self, actor: &str, target: &str) -> Result<EdgeOutcome> {
        self.store.upsert_edge(actor, target, EdgeKind::Mute).await
    }

    pub async fn unmute(&self, actor: &str, target: &str) -> Result<EdgeOutcome> {
        self.store.remove_edge(actor, target, EdgeKind::Mute).await
    }

    pub async fn bulk_follow(
        &self,
        actor: &str,
        targets: &[UserId],
    ) -> Result<Vec<PerTargetOutcome>> {
        self.store
            .bulk_upsert(actor, targets, EdgeKind::Follow, None)
            .await
    }

    /// Bulk follow under a caller timeout; outcomes computed before the
    /// deadline are returned as partial results.
    pub async fn bulk_follow_with_deadline(
        &self,
        actor: &str,
        targets: &[UserId],
        timeout: Duration,
    ) -> Result<Vec<PerTargetOutcome>> {
        self.store
            .bulk_upsert(actor, targets, EdgeKind::Follow, Some(Instant::now() + timeout))
            .await
    }

    pub async fn bulk_unfollow(
        &self,
        actor: &str,
        targets: &[UserId],
    ) -> Result<Vec<PerTargetOutcome>> {
        self.store
            .bulk_remove(actor, targets, EdgeKind::Follow, None)
            .await
    }

    pub async fn bulk_unfollow_with_deadline(
        &self,
        actor: &str,
        targets: &[UserId],
        timeout: Duration,
    ) -> Result<Vec<PerTargetOutcome>> {
        self.store
            .bulk_remove(actor, targets, EdgeKind::Follow, Some(Instant::now() + timeout))
            .await
    }

    /// Approve a pending follow request on `owner`'s account.
    pub async fn approve_follow_request(&self, owner: &str, requester: &str) -> Result<EdgeOutcome> {
        self.store.approve_follow(owner, requester).await
    }

    /// Reject a pending follow request on `owner`'s account.
    pub async fn reject_follow_request(&self, owner: &str, requester: &str) -> Result<EdgeOutcome> {
        self.store.reject_follow(owner, requester).await
    }

    /// Toggle the privacy bit: follows of a private account start PENDING.
    pub async fn set_account_private(&self, user: &str, private: bool) -> Result<()> {
        self.store.set_private(user, private).await
    }

    /// Re-derive a user's in-memory projection from the durable store.
    pub async fn repair_user(&self, user: &str) -> Result<()> {
        self.store.rebuild_user(user).await
    }

    // ---- relationship queries ------------------------------------------

    pub async fn get_relationship(
        &self,
        a: &str,
        b: &str,
        consistency: ReadConsistency,
    ) -> Result<RelationshipStatus> {
        self.query.get_relationship(a, b, consistency).await
    }

    pub async fn are_mutual_friends(
        &self,
        a: &str,
        b: &str,
        consistency: ReadConsistency,
    ) -> Result<bool> {
        self.query.are_mutual_friends(a, b, consistency).await
    }

    pub async fn list_followers(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.query.list_followers(user, limit, cursor, consistency).await
    }

    pub async fn list_following(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.query.list_following(user, limit, cursor, consistency).await
    }

    pub async fn list_blocked(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.query.list_blocked(user, limit, cursor, consistency).await
    }

    pub async fn list_muted(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.query.list_muted(user, limit, cursor, consistency).await
    }

    pub async fn list_mutual_friends(
        &self,
        a: &str,
        b: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.query
            .list_mutual_friends(a, b, limit, cursor, consistency)
            .await
    }

    pub async fn bulk_relationship(
        &self,
        requester: &str,
        targets: &[UserId],
        consistency: ReadConsistency,
    ) -> Result<HashMap<UserId, RelationshipStatus>> {
        self.query
            .bulk_relationship(requester, targets, consistency)
            .await
    }

    // ---- recommendations -----------------------------------------------

    pub async fn recommend_friends(
        &self,
        user: &str,
        limit: usize,
        algorithm: RecommendationAlgorithm,
    ) -> Result<Vec<RankedUser>> {
        self.recommend.recommend_friends(user, limit, algorithm).await
    }

    pub async fn recommend_mutual_friend_based(
        &self,
        user: &str,
        other: &str,
        limit: usize,
    ) -> Result<Vec<RankedUser>> {
        self.recommend
            .recommend_mutual_friend_based(user, other, limit)
            .await
    }

    pub async fn trending_users(
        &self,
        user: &str,
        limit: usize,
        category: &str,
    ) -> Result<Vec<RankedUser>> {
        self.recommend.trending_users(user, limit, category).await
    }

    /// Recompute the trending boards from current analytics counters.
    pub fn refresh_trending(&self) {
        self.recommend.refresh_from_analytics(&self.analytics);
    }

    /// Install a trending board explicitly.
    pub fn set_trending(&self, category: TrendingCategory, entries: Vec<RankedUser>) {
        self.recommend.set_trending(category, entries);
    }

    // ---- analytics and activity ----------------------------------------

    pub fn get_social_metrics(&self, user: &str) -> Result<SocialMetrics> {
        self.analytics.get_social_metrics(user)
    }

    pub fn get_growth_metrics(&self, user: &str, requester: &str, days: u32) -> Result<GrowthSeries> {
        self.analytics.get_growth_metrics(user, requester, days)
    }

    pub fn get_live_follower_count(&self, user: &str) -> Result<u64> {
        self.activity.get_live_follower_count(user)
    }

    /// Recent incoming follows, newest first, with events from actors
    /// blocked either direction filtered out at read time.
    pub async fn get_recent_activity(
        &self,
        user: &str,
        requester: &str,
        limit: usize,
    ) -> Result<Vec<ActivityEvent>> {
        validate_user_id(requester)?;
        let events = self.activity.recent_activity(user, usize::MAX)?;
        let mut out = Vec::with_capacity(limit.min(events.len()));
        for event in events {
            if out.len() == limit {
                break;
            }
            if self.actor_blocked(user, &event.actor_id).await? {
                continue;
            }
            out.push(event);
        }
        Ok(out)
    }

    async fn actor_blocked(&self, user: &str, actor: &str) -> Result<bool> {
        let stale = ReadConsistency::AllowStale;
        if let Some(block) = self.store.get_edge(user, actor, EdgeKind::Block, stale).await? {
            if block.is_active() {
                return Ok(true);
            }
        }
        if let Some(block) = self.store.get_edge(actor, user, EdgeKind::Block, stale).await? {
            if block.is_active() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ---- events --------------------------------------------------------

    /// Real-time feed of committed mutations for external transports.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.store.subscribe()
    }
}

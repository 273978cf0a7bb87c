// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::analytics::AnalyticsAggregator;
use crate::config::RecommendationConfig;
use crate::error::{validate_pair, validate_user_id, GraphError, Result};
use crate::models::{rank_and_truncate, EdgeKind, RankedUser, RecommendationAlgorithm, UserId};
use crate::store::{EdgeStore, ReadConsistency};

// Hybrid scoring weights: shared connections dominate, trending breaks the
// cold-start case, and a candidate who already follows the requester is
// slightly demoted (the surface is for discovery, not follow-backs).
const SHARED_WEIGHT: f64 = 1.0;
const TRENDING_WEIGHT: f64 = 0.5;
const FOLLOWS_BACK_PENALTY: f64 = 0.25;

/// Trailing window feeding the rising board.
const RISING_WINDOW_DAYS: u32 = 7;

/// Categories of the precomputed trending board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrendingCategory {
    /// All-time follower leaders.
    Global,
    /// Largest net follower gain over the trailing week.
    Rising,
}

impl TrendingCategory {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(TrendingCategory::Global),
            "rising" => Ok(TrendingCategory::Rising),
            other => Err(GraphError::InvalidArgument(format!(
                "unknown trending category: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingCategory::Global => "global",
            TrendingCategory::Rising => "rising",
        }
    }
}

struct CacheEntry {
    computed_at: Instant,
    results: Vec<RankedUser>,
}

/// Friend recommendation over graph snapshots: friend-of-friend candidate
/// generation, a precomputed trending board, and a weighted hybrid of the
/// two. Read-only with respect to the edge store; never holds pair locks,
/// and all store reads are stale-tolerant, so a durable-store outage
/// degrades recommendations instead of failing them.
pub struct RecommendationEngine {
    store: Arc<EdgeStore>,
    config: RecommendationConfig,
    cache: Mutex<HashMap<(UserId, RecommendationAlgorithm), CacheEntry>>,
    boards: RwLock<HashMap<TrendingCategory, Vec<RankedUser>>>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<EdgeStore>, config: RecommendationConfig) -> Self {
        RecommendationEngine {
            store,
            config,
            cache: Mutex::new(HashMap::new()),
            boards: RwLock::new(HashMap::new()),
        }
    }

    /// Ranked follow candidates for `user`. Results are cached per
    /// `(user, algorithm)` for the configured TTL; staleness within the TTL
    /// is accepted.
    pub async fn recommend_friends(
        &self,
        user: &str,
        limit: usize,
        algorithm: RecommendationAlgorithm,
    ) -> Result<Vec<RankedUser>> {
        validate_user_id(user)?;
        if limit == 0 {
            return Err(GraphError::InvalidArgument(
                "recommendation limit must be positive".to_string(),
            ));
        }
        let limit = limit.min(self.config.max_limit);

        let key = (user.to_string(), algorithm);
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        if let Some(entry) = self.cache.lock().get(&key) {
            if entry.computed_at.elapsed() < ttl {
                let mut results = entry.results.clone();
                results.truncate(limit);
                return Ok(results);
            }
        }

        let results = match algorithm {
            RecommendationAlgorithm::Graph => self.compute_graph(user).await?,
            RecommendationAlgorithm::Trending => {
                self.filtered_board(user, TrendingCategory::Global).await?
            }
            RecommendationAlgorithm::Hybrid => self.compute_hybrid(user).await?,
        };
        let results = rank_and_truncate(results, self.config.max_limit);
        debug!(
            user,
            algorithm = algorithm.as_str(),
            candidates = results.len(),
            "recommendations computed"
        );

        {
            let mut cache = self.cache.lock();
            cache.retain(|_, entry| entry.computed_at.elapsed() < ttl);
            // Bounded: evict the oldest entries rather than growing with
            // the requester population.
            while cache.len() >= self.config.cache_max_entries.max(1) {
                let oldest = cache
                    .iter()
                    .min_by_key(|(_, entry)| entry.computed_at)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => cache.remove(&key),
                    None => break,
                };
            }
            cache.insert(
                key,
                CacheEntry {
                    computed_at: Instant::now(),
                    results: results.clone(),
                },
            );
        }
        let mut results = results;
        results.truncate(limit);
        Ok(results)
    }

    /// Candidates drawn from the followings of users both `user` and
    /// `other` follow, scored by how many of those mutuals follow them.
    pub async fn recommend_mutual_friend_based(
        &self,
        user: &str,
        other: &str,
        limit: usize,
    ) -> Result<Vec<RankedUser>> {
        validate_pair(user, other)?;
        if limit == 0 {
            return Err(GraphError::InvalidArgument(
                "recommendation limit must be positive".to_string(),
            ));
        }
        let limit = limit.min(self.config.max_limit);

        let neighbors = self
            .store
            .following_snapshot(user, self.config.fan_out_cap, ReadConsistency::AllowStale)
            .await?;
        let mut mutuals = Vec::new();
        for entry in neighbors {
            if entry.user_id == other {
                continue;
            }
            if self
                .store
                .follows_active(other, &entry.user_id, ReadConsistency::AllowStale)
                .await?
            {
                mutuals.push(entry.user_id);
            }
        }

        let mut shared: HashMap<UserId, u32> = HashMap::new();
        for mutual in &mutuals {
            let followings = self
                .store
                .following_snapshot(mutual, self.config.per_neighbor_cap, ReadConsistency::AllowStale)
                .await?;
            for entry in followings {
                if entry.user_id == user || entry.user_id == other {
                    continue;
                }
                *shared.entry(entry.user_id).or_insert(0) += 1;
            }
        }

        let mut candidates = Vec::new();
        for (candidate, count) in shared {
            if self.excluded(user, &candidate).await? {
                continue;
            }
            candidates.push(RankedUser {
                user_id: candidate,
                score: f64::from(count) * SHARED_WEIGHT,
                shared_connections: count,
            });
        }
        Ok(rank_and_truncate(candidates, limit))
    }

    /// The precomputed trending board for `category`, with users already
    /// related to the requester filtered out. Unknown categories are
    /// `InvalidArgument`.
    pub async fn trending_users(
        &self,
        user: &str,
        limit: usize,
        category: &str,
    ) -> Result<Vec<RankedUser>> {
        validate_user_id(user)?;
        let category = TrendingCategory::parse(category)?;
        if limit == 0 {
            return Err(GraphError::InvalidArgument(
                "recommendation limit must be positive".to_string(),
            ));
        }
        let limit = limit.min(self.config.max_limit);
        let mut board = self.filtered_board(user, category).await?;
        board.truncate(limit);
        Ok(board)
    }

    /// Install a board explicitly (embedder-supplied scores).
    pub fn set_trending(&self, category: TrendingCategory, entries: Vec<RankedUser>) {
        self.boards
            .write()
            .insert(category, rank_and_truncate(entries, self.board_size()));
    }

    /// Recompute both boards from the analytics counters. Intended to run
    /// on a periodic tick owned by the embedder.
    pub fn refresh_from_analytics(&self, analytics: &AnalyticsAggregator) {
        let size = self.board_size();
        let mut boards = self.boards.write();
        boards.insert(TrendingCategory::Global, analytics.follower_leaders(size));
        boards.insert(
            TrendingCategory::Rising,
            analytics.growth_leaders(RISING_WINDOW_DAYS, size),
        );
        debug!("trending boards refreshed from analytics");
    }

    fn board_size(&self) -> usize {
        // Oversized so per-requester filtering still fills a page.
        self.config.max_limit * 4
    }

    async fn compute_graph(&self, user: &str) -> Result<Vec<RankedUser>> {
        let shared = self.shared_connection_counts(user).await?;
        let mut candidates = Vec::with_capacity(shared.len());
        for (candidate, count) in shared {
            if self.excluded(user, &candidate).await? {
                continue;
            }
            candidates.push(RankedUser {
                user_id: candidate,
                score: f64::from(count) * SHARED_WEIGHT,
                shared_connections: count,
            });
        }
        Ok(candidates)
    }

    async fn compute_hybrid(&self, user: &str) -> Result<Vec<RankedUser>> {
        let shared = self.shared_connection_counts(user).await?;
        let trending: HashMap<UserId, f64> = self
            .boards
            .read()
            .get(&TrendingCategory::Global)
            .map(|board| {
                board
                    .iter()
                    .map(|r| (r.user_id.clone(), r.score))
                    .collect()
            })
            .unwrap_or_default();

        // Union of both candidate sources.
        let mut all: HashMap<UserId, u32> = shared.clone();
        for candidate in trending.keys() {
            all.entry(candidate.clone()).or_insert(0);
        }

        let mut candidates = Vec::with_capacity(all.len());
        for (candidate, count) in all {
            if self.excluded(user, &candidate).await? {
                continue;
            }
            let follows_back = self
                .store
                .follows_active(&candidate, user, ReadConsistency::AllowStale)
                .await?;
            let mut score = f64::from(count) * SHARED_WEIGHT
                + trending.get(&candidate).copied().unwrap_or(0.0) * TRENDING_WEIGHT;
            if follows_back {
                score -= FOLLOWS_BACK_PENALTY;
            }
            candidates.push(RankedUser {
                user_id: candidate,
                score,
                shared_connections: count,
            });
        }
        Ok(candidates)
    }

    /// Friend-of-friend fan-out: at most `fan_out_cap` most recent
    /// followings of `user`, and at most `per_neighbor_cap` followings of
    /// each of those, counted per candidate.
    async fn shared_connection_counts(&self, user: &str) -> Result<HashMap<UserId, u32>> {
        let neighbors = self
            .store
            .following_snapshot(user, self.config.fan_out_cap, ReadConsistency::AllowStale)
            .await?;
        let mut shared: HashMap<UserId, u32> = HashMap::new();
        for neighbor in &neighbors {
            let followings = self
                .store
                .following_snapshot(
                    &neighbor.user_id,
                    self.config.per_neighbor_cap,
                    ReadConsistency::AllowStale,
                )
                .await?;
            for entry in followings {
                if entry.user_id == user {
                    continue;
                }
                *shared.entry(entry.user_id).or_insert(0) += 1;
            }
        }
        Ok(shared)
    }

    async fn filtered_board(&self, user: &str, category: TrendingCategory) -> Result<Vec<RankedUser>> {
        let board = self
            .boards
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_default();
        let mut out = Vec::with_capacity(board.len());
        for ranked in board {
            if self.excluded(user, &ranked.user_id).await? {
                continue;
            }
            out.push(ranked);
        }
        Ok(out)
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Candidates the requester should never be shown: self, anyone already
    /// followed (active or pending), anyone blocked either direction, and
    /// anyone muted.
    async fn excluded(&self, user: &str, candidate: &str) -> Result<bool> {
        if user == candidate {
            return Ok(true);
        }
        let stale = ReadConsistency::AllowStale;
        if self
            .store
            .get_edge(user, candidate, EdgeKind::Follow, stale)
            .await?
            .is_some()
        {
            return Ok(true);
        }
        if let Some(block) = self.store.get_edge(user, candidate, EdgeKind::Block, stale).await? {
            if block.is_active() {
                return Ok(true);
            }
        }
        if let Some(block) = self.store.get_edge(candidate, user, EdgeKind::Block, stale).await? {
            if block.is_active() {
                return Ok(true);
            }
        }
        if let Some(mute) = self.store.get_edge(user, candidate, EdgeKind::Mute, stale).await? {
            if mute.is_active() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;

static CONFIG: OnceCell<Config> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub query: QueryConfig,
    pub recommendation: RecommendationConfig,
    pub activity: ActivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of adjacency-index shards; should scale with expected
    /// hot-user fan-out.
    pub shard_count: usize,
    /// Number of pair-serialization locks.
    pub pair_lock_count: usize,
    /// Maximum targets accepted by a single bulk mutation.
    pub max_bulk_targets: usize,
    /// Capacity of the external mutation-event broadcast channel.
    pub event_channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_page_limit: usize,
    pub max_page_limit: usize,
    /// Maximum targets accepted by a bulk relationship lookup.
    pub max_bulk_lookups: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// At most this many first-degree connections are explored per request.
    pub fan_out_cap: usize,
    /// At most this many of each neighbour's followings are examined.
    pub per_neighbor_cap: usize,
    pub max_limit: usize,
    /// Recommendation/trending cache time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Upper bound on cached `(user, algorithm)` entries; the oldest entry
    /// is evicted once the bound is reached.
    pub cache_max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Ring-buffer capacity for recent incoming-follow events per user.
    pub ring_capacity: usize,
    pub max_analytics_days: u32,
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env file if present
        let _ = dotenv::dotenv();

        Config {
            store: StoreConfig {
                shard_count: env_usize("GRAPH_SHARD_COUNT", 64),
                pair_lock_count: env_usize("GRAPH_PAIR_LOCK_COUNT", 1024),
                max_bulk_targets: env_usize("GRAPH_MAX_BULK_TARGETS", 100),
                event_channel_capacity: env_usize("GRAPH_EVENT_CHANNEL_CAPACITY", 4096),
            },
            query: QueryConfig {
                default_page_limit: env_usize("GRAPH_DEFAULT_PAGE_LIMIT", 50),
                max_page_limit: env_usize("GRAPH_MAX_PAGE_LIMIT", 200),
                max_bulk_lookups: env_usize("GRAPH_MAX_BULK_LOOKUPS", 100),
            },
            recommendation: RecommendationConfig {
                fan_out_cap: env_usize("GRAPH_RECOMMEND_FAN_OUT_CAP", 50),
                per_neighbor_cap: env_usize("GRAPH_RECOMMEND_PER_NEIGHBOR_CAP", 50),
                max_limit: env_usize("GRAPH_RECOMMEND_MAX_LIMIT", 50),
                cache_ttl_secs: env::var("GRAPH_RECOMMEND_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("GRAPH_RECOMMEND_CACHE_TTL_SECS must be a number"),
                cache_max_entries: env_usize("GRAPH_RECOMMEND_CACHE_MAX_ENTRIES", 10_000),
            },
            activity: ActivityConfig {
                ring_capacity: env_usize("GRAPH_ACTIVITY_RING_CAPACITY", 100),
                max_analytics_days: env::var("GRAPH_MAX_ANALYTICS_DAYS")
                    .unwrap_or_else(|_| "365".to_string())
                    .parse()
                    .expect("GRAPH_MAX_ANALYTICS_DAYS must be a number"),
            },
        }
    }

    /// Install the global configuration, loading from the environment.
    /// Subsequent calls return the already-installed config.
    pub fn init() -> Result<&'static Config> {
        Ok(CONFIG.get_or_init(Config::from_env))
    }

    /// Get the global configuration, initializing from the environment on
    /// first use.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: StoreConfig {
                shard_count: 64,
                pair_lock_count: 1024,
                max_bulk_targets: 100,
                event_channel_capacity: 4096,
            },
            query: QueryConfig {
                default_page_limit: 50,
                max_page_limit: 200,
                max_bulk_lookups: 100,
            },
            recommendation: RecommendationConfig {
                fan_out_cap: 50,
                per_neighbor_cap: 50,
                max_limit: 50,
                cache_ttl_secs: 60,
                cache_max_entries: 10_000,
            },
            activity: ActivityConfig {
                ring_capacity: 100,
                max_analytics_days: 365,
            },
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{} must be a number", key))
}

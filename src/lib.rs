//! In-memory social relationship-graph engine: follow/block/mute edges,
//! relationship queries with cursor pagination, friend recommendations,
//! and event-sourced analytics, layered over an abstract durable store.

pub mod activity;
pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod query;
pub mod recommend;
pub mod storage;
pub mod store;

pub use config::Config;
pub use engine::SocialGraphEngine;
pub use error::{GraphError, Result};
pub use events::{MutationEvent, MutationOp, MutationSink};
pub use models::{
    Edge, EdgeKind, EdgeOutcome, EdgeState, Page, RankedUser, RecommendationAlgorithm,
    RelationshipStatus, SocialMetrics, UserId,
};
pub use storage::{DurableStore, MemoryStore, StorageError};
pub use store::ReadConsistency;

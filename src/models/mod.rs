// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

pub mod edge;
pub mod metrics;
pub mod recommendation;
pub mod relationship;

pub use edge::{Edge, EdgeKind, EdgeOutcome, EdgeState, RejectReason};
pub use metrics::{ActivityEvent, GrowthBucket, GrowthSeries, SocialMetrics};
pub use recommendation::{rank_and_truncate, RankedUser, RecommendationAlgorithm};
pub use relationship::{FollowEntry, Page, PerTargetOutcome, RelationshipStatus};

/// Opaque user identity. The engine owns no profile data; ids are compared
/// and hashed as plain tokens.
pub type UserId = String;

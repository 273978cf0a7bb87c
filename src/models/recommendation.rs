// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::{GraphError, Result};

/// Closed set of recommendation algorithms, dispatched by pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAlgorithm {
    /// Friend-of-friend candidate generation scored by shared connections.
    Graph,
    /// Global engagement velocity, independent of the requester's graph.
    Trending,
    /// Weighted combination of graph and trending signals.
    Hybrid,
}

impl RecommendationAlgorithm {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "graph" => Ok(RecommendationAlgorithm::Graph),
            "trending" => Ok(RecommendationAlgorithm::Trending),
            "hybrid" => Ok(RecommendationAlgorithm::Hybrid),
            other => Err(GraphError::InvalidArgument(format!(
                "unknown recommendation algorithm: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationAlgorithm::Graph => "graph",
            RecommendationAlgorithm::Trending => "trending",
            RecommendationAlgorithm::Hybrid => "hybrid",
        }
    }
}

/// One scored recommendation candidate. Ranked lists are ordered by score
/// descending, ties broken by ascending id for determinism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    pub user_id: UserId,
    pub score: f64,
    /// Shared-connection count that contributed to the score (0 for pure
    /// trending results).
    pub shared_connections: u32,
}

/// Sort a candidate list into the canonical ranked order and truncate.
pub fn rank_and_truncate(mut candidates: Vec<RankedUser>, limit: usize) -> Vec<RankedUser> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_algorithm() {
        assert!(RecommendationAlgorithm::parse("graph").is_ok());
        assert!(RecommendationAlgorithm::parse("pagerank").is_err());
    }

    #[test]
    fn ranking_breaks_ties_by_ascending_id() {
        let ranked = rank_and_truncate(
            vec![
                RankedUser {
                    user_id: "zed".into(),
                    score: 2.0,
                    shared_connections: 2,
                },
                RankedUser {
                    user_id: "amy".into(),
                    score: 2.0,
                    shared_connections: 2,
                },
                RankedUser {
                    user_id: "bob".into(),
                    score: 5.0,
                    shared_connections: 5,
                },
            ],
            10,
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["bob", "amy", "zed"]);
    }
}

// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::storage::StorageError;

/// Error taxonomy for the relationship graph engine.
///
/// Idempotent no-ops (already following, already removed) are *not* errors;
/// they surface as [`crate::models::EdgeOutcome`] variants so that client
/// retries stay safe.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Malformed user id, self-relation, unknown algorithm or category.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation conflicts with current relationship state (e.g. a blocked
    /// pair attempting an approval).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation semantically requires an edge that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bulk batch size over the configured limit.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Durable-store collaborator unreachable; callers should retry with
    /// backoff.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Invariant violation inside the engine. Logged where raised and never
    /// silently swallowed; triggers the consistency-repair path.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<StorageError> for GraphError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => GraphError::Unavailable(msg),
            StorageError::Corrupted(msg) => GraphError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Validate an opaque user identifier. The engine treats ids as opaque
/// comparable tokens; it only rejects values that cannot round-trip through
/// cursors and logs.
pub fn validate_user_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(GraphError::InvalidArgument("empty user id".to_string()));
    }
    if id.len() > 128 {
        return Err(GraphError::InvalidArgument(format!(
            "user id longer than 128 bytes: {} bytes",
            id.len()
        )));
    }
    if id.contains('\0') {
        return Err(GraphError::InvalidArgument(
            "user id contains NUL byte".to_string(),
        ));
    }
    Ok(())
}

/// Validate a pair of ids for a mutation; self-relations are rejected.
pub fn validate_pair(source: &str, target: &str) -> Result<()> {
    validate_user_id(source)?;
    validate_user_id(target)?;
    if source == target {
        return Err(GraphError::InvalidArgument(format!(
            "self-relation not allowed: {}",
            source
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_oversized_ids() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(&"x".repeat(129)).is_err());
        assert!(validate_user_id(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn rejects_self_relation() {
        assert!(validate_pair("alice", "alice").is_err());
        assert!(validate_pair("alice", "bob").is_ok());
    }
}

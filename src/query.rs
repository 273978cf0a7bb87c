// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{validate_pair, validate_user_id, GraphError, Result};
use crate::models::{EdgeKind, FollowEntry, Page, RelationshipStatus, UserId};
use crate::store::adjacency::{AdjEntry, SetKind};
use crate::store::cursor::{ListCursor, MutualCursor};
use crate::store::{EdgeStore, ReadConsistency};

/// How many drive-side entries a mutual-friend scan examines per probe
/// round before checking whether the page is full.
const MUTUAL_SCAN_CHUNK: usize = 128;

/// Read-side engine over the edge store: point relationship lookups,
/// cursor-paginated list traversal, and mutual-friend intersection.
pub struct QueryEngine {
    store: Arc<EdgeStore>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(store: Arc<EdgeStore>, config: QueryConfig) -> Self {
        QueryEngine { store, config }
    }

    /// Composite relationship between two users, from `a`'s perspective.
    /// Six point lookups; O(1) once both projections are hydrated.
    pub async fn get_relationship(
        &self,
        a: &str,
        b: &str,
        consistency: ReadConsistency,
    ) -> Result<RelationshipStatus> {
        validate_pair(a, b)?;
        let a_to_b = self.store.get_edge(a, b, EdgeKind::Follow, consistency).await?;
        let b_to_a = self.store.get_edge(b, a, EdgeKind::Follow, consistency).await?;
        let a_block = self.store.get_edge(a, b, EdgeKind::Block, consistency).await?;
        let b_block = self.store.get_edge(b, a, EdgeKind::Block, consistency).await?;
        let a_mute = self.store.get_edge(a, b, EdgeKind::Mute, consistency).await?;

        Ok(RelationshipStatus {
            a_follows_b: a_to_b.as_ref().map(|e| e.is_active()).unwrap_or(false),
            b_follows_a: b_to_a.as_ref().map(|e| e.is_active()).unwrap_or(false),
            a_blocked_b: a_block.map(|e| e.is_active()).unwrap_or(false),
            b_blocked_a: b_block.map(|e| e.is_active()).unwrap_or(false),
            a_muted_b: a_mute.map(|e| e.is_active()).unwrap_or(false),
            pending_outgoing: a_to_b.map(|e| !e.is_active()).unwrap_or(false),
            pending_incoming: b_to_a.map(|e| !e.is_active()).unwrap_or(false),
        })
    }

    /// Whether both follow edges exist and are ACTIVE.
    pub async fn are_mutual_friends(
        &self,
        a: &str,
        b: &str,
        consistency: ReadConsistency,
    ) -> Result<bool> {
        validate_pair(a, b)?;
        Ok(self.store.follows_active(a, b, consistency).await?
            && self.store.follows_active(b, a, consistency).await?)
    }

    pub async fn list_followers(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.list_set(user, SetKind::Followers, limit, cursor, consistency)
            .await
    }

    pub async fn list_following(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.list_set(user, SetKind::Following, limit, cursor, consistency)
            .await
    }

    /// Self-view of the users this user has blocked.
    pub async fn list_blocked(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.list_set(user, SetKind::Blocked, limit, cursor, consistency)
            .await
    }

    /// Self-view of the users this user has muted.
    pub async fn list_muted(
        &self,
        user: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        self.list_set(user, SetKind::Muted, limit, cursor, consistency)
            .await
    }

    async fn list_set(
        &self,
        user: &str,
        kind: SetKind,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        validate_user_id(user)?;
        let limit = self.clamp_limit(limit)?;
        let after = cursor.map(ListCursor::decode).transpose()?.map(|c| c.position);

        let (entries, more) = self.store.page_set(user, kind, after, limit, consistency).await?;
        let next_cursor = if more {
            entries.last().map(|e| {
                ListCursor::encode(&AdjEntry::new(&e.user_id, e.followed_at))
            })
        } else {
            None
        };
        Ok(Page { entries, next_cursor })
    }

    /// Users both `a` and `b` actively follow, paginated. The side with the
    /// smaller following set drives the iteration and the other side is
    /// probed by point lookup; the cursor pins the driving side so later
    /// pages keep the first page's ordering even as the sets change size.
    pub async fn list_mutual_friends(
        &self,
        a: &str,
        b: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        consistency: ReadConsistency,
    ) -> Result<Page> {
        validate_pair(a, b)?;
        let limit = self.clamp_limit(limit)?;

        let (drive_b, mut after) = match cursor.map(MutualCursor::decode).transpose()? {
            Some(c) => (c.drive_b, Some(c.position)),
            None => {
                let len_a = self
                    .store
                    .set_len(a, SetKind::Following, consistency)
                    .await?;
                let len_b = self
                    .store
                    .set_len(b, SetKind::Following, consistency)
                    .await?;
                (len_b < len_a, None)
            }
        };
        let (drive, probe) = if drive_b { (b, a) } else { (a, b) };
        debug!(a, b, drive, "mutual friend scan");

        let mut entries: Vec<FollowEntry> = Vec::with_capacity(limit);
        let mut next_cursor = None;
        'scan: loop {
            let (chunk, more) = self
                .store
                .page_set(drive, SetKind::Following, after.clone(), MUTUAL_SCAN_CHUNK, consistency)
                .await?;
            for entry in chunk {
                let pos = AdjEntry::new(&entry.user_id, entry.followed_at);
                after = Some(pos.clone());
                if entry.user_id == probe {
                    continue;
                }
                if self
                    .store
                    .follows_active(probe, &entry.user_id, consistency)
                    .await?
                {
                    entries.push(entry);
                    if entries.len() == limit {
                        // Later entries may still intersect; hand back a
                        // resume point. The next page may come up empty.
                        next_cursor = Some(MutualCursor::encode(drive_b, &pos));
                        break 'scan;
                    }
                }
            }
            if !more {
                break;
            }
        }
        Ok(Page { entries, next_cursor })
    }

    /// Relationship of `requester` to each target. All ids are validated up
    /// front; a bad id fails the whole call rather than producing a partial
    /// map.
    pub async fn bulk_relationship(
        &self,
        requester: &str,
        targets: &[UserId],
        consistency: ReadConsistency,
    ) -> Result<HashMap<UserId, RelationshipStatus>> {
        if targets.len() > self.config.max_bulk_lookups {
            return Err(GraphError::ResourceExhausted(format!(
                "bulk lookup of {} targets exceeds limit of {}",
                targets.len(),
                self.config.max_bulk_lookups
            )));
        }
        for target in targets {
            validate_pair(requester, target)?;
        }

        let mut out = HashMap::with_capacity(targets.len());
        for target in targets {
            let status = self.get_relationship(requester, target, consistency).await?;
            out.insert(target.clone(), status);
        }
        Ok(out)
    }

    fn clamp_limit(&self, limit: Option<usize>) -> Result<usize> {
        match limit {
            Some(0) => Err(GraphError::InvalidArgument(
                "page limit must be positive".to_string(),
            )),
            Some(n) => Ok(n.min(self.config.max_page_limit)),
            None => Ok(self.config.default_page_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::MemoryStore;

    async fn engine_with(follows: &[(&str, &str)]) -> (QueryEngine, Arc<EdgeStore>) {
        let store = Arc::new(EdgeStore::new(
            &Config::default(),
            Arc::new(MemoryStore::new()),
        ));
        for (source, target) in follows {
            store
                .upsert_edge(source, target, EdgeKind::Follow)
                .await
                .unwrap();
        }
        let query = QueryEngine::new(store.clone(), Config::default().query);
        (query, store)
    }

    #[tokio::test]
    async fn relationship_reflects_both_directions() {
        let (query, store) = engine_with(&[("a", "b"), ("b", "a")]).await;
        store.upsert_edge("a", "c", EdgeKind::Mute).await.unwrap();

        let status = query
            .get_relationship("a", "b", ReadConsistency::Strict)
            .await
            .unwrap();
        assert!(status.is_mutual());
        assert!(!status.any_block());

        let status = query
            .get_relationship("a", "c", ReadConsistency::Strict)
            .await
            .unwrap();
        assert!(status.a_muted_b);
        assert!(!status.a_follows_b);
    }

    #[tokio::test]
    async fn relationship_reports_pending_flags() {
        let (query, store) = engine_with(&[]).await;
        store.set_private("b", true).await.unwrap();
        store.upsert_edge("a", "b", EdgeKind::Follow).await.unwrap();

        let status = query
            .get_relationship("a", "b", ReadConsistency::Strict)
            .await
            .unwrap();
        assert!(status.pending_outgoing);
        assert!(!status.a_follows_b);

        let reverse = query
            .get_relationship("b", "a", ReadConsistency::Strict)
            .await
            .unwrap();
        assert!(reverse.pending_incoming);
    }

    #[tokio::test]
    async fn followers_paginate_newest_first() {
        let followers: Vec<(String, String)> = (0..5).map(|i| (format!("u{}", i), "x".to_string())).collect();
        let pairs: Vec<(&str, &str)> = followers
            .iter()
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();
        let (query, _) = engine_with(&pairs).await;

        let first = query
            .list_followers("x", Some(2), None, ReadConsistency::Strict)
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 2);
        let cursor = first.next_cursor.clone().unwrap();

        let second = query
            .list_followers("x", Some(2), Some(&cursor), ReadConsistency::Strict)
            .await
            .unwrap();
        assert_eq!(second.entries.len(), 2);
        // No overlap between pages.
        for entry in &second.entries {
            assert!(!first.entries.iter().any(|e| e.user_id == entry.user_id));
        }

        let cursor = second.next_cursor.unwrap();
        let third = query
            .list_followers("x", Some(2), Some(&cursor), ReadConsistency::Strict)
            .await
            .unwrap();
        assert_eq!(third.entries.len(), 1);
        assert!(third.next_cursor.is_none());
    }

    #[tokio::test]
    async fn malformed_cursor_is_invalid_argument() {
        let (query, _) = engine_with(&[]).await;
        assert!(matches!(
            query
                .list_followers("x", Some(10), Some("???"), ReadConsistency::Strict)
                .await,
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn zero_limit_is_invalid_argument() {
        let (query, _) = engine_with(&[]).await;
        assert!(matches!(
            query
                .list_followers("x", Some(0), None, ReadConsistency::Strict)
                .await,
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn limit_is_clamped_to_maximum() {
        let (query, _) = engine_with(&[("a", "x"), ("b", "x")]).await;
        // Far over max_page_limit; accepted, just clamped.
        let page = query
            .list_followers("x", Some(100_000), None, ReadConsistency::Strict)
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 2);
    }

    #[tokio::test]
    async fn mutual_friends_intersects_both_followings() {
        let (query, _) = engine_with(&[
            ("a", "x"),
            ("a", "y"),
            ("a", "z"),
            ("b", "y"),
            ("b", "z"),
            ("b", "w"),
        ])
        .await;

        let page = query
            .list_mutual_friends("a", "b", Some(10), None, ReadConsistency::Strict)
            .await
            .unwrap();
        let mut ids: Vec<_> = page.entries.iter().map(|e| e.user_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["y", "z"]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn mutual_friends_exclude_the_pair_itself() {
        let (query, _) = engine_with(&[("a", "b"), ("b", "a"), ("a", "c"), ("b", "c")]).await;
        let page = query
            .list_mutual_friends("a", "b", Some(10), None, ReadConsistency::Strict)
            .await
            .unwrap();
        let ids: Vec<_> = page.entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[tokio::test]
    async fn mutual_friend_pages_resume_without_overlap() {
        let mut pairs = Vec::new();
        for i in 0..6 {
            pairs.push(("a".to_string(), format!("m{}", i)));
            pairs.push(("b".to_string(), format!("m{}", i)));
        }
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(s, t)| (s.as_str(), t.as_str())).collect();
        let (query, _) = engine_with(&refs).await;

        let first = query
            .list_mutual_friends("a", "b", Some(4), None, ReadConsistency::Strict)
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 4);
        let cursor = first.next_cursor.unwrap();

        let second = query
            .list_mutual_friends("a", "b", Some(4), Some(&cursor), ReadConsistency::Strict)
            .await
            .unwrap();
        assert_eq!(second.entries.len(), 2);
        for entry in &second.entries {
            assert!(!first.entries.iter().any(|e| e.user_id == entry.user_id));
        }
    }

    #[tokio::test]
    async fn bulk_relationship_validates_up_front() {
        let (query, _) = engine_with(&[("a", "b")]).await;
        // One bad id fails the whole call.
        let err = query
            .bulk_relationship(
                "a",
                &["b".to_string(), "a".to_string()],
                ReadConsistency::Strict,
            )
            .await;
        assert!(matches!(err, Err(GraphError::InvalidArgument(_))));

        let statuses = query
            .bulk_relationship(
                "a",
                &["b".to_string(), "c".to_string()],
                ReadConsistency::Strict,
            )
            .await
            .unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses["b"].a_follows_b);
        assert!(!statuses["c"].a_follows_b);
    }
}

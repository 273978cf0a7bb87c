// Copyright (c) SocialGraph Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{EdgeState, UserId};

/// Mutation operation carried by a [`MutationEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    Follow,
    FollowRequested,
    FollowApproved,
    Unfollow,
    Block,
    Unblock,
    Mute,
    Unmute,
}

/// Notification emitted once per committed edge change, in commit order.
///
/// Delivered synchronously to the in-process sinks (analytics, activity
/// feed) before the mutation call returns, and fanned out on the broadcast
/// bus for external real-time consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub source: UserId,
    pub target: UserId,
    pub op: MutationOp,
    pub state: EdgeState,
    /// Whether the opposite-direction ACTIVE follow edge exists at commit
    /// time. Lets counter sinks maintain mutual counts without read-backs.
    pub reciprocal: bool,
    /// True for follow removals forced by a block, rather than requested by
    /// the edge's owner.
    pub induced: bool,
    pub timestamp: DateTime<Utc>,
}

impl MutationEvent {
    pub fn new(source: &str, target: &str, op: MutationOp, state: EdgeState) -> Self {
        MutationEvent {
            source: source.to_string(),
            target: target.to_string(),
            op,
            state,
            reciprocal: false,
            induced: false,
            timestamp: Utc::now(),
        }
    }

    pub fn reciprocal(mut self, reciprocal: bool) -> Self {
        self.reciprocal = reciprocal;
        self
    }

    pub fn induced(mut self) -> Self {
        self.induced = true;
        self
    }
}

/// Synchronous consumer of committed mutations. Implementations must be
/// cheap: sinks run under the pair lock, before the mutation returns.
pub trait MutationSink: Send + Sync {
    fn on_event(&self, event: &MutationEvent);
}

/// Broadcast fan-out of mutation events for external collaborators
/// (push/streaming transports). Per-pair ordering matches commit order;
/// lagging receivers may miss events, which the at-least-once transport
/// layer handles by replay.
pub struct EventBus {
    sender: broadcast::Sender<MutationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: &MutationEvent) {
        // Send fails only when there are no subscribers; that is fine.
        if self.sender.send(event.clone()).is_err() {
            debug!(
                source = %event.source,
                target = %event.target,
                "no subscribers for mutation event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdgeState;

    #[tokio::test]
    async fn bus_delivers_in_publish_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(&MutationEvent::new("a", "b", MutationOp::Follow, EdgeState::Active));
        bus.publish(&MutationEvent::new("a", "b", MutationOp::Unfollow, EdgeState::Active));

        assert_eq!(rx.recv().await.unwrap().op, MutationOp::Follow);
        assert_eq!(rx.recv().await.unwrap().op, MutationOp::Unfollow);
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new(4);
        bus.publish(&MutationEvent::new("a", "b", MutationOp::Mute, EdgeState::Active));
    }

    #[test]
    fn events_serialize_with_snake_case_ops() {
        let event = MutationEvent::new("a", "b", MutationOp::FollowRequested, EdgeState::Pending);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["op"], "follow_requested");
        assert_eq!(json["state"], "pending");
        assert_eq!(json["reciprocal"], false);
    }
}

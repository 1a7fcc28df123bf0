use crate::error::StateError;
use crate::types::{RoomId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Event type of room membership changes.
pub const MEMBER_EVENT_TYPE: &str = "m.room.member";

/// Room membership state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Leave,
    Invite,
    Ban,
    Knock,
}

impl Membership {
    /// Parses a membership value, returning `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "join" => Some(Self::Join),
            "leave" => Some(Self::Leave),
            "invite" => Some(Self::Invite),
            "ban" => Some(Self::Ban),
            "knock" => Some(Self::Knock),
            _ => None,
        }
    }
}

/// A room event as handed over by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub room_id: RoomId,
    pub sender: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl RoomEvent {
    /// Builds an `m.room.member` event.
    pub fn membership_change(
        room_id: RoomId,
        sender: UserId,
        target: &UserId,
        membership: Membership,
    ) -> Self {
        Self {
            event_type: MEMBER_EVENT_TYPE.to_string(),
            room_id,
            sender,
            state_key: Some(target.as_str().to_string()),
            content: serde_json::json!({ "membership": membership }),
        }
    }

    /// Returns whether this is an `m.room.member` event.
    pub fn is_membership(&self) -> bool {
        self.event_type == MEMBER_EVENT_TYPE
    }

    /// Returns the `membership` field of the content, if recognised.
    pub fn membership(&self) -> Option<Membership> {
        self.content
            .get("membership")
            .and_then(serde_json::Value::as_str)
            .and_then(Membership::parse)
    }
}

/// Current room state, keyed by `(event_type, state_key)`.
pub type StateMap = HashMap<(String, String), RoomEvent>;

/// Returns the membership of `user` recorded in `state`, if any.
pub fn member_state(state: &StateMap, user: &UserId) -> Option<Membership> {
    state
        .get(&(MEMBER_EVENT_TYPE.to_string(), user.as_str().to_string()))
        .and_then(RoomEvent::membership)
}

/// Read-only access to the host's current room state.
#[async_trait]
pub trait RoomStateSource: Send + Sync {
    /// Returns the current state of a room.
    async fn room_state(&self, room: &RoomId) -> std::result::Result<StateMap, StateError>;
}

#[async_trait]
impl<T> RoomStateSource for std::sync::Arc<T>
where
    T: RoomStateSource + ?Sized,
{
    async fn room_state(&self, room: &RoomId) -> std::result::Result<StateMap, StateError> {
        (**self).room_state(room).await
    }
}

/// State source for hosts that expose no room state; every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRoomState;

#[async_trait]
impl RoomStateSource for NoRoomState {
    async fn room_state(&self, room: &RoomId) -> std::result::Result<StateMap, StateError> {
        Err(format!("room state unavailable for {room}").into())
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use crate::error::StateError;
use crate::state::{Membership, RoomEvent, RoomStateSource, StateMap};
use crate::types::{RoomId, UserId};

/// In-memory room state for tests and demos.
///
/// Rooms that were never written to are unknown, and looking them up fails
/// the same way a host lookup for a missing room would.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoomState {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    rooms: RwLock<HashMap<RoomId, StateMap>>,
    unavailable: RwLock<HashSet<RoomId>>,
}

impl MemoryRoomState {
    /// Creates an empty state source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a state event, replacing any event with the same type and state key.
    pub fn insert_event(&self, event: RoomEvent) {
        let key = (
            event.event_type.clone(),
            event.state_key.clone().unwrap_or_default(),
        );
        let mut guard = self.inner.rooms.write().expect("poisoned lock");
        guard
            .entry(event.room_id.clone())
            .or_default()
            .insert(key, event);
    }

    /// Records `user`'s own membership in a room.
    pub fn set_membership(&self, room: RoomId, user: UserId, membership: Membership) {
        self.insert_event(RoomEvent::membership_change(room, user.clone(), &user, membership));
    }

    /// Makes lookups for a room fail until [`MemoryRoomState::set_available`] is called.
    pub fn set_unavailable(&self, room: RoomId) {
        let mut guard = self.inner.unavailable.write().expect("poisoned lock");
        guard.insert(room);
    }

    /// Restores lookups for a room.
    pub fn set_available(&self, room: &RoomId) {
        let mut guard = self.inner.unavailable.write().expect("poisoned lock");
        guard.remove(room);
    }
}

#[async_trait]
impl RoomStateSource for MemoryRoomState {
    async fn room_state(&self, room: &RoomId) -> std::result::Result<StateMap, StateError> {
        if self
            .inner
            .unavailable
            .read()
            .expect("poisoned lock")
            .contains(room)
        {
            return Err(format!("room state temporarily unavailable for {room}").into());
        }
        let guard = self.inner.rooms.read().expect("poisoned lock");
        guard
            .get(room)
            .cloned()
            .ok_or_else(|| format!("unknown room {room}").into())
    }
}

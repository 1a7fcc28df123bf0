use crate::config::RestrictionConfig;
use crate::error::{Error, Result};
use crate::state::{Membership, RoomEvent, StateMap};
use crate::types::UserId;
use tracing::info;

/// Blocks local users from leaving restricted rooms and from deactivating themselves.
#[derive(Debug, Clone)]
pub struct RestrictionGate {
    config: RestrictionConfig,
    server_name: String,
}

impl RestrictionGate {
    /// Creates a gate for the homeserver named `server_name`.
    pub fn new(config: RestrictionConfig, server_name: impl AsRef<str>) -> Self {
        Self {
            config,
            server_name: server_name.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// Returns the active config.
    pub fn config(&self) -> &RestrictionConfig {
        &self.config
    }

    /// Returns whether `user` belongs to this homeserver.
    pub fn is_mine(&self, user: &UserId) -> bool {
        user.domain() == self.server_name
    }

    /// Returns the event unchanged, or rejects a local user leaving a restricted room.
    ///
    /// Only self-leaves are blocked; kicks, bans and remote users pass.
    pub fn check_event_allowed(&self, event: RoomEvent, _state: &StateMap) -> Result<RoomEvent> {
        if !event.is_membership() || event.membership() != Some(Membership::Leave) {
            return Ok(event);
        }
        if !self.config.is_restricted(&event.room_id) {
            return Ok(event);
        }
        let self_leave = event.state_key.as_deref() == Some(event.sender.as_str());
        if self_leave && self.is_mine(&event.sender) {
            info!(
                user = %event.sender,
                room = %event.room_id,
                "blocked leave from restricted room"
            );
            return Err(Error::Forbidden {
                message: self.config.leave_error_message().to_string(),
            });
        }
        Ok(event)
    }

    /// Only admins may deactivate accounts.
    pub fn can_deactivate_user(&self, _user: &UserId, by_admin: bool) -> bool {
        by_admin
    }
}

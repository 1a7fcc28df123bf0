use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A capability that rules and the default-deny set can grant or withhold.
///
/// The set is closed: names outside it are rejected when parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Permission {
    /// Create a new room.
    CreateRoom,
    /// Invite other users into rooms.
    Invite,
    /// Receive invites from users on a local homeserver.
    ReceiveInvites,
    /// Receive invites from users on any homeserver.
    ReceiveAllInvites,
    /// Invite anyone, skipping the invitee's receive policy.
    InviteAll,
    /// Join rooms without an invite.
    JoinRoom,
}

impl Permission {
    /// Every recognised permission, in declaration order.
    pub const ALL: [Permission; 6] = [
        Permission::CreateRoom,
        Permission::Invite,
        Permission::ReceiveInvites,
        Permission::ReceiveAllInvites,
        Permission::InviteAll,
        Permission::JoinRoom,
    ];

    /// Parses a permission name.
    ///
    /// This trims whitespace and normalizes to lowercase before looking the
    /// name up in the catalog.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let normalized = value.as_ref().trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == normalized)
            .ok_or_else(|| Error::UnrecognizedPermission(value.as_ref().to_string()))
    }

    /// Returns the configuration name of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRoom => "create_room",
            Self::Invite => "invite",
            Self::ReceiveInvites => "receive_invites",
            Self::ReceiveAllInvites => "receive_all_invites",
            Self::InviteAll => "invite_all",
            Self::JoinRoom => "join_room",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Permission {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

//! User permission and room restriction policy for Matrix homeservers.
//!
//! This crate renders allow/deny decisions for room creation, invites and
//! joins from an ordered list of administrator rules, and blocks local users
//! from leaving restricted rooms or deactivating their own accounts. It keeps
//! no state of its own; the only I/O is a read-only room state lookup that the
//! host provides through [`RoomStateSource`].
//!
//! Use [`Engine`] for the rule-based checks and [`RestrictionGate`] for the
//! leave and deactivation checks. [`UserRestrictionsModule`] and
//! [`RestrictionModule`] bind both to a host through [`ModuleApi`].
//!
//! # Examples
//!
//! Parsing a config and asking for an invite decision:
//! ```no_run
//! use matrix_user_restrictions::{
//!     EngineBuilder, NoRoomState, RoomId, UserId, UserRestrictionsConfig,
//! };
//! let config = UserRestrictionsConfig::from_toml_str(r#"
//! default_deny = ["invite"]
//! local_homeservers = ["example.org"]
//!
//! [[rules]]
//! match = "domain"
//! domain = "example.org"
//! allow = ["invite", "receive_invites"]
//! "#).unwrap();
//! let engine = EngineBuilder::new(NoRoomState).config(config).build().unwrap();
//! let inviter = UserId::try_from("@alice:example.org").unwrap();
//! let invitee = UserId::try_from("@bob:example.org").unwrap();
//! let room = RoomId::try_from("!room:example.org").unwrap();
//! assert!(engine.may_invite(&inviter, &invitee, &room));
//! ```
//!
//! Checking joins against in-memory room state (enable `memory-state`):
//! ```no_run
//! # #[cfg(feature = "memory-state")]
//! # {
//! use matrix_user_restrictions::{EngineBuilder, Membership, MemoryRoomState, RoomId, UserId};
//! let state = MemoryRoomState::new();
//! let room = RoomId::try_from("!room:example.org").unwrap();
//! let user = UserId::try_from("@alice:example.org").unwrap();
//! state.set_membership(room.clone(), user.clone(), Membership::Join);
//! let engine = EngineBuilder::new(state).build().unwrap();
//! let _ = engine.may_join_room(&user, &room, false);
//! # }
//! ```
#![forbid(unsafe_code)]

mod config;
mod engine;
mod error;
mod module;
mod permission;
mod restriction;
mod rule;
mod state;
mod types;

#[cfg(feature = "memory-state")]
mod memory_state;

pub use crate::config::{
    DEFAULT_LEAVE_ERROR_MESSAGE, RawRestrictionConfig, RawRule, RawUserRestrictionsConfig,
    RestrictionConfig, UserRestrictionsConfig,
};
pub use crate::engine::{Engine, EngineBuilder};
pub use crate::error::{Error, FORBIDDEN_ERRCODE, Result, StateError};
pub use crate::module::{
    ModuleApi, RestrictionModule, SpamCheckerCallbacks, ThirdPartyRulesCallbacks,
    UserRestrictionsModule,
};
pub use crate::permission::Permission;
pub use crate::restriction::RestrictionGate;
pub use crate::rule::{Matcher, Rule, RuleResult};
pub use crate::state::{
    MEMBER_EVENT_TYPE, Membership, NoRoomState, RoomEvent, RoomStateSource, StateMap, member_state,
};
pub use crate::types::{RoomId, UserId};

#[cfg(feature = "memory-state")]
pub use crate::memory_state::MemoryRoomState;

//! Host integration.
//!
//! The host implements [`ModuleApi`]; the `register` functions build the
//! policy objects from validated config and hand them to the host as callback
//! objects.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{RestrictionConfig, UserRestrictionsConfig};
use crate::engine::Engine;
use crate::error::Result;
use crate::restriction::RestrictionGate;
use crate::state::{RoomEvent, RoomStateSource, StateMap};
use crate::types::{RoomId, UserId};

/// Callbacks consulted before a user creates, invites to or joins a room.
#[async_trait]
pub trait SpamCheckerCallbacks: Send + Sync {
    async fn user_may_create_room(&self, user: &UserId) -> bool;

    async fn user_may_invite(&self, inviter: &UserId, invitee: &UserId, room: &RoomId) -> bool;

    async fn user_may_join_room(&self, user: &UserId, room: &RoomId, is_invited: bool) -> bool;
}

/// Callbacks consulted before an event is accepted or an account is deactivated.
#[async_trait]
pub trait ThirdPartyRulesCallbacks: Send + Sync {
    /// Returns the event unchanged, or a rejection the host answers with.
    async fn check_event_allowed(&self, event: RoomEvent, state: &StateMap) -> Result<RoomEvent>;

    async fn check_can_deactivate_user(&self, user: &UserId, by_admin: bool) -> bool;
}

/// Registration surface provided by the host.
pub trait ModuleApi {
    /// Name of the local homeserver.
    fn server_name(&self) -> &str;

    fn register_spam_checker_callbacks(&mut self, callbacks: Arc<dyn SpamCheckerCallbacks>);

    fn register_third_party_rules_callbacks(
        &mut self,
        callbacks: Arc<dyn ThirdPartyRulesCallbacks>,
    );
}

#[async_trait]
impl<S> SpamCheckerCallbacks for Engine<S>
where
    S: RoomStateSource,
{
    async fn user_may_create_room(&self, user: &UserId) -> bool {
        self.may_create_room(user)
    }

    async fn user_may_invite(&self, inviter: &UserId, invitee: &UserId, room: &RoomId) -> bool {
        self.may_invite(inviter, invitee, room)
    }

    async fn user_may_join_room(&self, user: &UserId, room: &RoomId, is_invited: bool) -> bool {
        self.may_join_room(user, room, is_invited).await
    }
}

#[async_trait]
impl ThirdPartyRulesCallbacks for RestrictionGate {
    async fn check_event_allowed(&self, event: RoomEvent, state: &StateMap) -> Result<RoomEvent> {
        RestrictionGate::check_event_allowed(self, event, state)
    }

    async fn check_can_deactivate_user(&self, user: &UserId, by_admin: bool) -> bool {
        self.can_deactivate_user(user, by_admin)
    }
}

/// Rule-based create/invite/join policy module.
pub struct UserRestrictionsModule;

impl UserRestrictionsModule {
    /// Builds the engine and registers it as the host's spam checker.
    pub fn register<S, A>(
        config: UserRestrictionsConfig,
        state: S,
        api: &mut A,
    ) -> Arc<Engine<S>>
    where
        S: RoomStateSource + 'static,
        A: ModuleApi + ?Sized,
    {
        let rules = config.rules().len();
        let engine = Arc::new(Engine::new(config, state));
        api.register_spam_checker_callbacks(engine.clone());
        info!(rules, server = api.server_name(), "user restrictions module registered");
        engine
    }
}

/// Leave-block and deactivation-guard module.
pub struct RestrictionModule;

impl RestrictionModule {
    /// Builds the gate for the host's server name and registers it.
    pub fn register<A>(config: RestrictionConfig, api: &mut A) -> Arc<RestrictionGate>
    where
        A: ModuleApi + ?Sized,
    {
        let restricted_rooms = config.restricted_rooms().len();
        let gate = Arc::new(RestrictionGate::new(config, api.server_name()));
        api.register_third_party_rules_callbacks(gate.clone());
        info!(restricted_rooms, server = api.server_name(), "restriction module registered");
        gate
    }
}

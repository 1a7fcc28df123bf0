use crate::config::UserRestrictionsConfig;
use crate::error::{Error, Result};
use crate::permission::Permission;
use crate::rule::{Rule, RuleResult};
use crate::state::{Membership, RoomStateSource, member_state};
use crate::types::{RoomId, UserId};
use tracing::{debug, warn};

/// Ordered rule evaluator with the invite, join and room-creation checks built on it.
///
/// Configuration is fixed at build time, so an engine can be shared behind an
/// `Arc` and queried concurrently.
#[derive(Debug)]
pub struct Engine<S> {
    config: UserRestrictionsConfig,
    state: S,
}

/// Builder for [`Engine`].
///
/// Rules and domains are checked when [`EngineBuilder::build`] runs, with the
/// same validation as [`UserRestrictionsConfig::new`].
pub struct EngineBuilder<S> {
    state: S,
    rules: Vec<Rule>,
    default_deny: Vec<Permission>,
    local_homeservers: Vec<String>,
}

impl<S> EngineBuilder<S> {
    /// Creates a builder with an empty config, which allows everything.
    pub fn new(state: S) -> Self {
        Self {
            state,
            rules: Vec::new(),
            default_deny: Vec::new(),
            local_homeservers: Vec::new(),
        }
    }

    /// Replaces the rules, default-deny set and local homeservers with a parsed config.
    pub fn config(mut self, config: UserRestrictionsConfig) -> Self {
        self.rules = config.rules().to_vec();
        self.default_deny = config.default_deny().iter().copied().collect();
        self.local_homeservers = config.local_homeservers().iter().cloned().collect();
        self
    }

    /// Appends a rule after the existing ones.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Denies a permission when no rule decides.
    pub fn default_deny(mut self, permission: Permission) -> Self {
        self.default_deny.push(permission);
        self
    }

    /// Marks a homeserver domain as local.
    pub fn local_homeserver(mut self, domain: impl AsRef<str>) -> Self {
        self.local_homeservers.push(domain.as_ref().to_string());
        self
    }

    /// Validates the collected config and builds the engine.
    ///
    /// Fails with [`Error::Config`] for a rule that both allows and denies a
    /// permission, or for a blank or malformed homeserver domain.
    pub fn build(self) -> Result<Engine<S>> {
        let config =
            UserRestrictionsConfig::new(self.rules, self.default_deny, self.local_homeservers)?;
        Ok(Engine::new(config, self.state))
    }
}

impl<S> Engine<S> {
    /// Creates an engine from an already validated config.
    pub fn new(config: UserRestrictionsConfig, state: S) -> Self {
        Self { config, state }
    }

    /// Returns the active config.
    pub fn config(&self) -> &UserRestrictionsConfig {
        &self.config
    }

    /// Applies the rules in order; the first rule that decides wins.
    ///
    /// When no rule decides, the permission is allowed unless it is in the
    /// default-deny set.
    pub fn apply_rules(&self, user: &UserId, permission: Permission) -> bool {
        for rule in self.config.rules() {
            match rule.apply(user, permission) {
                RuleResult::Allow => return true,
                RuleResult::Deny => return false,
                RuleResult::NoDecision => {}
            }
        }
        !self.config.default_deny().contains(&permission)
    }

    /// Like [`Engine::apply_rules`] for a permission given by name.
    ///
    /// Names outside the catalog fail with [`Error::UnrecognizedPermission`].
    pub fn try_apply_rules(&self, user: &UserId, permission: &str) -> Result<bool> {
        let permission = Permission::new(permission)?;
        Ok(self.apply_rules(user, permission))
    }

    /// Returns whether `user` may create a room.
    pub fn may_create_room(&self, user: &UserId) -> bool {
        self.apply_rules(user, Permission::CreateRoom)
    }

    /// Returns whether `inviter` may invite `invitee`.
    ///
    /// `_room` is accepted to match the host callback; no rule is scoped per room.
    pub fn may_invite(&self, inviter: &UserId, invitee: &UserId, _room: &RoomId) -> bool {
        if !self.apply_rules(inviter, Permission::Invite) {
            return false;
        }
        if self.apply_rules(inviter, Permission::InviteAll) {
            return true;
        }
        if self.apply_rules(invitee, Permission::ReceiveAllInvites) {
            return true;
        }
        if self.apply_rules(invitee, Permission::ReceiveInvites) {
            return self.is_local_homeserver(&inviter.domain());
        }
        false
    }

    /// Returns whether a lowercased domain is one of the local homeservers.
    pub fn is_local_homeserver(&self, domain: &str) -> bool {
        self.config.local_homeservers().contains(domain)
    }
}

impl<S> Engine<S>
where
    S: RoomStateSource,
{
    /// Returns whether `user` may join `room`.
    ///
    /// Users already joined are always allowed. Otherwise the join-room rule or
    /// an invite is enough. A failed state lookup counts as "not joined".
    pub async fn may_join_room(&self, user: &UserId, room: &RoomId, is_invited: bool) -> bool {
        debug!(user = %user, room = %room, is_invited, "checking join");
        match self.current_membership(user, room).await {
            Ok(Some(Membership::Join)) => {
                debug!(user = %user, room = %room, "already joined, allowing");
                return true;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    room = %room,
                    error = %err,
                    "state check failed, treating user as not joined"
                );
            }
        }

        let has_join_room = self.apply_rules(user, Permission::JoinRoom);
        let allowed = has_join_room || is_invited;
        debug!(user = %user, room = %room, has_join_room, is_invited, allowed, "join decision");
        allowed
    }

    async fn current_membership(&self, user: &UserId, room: &RoomId) -> Result<Option<Membership>> {
        let state = self.state.room_state(room).await.map_err(Error::from)?;
        Ok(member_state(&state, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use crate::rule::Matcher;
    use crate::state::{NoRoomState, RoomEvent, StateMap};
    use async_trait::async_trait;
    use futures::executor::block_on;

    #[derive(Default, Clone)]
    struct TestState {
        fail: bool,
        members: Vec<(UserId, Membership)>,
    }

    #[async_trait]
    impl RoomStateSource for TestState {
        async fn room_state(&self, room: &RoomId) -> std::result::Result<StateMap, StateError> {
            if self.fail {
                return Err("state store offline".into());
            }
            Ok(self
                .members
                .iter()
                .map(|(user, membership)| {
                    let event =
                        RoomEvent::membership_change(room.clone(), user.clone(), user, *membership);
                    (
                        (event.event_type.clone(), user.as_str().to_string()),
                        event,
                    )
                })
                .collect())
        }
    }

    fn user(id: &str) -> UserId {
        UserId::try_from(id).unwrap()
    }

    fn room() -> RoomId {
        RoomId::try_from("!r:example.org").unwrap()
    }

    fn allow_user(id: &str, permissions: impl IntoIterator<Item = Permission>) -> Rule {
        Rule::new(Matcher::User(user(id))).allow(permissions)
    }

    #[test]
    fn build_should_reject_conflicting_rule() {
        let result = EngineBuilder::new(NoRoomState)
            .rule(
                Rule::new(Matcher::All)
                    .allow([Permission::Invite])
                    .deny([Permission::Invite]),
            )
            .build();

        let err = result.expect_err("must reject");
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("both allows and denies invite"));
    }

    #[test]
    fn build_should_reject_blank_local_homeserver() {
        let result = EngineBuilder::new(NoRoomState)
            .local_homeserver("   ")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn build_should_normalize_local_homeserver() {
        let engine = EngineBuilder::new(NoRoomState)
            .local_homeserver(" Example.ORG ")
            .build()
            .unwrap();
        assert!(engine.is_local_homeserver("example.org"));
        assert!(!engine.is_local_homeserver(""));
    }

    #[test]
    fn empty_rules_should_follow_default_deny() {
        let engine = EngineBuilder::new(NoRoomState)
            .default_deny(Permission::Invite)
            .default_deny(Permission::CreateRoom)
            .build()
            .unwrap();
        let alice = user("@alice:example.org");

        for permission in Permission::ALL {
            let denied_by_default =
                matches!(permission, Permission::Invite | Permission::CreateRoom);
            assert_eq!(engine.apply_rules(&alice, permission), !denied_by_default);
        }
    }

    #[test]
    fn first_matching_rule_should_win() {
        let x = user("@x:example.org");
        let engine = EngineBuilder::new(NoRoomState)
            .rule(Rule::new(Matcher::All).deny([Permission::CreateRoom]))
            .rule(allow_user("@x:example.org", [Permission::CreateRoom]))
            .build()
            .unwrap();

        assert!(!engine.apply_rules(&x, Permission::CreateRoom));
    }

    #[test]
    fn narrower_rule_first_should_carve_out_exception() {
        let x = user("@x:example.org");
        let y = user("@y:example.org");
        let engine = EngineBuilder::new(NoRoomState)
            .rule(allow_user("@x:example.org", [Permission::CreateRoom]))
            .rule(Rule::new(Matcher::All).deny([Permission::CreateRoom]))
            .build()
            .unwrap();

        assert!(engine.may_create_room(&x));
        assert!(!engine.may_create_room(&y));
    }

    #[test]
    fn no_decision_should_fall_through_to_later_rules() {
        let x = user("@x:example.org");
        let engine = EngineBuilder::new(NoRoomState)
            .rule(Rule::new(Matcher::All).allow([Permission::JoinRoom]))
            .rule(Rule::new(Matcher::domain("example.org", false)).deny([Permission::CreateRoom]))
            .build()
            .unwrap();

        assert!(!engine.apply_rules(&x, Permission::CreateRoom));
        assert!(engine.apply_rules(&x, Permission::JoinRoom));
    }

    #[test]
    fn explicit_allow_should_override_default_deny() {
        let engine = EngineBuilder::new(NoRoomState)
            .rule(Rule::new(Matcher::domain("example.org", false)).allow([Permission::Invite]))
            .default_deny(Permission::Invite)
            .build()
            .unwrap();

        assert!(engine.apply_rules(&user("@a:example.org"), Permission::Invite));
        assert!(!engine.apply_rules(&user("@a:other.org"), Permission::Invite));
    }

    #[test]
    fn try_apply_rules_should_reject_unknown_permission() {
        let engine = EngineBuilder::new(NoRoomState).build().unwrap();
        let alice = user("@alice:example.org");

        assert!(engine.try_apply_rules(&alice, "join_room").unwrap());
        let result = engine.try_apply_rules(&alice, "redact");
        assert!(matches!(result, Err(Error::UnrecognizedPermission(_))));
    }

    #[test]
    fn invite_should_deny_without_invite_permission() {
        let engine = EngineBuilder::new(NoRoomState)
            .rule(Rule::new(Matcher::User(user("@a:x"))).deny([Permission::Invite]))
            .rule(Rule::new(Matcher::All).allow([
                Permission::InviteAll,
                Permission::ReceiveAllInvites,
                Permission::ReceiveInvites,
            ]))
            .local_homeserver("x")
            .build()
            .unwrap();

        assert!(!engine.may_invite(&user("@a:x"), &user("@b:y"), &room()));
    }

    #[test]
    fn invite_all_should_bypass_invitee_checks() {
        let engine = EngineBuilder::new(NoRoomState)
            .rule(allow_user("@a:x", [Permission::Invite, Permission::InviteAll]))
            .default_deny(Permission::ReceiveInvites)
            .default_deny(Permission::ReceiveAllInvites)
            .build()
            .unwrap();

        assert!(engine.may_invite(&user("@a:x"), &user("@b:y"), &room()));
        assert!(engine.may_invite(&user("@a:x"), &user("@c:z"), &room()));
    }

    #[test]
    fn receive_all_invites_should_accept_remote_inviter() {
        let engine = EngineBuilder::new(NoRoomState)
            .rule(Rule::new(Matcher::All).allow([Permission::Invite]))
            .rule(allow_user("@b:y", [Permission::ReceiveAllInvites]))
            .default_deny(Permission::InviteAll)
            .default_deny(Permission::ReceiveAllInvites)
            .default_deny(Permission::ReceiveInvites)
            .build()
            .unwrap();

        assert!(engine.may_invite(&user("@a:remote.org"), &user("@b:y"), &room()));
        assert!(!engine.may_invite(&user("@a:remote.org"), &user("@c:y"), &room()));
    }

    #[test]
    fn receive_invites_should_require_local_inviter() {
        let engine = EngineBuilder::new(NoRoomState)
            .rule(Rule::new(Matcher::All).allow([Permission::Invite]))
            .rule(allow_user("@b:y", [Permission::ReceiveInvites]))
            .default_deny(Permission::InviteAll)
            .default_deny(Permission::ReceiveAllInvites)
            .default_deny(Permission::ReceiveInvites)
            .local_homeserver("x")
            .build()
            .unwrap();

        assert!(engine.may_invite(&user("@a:x"), &user("@b:y"), &room()));
        assert!(engine.may_invite(&user("@a:X"), &user("@b:y"), &room()));
        assert!(!engine.may_invite(&user("@a:z"), &user("@b:y"), &room()));
    }

    #[test]
    fn invite_should_deny_when_invitee_accepts_nothing() {
        let engine = EngineBuilder::new(NoRoomState)
            .default_deny(Permission::InviteAll)
            .default_deny(Permission::ReceiveAllInvites)
            .default_deny(Permission::ReceiveInvites)
            .local_homeserver("x")
            .build()
            .unwrap();

        assert!(!engine.may_invite(&user("@a:x"), &user("@b:x"), &room()));
    }

    #[test]
    fn invite_should_ignore_room() {
        let engine = EngineBuilder::new(NoRoomState)
            .default_deny(Permission::InviteAll)
            .build()
            .unwrap();
        let other_room = RoomId::try_from("!other:example.org").unwrap();

        assert_eq!(
            engine.may_invite(&user("@a:x"), &user("@b:y"), &room()),
            engine.may_invite(&user("@a:x"), &user("@b:y"), &other_room),
        );
    }

    #[test]
    fn join_should_allow_already_joined_user() {
        let alice = user("@alice:example.org");
        let state = TestState {
            fail: false,
            members: vec![(alice.clone(), Membership::Join)],
        };
        let engine = EngineBuilder::new(state)
            .default_deny(Permission::JoinRoom)
            .build()
            .unwrap();

        assert!(block_on(engine.may_join_room(&alice, &room(), false)));
    }

    #[test]
    fn join_should_not_treat_other_memberships_as_joined() {
        let alice = user("@alice:example.org");
        let state = TestState {
            fail: false,
            members: vec![(alice.clone(), Membership::Leave)],
        };
        let engine = EngineBuilder::new(state)
            .default_deny(Permission::JoinRoom)
            .build()
            .unwrap();

        assert!(!block_on(engine.may_join_room(&alice, &room(), false)));
        assert!(block_on(engine.may_join_room(&alice, &room(), true)));
    }

    #[test]
    fn join_should_fall_back_to_rules_when_lookup_fails() {
        let alice = user("@alice:example.org");
        let bob = user("@bob:example.org");
        let state = TestState {
            fail: true,
            members: vec![(alice.clone(), Membership::Join)],
        };
        let engine = EngineBuilder::new(state)
            .rule(allow_user("@bob:example.org", [Permission::JoinRoom]))
            .default_deny(Permission::JoinRoom)
            .build()
            .unwrap();

        assert!(!block_on(engine.may_join_room(&alice, &room(), false)));
        assert!(block_on(engine.may_join_room(&alice, &room(), true)));
        assert!(block_on(engine.may_join_room(&bob, &room(), false)));
    }

    #[test]
    fn join_should_allow_invited_user_despite_rules() {
        let alice = user("@alice:example.org");
        let engine = EngineBuilder::new(TestState::default())
            .rule(Rule::new(Matcher::All).deny([Permission::JoinRoom]))
            .build()
            .unwrap();

        assert!(!block_on(engine.may_join_room(&alice, &room(), false)));
        assert!(block_on(engine.may_join_room(&alice, &room(), true)));
    }
}

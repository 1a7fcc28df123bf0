//! Module configuration.
//!
//! Both modules parse a loosely typed `Raw*` form with serde, then validate it
//! into an immutable config. Every failure is reported as [`Error::Config`]
//! before any module object exists.

use crate::error::{Error, Result};
use crate::permission::Permission;
use crate::rule::{Matcher, Rule};
use crate::types::{RoomId, UserId};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;

/// Message shown to users who try to leave a restricted room.
pub const DEFAULT_LEAVE_ERROR_MESSAGE: &str = "You are not allowed to leave this room.";

/// Rule engine configuration as written by an administrator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawUserRestrictionsConfig {
    #[serde(default)]
    pub rules: Vec<RawRule>,
    #[serde(default)]
    pub default_deny: Vec<String>,
    #[serde(default)]
    pub local_homeservers: Vec<String>,
}

/// One rule entry; `match` selects the matcher kind.
///
/// Keys that do not belong to the selected kind are rejected, so a misspelled
/// `allow` or `deny` cannot silently turn into an empty list.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case", deny_unknown_fields)]
pub enum RawRule {
    User {
        user_id: String,
        #[serde(default)]
        allow: Vec<String>,
        #[serde(default)]
        deny: Vec<String>,
    },
    Domain {
        domain: String,
        #[serde(default)]
        include_subdomains: bool,
        #[serde(default)]
        allow: Vec<String>,
        #[serde(default)]
        deny: Vec<String>,
    },
    All {
        #[serde(default)]
        allow: Vec<String>,
        #[serde(default)]
        deny: Vec<String>,
    },
}

/// Validated rule engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRestrictionsConfig {
    rules: Vec<Rule>,
    default_deny: HashSet<Permission>,
    local_homeservers: HashSet<String>,
}

impl UserRestrictionsConfig {
    /// Creates a config from already-typed parts.
    ///
    /// Homeserver domains are trimmed and lowercased.
    pub fn new(
        rules: Vec<Rule>,
        default_deny: impl IntoIterator<Item = Permission>,
        local_homeservers: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        for (index, rule) in rules.iter().enumerate() {
            let conflicts = rule.conflicts();
            if !conflicts.is_empty() {
                return Err(Error::Config(format!(
                    "rule {index} both allows and denies {}",
                    join_names(&conflicts)
                )));
            }
        }
        let local_homeservers = local_homeservers
            .into_iter()
            .map(|domain| normalize_domain(domain.as_ref()))
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self {
            rules,
            default_deny: default_deny.into_iter().collect(),
            local_homeservers,
        })
    }

    /// Validates a raw config.
    pub fn from_raw(raw: RawUserRestrictionsConfig) -> Result<Self> {
        Self::validate_raw(raw).map_err(|err| {
            prefix_config_error(err, "Failed to parse user restrictions module config")
        })
    }

    fn validate_raw(raw: RawUserRestrictionsConfig) -> Result<Self> {
        let rules = raw
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| parse_rule(index, rule))
            .collect::<Result<Vec<_>>>()?;
        let default_deny = parse_permissions(&raw.default_deny, "default_deny")?;
        Self::new(rules, default_deny, raw.local_homeservers)
    }

    /// Parses and validates a config from any serde data format.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self> {
        let raw = RawUserRestrictionsConfig::deserialize(deserializer).map_err(|err| {
            Error::Config(format!(
                "Failed to parse user restrictions module config: {err}"
            ))
        })?;
        Self::from_raw(raw)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let raw: RawUserRestrictionsConfig = toml::from_str(input).map_err(|err| {
            Error::Config(format!(
                "Failed to parse user restrictions module config: {err}"
            ))
        })?;
        Self::from_raw(raw)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Permissions denied when no rule decides.
    pub fn default_deny(&self) -> &HashSet<Permission> {
        &self.default_deny
    }

    /// Lowercased homeserver domains treated as local.
    pub fn local_homeservers(&self) -> &HashSet<String> {
        &self.local_homeservers
    }
}

fn parse_rule(index: usize, raw: RawRule) -> Result<Rule> {
    let (matcher, allow, deny) = match raw {
        RawRule::User {
            user_id,
            allow,
            deny,
        } => {
            let user = UserId::new(&user_id).map_err(|err| {
                Error::Config(format!("rule {index}: invalid user_id {user_id:?}: {err}"))
            })?;
            (Matcher::User(user), allow, deny)
        }
        RawRule::Domain {
            domain,
            include_subdomains,
            allow,
            deny,
        } => {
            let domain = normalize_domain(&domain)
                .map_err(|err| prefix_config_error(err, &format!("rule {index}")))?;
            let matcher = Matcher::Domain {
                domain,
                include_subdomains,
            };
            (matcher, allow, deny)
        }
        RawRule::All { allow, deny } => (Matcher::All, allow, deny),
    };
    let allow = parse_permissions(&allow, &format!("rule {index} allow"))?;
    let deny = parse_permissions(&deny, &format!("rule {index} deny"))?;
    Ok(Rule::new(matcher).allow(allow).deny(deny))
}

fn parse_permissions(names: &[String], field: &str) -> Result<Vec<Permission>> {
    names
        .iter()
        .map(|name| {
            Permission::new(name)
                .map_err(|_| Error::Config(format!("{field}: permission not recognised: {name:?}")))
        })
        .collect()
}

fn normalize_domain(domain: &str) -> Result<String> {
    let domain = domain.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return Err(Error::Config("domain must not be empty".to_string()));
    }
    if domain.chars().any(|ch| ch.is_whitespace() || ch == '@') {
        return Err(Error::Config(format!("invalid domain {domain:?}")));
    }
    Ok(domain)
}

fn join_names(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn prefix_config_error(err: Error, prefix: &str) -> Error {
    match err {
        Error::Config(message) => Error::Config(format!("{prefix}: {message}")),
        other => other,
    }
}

/// Restriction gate configuration as written by an administrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRestrictionConfig {
    #[serde(default)]
    pub restricted_rooms: Vec<String>,
    #[serde(default = "default_leave_error_message")]
    pub leave_error_message: String,
}

impl Default for RawRestrictionConfig {
    fn default() -> Self {
        Self {
            restricted_rooms: Vec::new(),
            leave_error_message: default_leave_error_message(),
        }
    }
}

fn default_leave_error_message() -> String {
    DEFAULT_LEAVE_ERROR_MESSAGE.to_string()
}

/// Validated restriction gate configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionConfig {
    restricted_rooms: HashSet<RoomId>,
    leave_error_message: String,
}

impl Default for RestrictionConfig {
    fn default() -> Self {
        Self {
            restricted_rooms: HashSet::new(),
            leave_error_message: default_leave_error_message(),
        }
    }
}

impl RestrictionConfig {
    /// Creates a config from typed room ids.
    pub fn new(
        restricted_rooms: impl IntoIterator<Item = RoomId>,
        leave_error_message: impl Into<String>,
    ) -> Self {
        Self {
            restricted_rooms: restricted_rooms.into_iter().collect(),
            leave_error_message: leave_error_message.into(),
        }
    }

    /// Validates a raw config.
    pub fn from_raw(raw: RawRestrictionConfig) -> Result<Self> {
        Self::validate_raw(raw)
            .map_err(|err| prefix_config_error(err, "Failed to parse restriction module config"))
    }

    fn validate_raw(raw: RawRestrictionConfig) -> Result<Self> {
        let restricted_rooms = raw
            .restricted_rooms
            .iter()
            .map(|room| {
                RoomId::new(room).map_err(|_| {
                    Error::Config(format!(
                        "Each entry in restricted_rooms must be a valid room ID \
                         starting with '!', got {room:?}"
                    ))
                })
            })
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self {
            restricted_rooms,
            leave_error_message: raw.leave_error_message,
        })
    }

    /// Parses and validates a config from any serde data format.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self> {
        let raw = RawRestrictionConfig::deserialize(deserializer).map_err(|err| {
            Error::Config(format!("Failed to parse restriction module config: {err}"))
        })?;
        Self::from_raw(raw)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let raw: RawRestrictionConfig = toml::from_str(input).map_err(|err| {
            Error::Config(format!("Failed to parse restriction module config: {err}"))
        })?;
        Self::from_raw(raw)
    }

    /// Rooms where local users may not leave on their own.
    pub fn restricted_rooms(&self) -> &HashSet<RoomId> {
        &self.restricted_rooms
    }

    /// Returns whether a room is restricted.
    pub fn is_restricted(&self, room: &RoomId) -> bool {
        self.restricted_rooms.contains(room)
    }

    /// Message returned when a leave is blocked.
    pub fn leave_error_message(&self) -> &str {
        &self.leave_error_message
    }
}

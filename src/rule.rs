use crate::permission::Permission;
use crate::types::UserId;
use std::collections::HashSet;

/// Outcome of evaluating a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleResult {
    /// The rule grants the permission.
    Allow,
    /// The rule withholds the permission.
    Deny,
    /// The rule has no opinion; evaluation falls through.
    NoDecision,
}

/// Selects which users a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Exactly one user.
    User(UserId),
    /// Users on a homeserver. `domain` is stored lowercased.
    Domain {
        domain: String,
        include_subdomains: bool,
    },
    /// Every user.
    All,
}

impl Matcher {
    /// Creates a domain matcher, normalizing the domain.
    pub fn domain(domain: impl AsRef<str>, include_subdomains: bool) -> Self {
        Self::Domain {
            domain: domain.as_ref().trim().to_ascii_lowercase(),
            include_subdomains,
        }
    }

    /// Returns whether `user` is selected by this matcher.
    pub fn matches(&self, user: &UserId) -> bool {
        match self {
            Self::User(expected) => expected == user,
            Self::Domain {
                domain,
                include_subdomains,
            } => {
                let user_domain = user.domain();
                if user_domain == *domain {
                    return true;
                }
                *include_subdomains
                    && user_domain
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
            Self::All => true,
        }
    }
}

/// A stateless matcher with the permissions it allows and denies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    matcher: Matcher,
    allow: HashSet<Permission>,
    deny: HashSet<Permission>,
}

impl Rule {
    /// Creates a rule with empty allow and deny sets.
    pub fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            allow: HashSet::new(),
            deny: HashSet::new(),
        }
    }

    /// Adds permissions this rule allows.
    pub fn allow(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.allow.extend(permissions);
        self
    }

    /// Adds permissions this rule denies.
    pub fn deny(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.deny.extend(permissions);
        self
    }

    /// Returns the matcher.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Returns permissions listed in both the allow and deny sets.
    pub fn conflicts(&self) -> Vec<Permission> {
        let mut conflicts: Vec<Permission> = self.allow.intersection(&self.deny).copied().collect();
        conflicts.sort();
        conflicts
    }

    /// Evaluates this rule for a user and permission.
    pub fn apply(&self, user: &UserId, permission: Permission) -> RuleResult {
        if !self.matcher.matches(user) {
            return RuleResult::NoDecision;
        }
        if self.allow.contains(&permission) {
            RuleResult::Allow
        } else if self.deny.contains(&permission) {
            RuleResult::Deny
        } else {
            RuleResult::NoDecision
        }
    }
}

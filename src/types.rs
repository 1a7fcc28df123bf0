use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_ID_LEN: usize = 255;

fn validate_sigil_id(value: &str, sigil: char, kind: &str) -> Result<String> {
    if value.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_ID_LEN}"
        )));
    }
    if !value.starts_with(sigil) {
        return Err(Error::InvalidId(format!("{kind} must start with '{sigil}'")));
    }
    if value.len() == sigil.len_utf8() {
        return Err(Error::InvalidId(format!("{kind} must not be only a sigil")));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Error::InvalidId(format!("{kind} contains whitespace")));
    }
    Ok(value.to_string())
}

fn validate_user_id(value: &str) -> Result<String> {
    let value = validate_sigil_id(value, '@', "user id")?;
    let Some((localpart, domain)) = value[1..].split_once(':') else {
        return Err(Error::InvalidId(
            "user id must be in @localpart:domain format".to_string(),
        ));
    };
    if localpart.is_empty() || domain.is_empty() {
        return Err(Error::InvalidId(
            "user id must not have empty segments".to_string(),
        ));
    }
    Ok(value)
}

fn validate_room_id(value: &str) -> Result<String> {
    validate_sigil_id(value, '!', "room id")
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $validate:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                $validate(value.as_ref()).map(Self)
            }

            /// Creates an identifier from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_id_type!(
    /// Matrix user identifier (`@localpart:domain`).
    UserId,
    validate_user_id
);
define_id_type!(
    /// Matrix room identifier (`!opaque`).
    RoomId,
    validate_room_id
);

impl UserId {
    /// Returns the server part of the id, lowercased.
    ///
    /// This is everything after the first `:`, so ports and IPv6 literals
    /// stay attached. Ids built with [`UserId::from_string`] that lack a `:`
    /// yield an empty domain.
    pub fn domain(&self) -> String {
        self.0
            .split_once(':')
            .map(|(_, domain)| domain.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Returns the localpart without the `@` sigil.
    pub fn localpart(&self) -> &str {
        let without_sigil = self.0.strip_prefix('@').unwrap_or(&self.0);
        without_sigil
            .split_once(':')
            .map_or(without_sigil, |(localpart, _)| localpart)
    }
}

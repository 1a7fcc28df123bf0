use thiserror::Error;

/// Room state lookup error type.
pub type StateError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Matrix error code attached to rejected events.
pub const FORBIDDEN_ERRCODE: &str = "M_FORBIDDEN";

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or malformed module configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Permission name outside the catalog.
    #[error("permission not recognised: {0:?}")]
    UnrecognizedPermission(String),
    /// Action rejected by policy.
    #[error("{message}")]
    Forbidden { message: String },
    /// Room state lookup failure.
    #[error("room state lookup failed: {0}")]
    State(#[source] StateError),
}

impl Error {
    /// HTTP status the host should answer with, if this error is a rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Forbidden { .. } => Some(403),
            _ => None,
        }
    }

    /// Matrix error code the host should answer with, if this error is a rejection.
    pub fn errcode(&self) -> Option<&'static str> {
        match self {
            Self::Forbidden { .. } => Some(FORBIDDEN_ERRCODE),
            _ => None,
        }
    }
}

impl From<StateError> for Error {
    fn from(error: StateError) -> Self {
        Self::State(error)
    }
}

use std::path::PathBuf;

use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- BackendError ----------------------------------------------------------

/// Failures raised while talking to the cache.
///
/// `NotFound` is the key-absent condition and is not a connection fault. Every
/// other variant coming out of `Connection::execute` poisons the connection
/// that produced it.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("key not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection closed by backend")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("backend error reply: {0}")]
    Server(String),

    #[error("backend handshake failed: {0}")]
    Auth(String),

    #[error("invalid backend address '{0}'")]
    InvalidAddress(String),

    #[error("connection pool closed")]
    PoolClosed,

    #[error("session worker is not running")]
    WorkerStopped,
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }

    /// True when the connection that produced this error must be replaced.
    pub fn poisons_connection(&self) -> bool {
        !self.is_not_found()
    }
}

// -----------------------------------------------------------------------------
// ----- CodecError ------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode session values: {0}")]
    Encode(String),

    #[error("failed to decode session payload: {0}")]
    Decode(String),
}

// -----------------------------------------------------------------------------
// ----- SessionError ----------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("request carries no '{name}' cookie")]
    CookieMissing { name: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Encode(#[from] CodecError),

    #[error("cookie '{name}' cannot be sent as a header")]
    InvalidCookie { name: String },

    #[error("unexpected reply to {action}")]
    UnexpectedReply { action: &'static str },
}

impl SessionError {
    /// True for the two lookups that simply mean "start a new session".
    pub fn is_new_session(&self) -> bool {
        match self {
            SessionError::CookieMissing { .. } => true,
            SessionError::Backend(err) => err.is_not_found(),
            _ => false,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ConfigError -----------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },

    #[error("invalid config: {0}")]
    Invalid(String),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------

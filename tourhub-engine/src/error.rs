//! Error taxonomy for the engine.
//!
//! Only [`EngineError::NotFound`] is meant to reach callers of the public
//! accessors; remote failures are absorbed into fallback responses.

use thiserror::Error;

use crate::module::cache::Tier;

/// Provider authentication failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("provider credentials are not configured")]
    MissingCredentials,

    #[error("provider rejected credentials (HTTP {0})")]
    Rejected(u16),

    #[error("authentication request failed: {0}")]
    Transport(String),

    #[error("authentication response was invalid: {0}")]
    InvalidResponse(String),
}

/// Failure of a single HTTP exchange with the provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Network(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Timeouts, connection errors and 5xx responses are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Timeout | TransportError::Network(_) => true,
            TransportError::Status(code) => *code >= 500,
            TransportError::Decode(_) => false,
        }
    }
}

/// Outcome of a logical fetch after retries
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("package {0} does not exist at the provider")]
    NotFound(String),

    #[error("provider rejected the request (HTTP {0})")]
    Rejected(u16),

    #[error("provider returned malformed data: {0}")]
    Malformed(String),

    #[error("provider unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: TransportError },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("load for {tier}/{key} was aborted before completing")]
    LoadAborted { tier: Tier, key: String },
}

/// Malformed keyword table entries. Offending entries are skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeywordError {
    #[error("keyword #{index} has no term")]
    MissingTerm { index: usize },

    #[error("keyword '{term}' has no weight")]
    MissingWeight { term: String },

    #[error("keyword '{term}' has a non-finite weight")]
    InvalidWeight { term: String },

    #[error("keyword '{term}' is listed twice for category '{category}'")]
    Duplicate { term: String, category: String },

    #[error("keyword #{index} could not be read: {reason}")]
    Unreadable { index: usize, reason: String },
}

/// Errors surfaced by the engine's public accessors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("package {0} not found")]
    NotFound(String),
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by provider implementations.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Connection failure or timeout while talking to the provider.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// Operation aborted by a cancellation signal.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this is a connection failure or timeout.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Whether this is a malformed-response error.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

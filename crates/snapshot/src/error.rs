use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error type for snapshot building.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The build was aborted by a cancellation signal before every
    /// per-address attempt resolved.
    #[error("snapshot build cancelled")]
    Cancelled,
}

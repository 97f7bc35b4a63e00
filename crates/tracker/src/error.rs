use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the tracker.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Discovery failed on the first tick; the tracker cannot start.
    #[error("initial discovery failed: {0}")]
    Discovery(#[from] fleetmon_provider::Error),
}

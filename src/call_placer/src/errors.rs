use thiserror::Error;

use crate::providers::errors::PlacerError;

/// The unified error type for the `call_placer` crate.
///
/// This is what [`CallPlacer::place`](crate::providers::CallPlacer::place)
/// returns: callers match on one type regardless of which backend produced
/// the fault.
#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from a placer implementation (e.g., transport
    /// failure, provider rejection).
    #[error(transparent)]
    Placer(#[from] PlacerError),

    /// An error related to configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

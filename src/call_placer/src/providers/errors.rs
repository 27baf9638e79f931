use thiserror::Error;

/// Errors that can occur within a `CallPlacer` implementation.
///
/// These are transport/infrastructure faults: the attempt never reached a
/// definite connected/not-connected outcome. Application-level call failures
/// are reported through `CallOutcome::NotConnected` instead.
#[derive(Debug, Error)]
pub enum PlacerError {
    /// The provider could not be reached (network failure, broker down).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The provider's API returned an error (e.g., invalid credentials).
    #[error("API error: {0}")]
    Api(String),

    /// The request was invalid for this specific provider.
    #[error("Invalid request for provider: {0}")]
    Validation(String),

    /// An internal error occurred while processing the attempt.
    #[error("Internal placer error: {0}")]
    Internal(String),
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One placement attempt handed to a [`CallPlacer`](crate::providers::CallPlacer).
///
/// The engine creates the audit log row first and passes its identifiers
/// along so a placer can correlate provider-side records with the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Identifier of the call log row recording this attempt.
    pub call_log_id: Uuid,
    /// Unique external identifier for the attempt, stored on the log for audit.
    pub external_call_id: String,
    /// The number being dialed, as stored on the phone number row.
    pub dialed_number: String,
}

/// Result of a placement attempt that the provider actually carried out.
///
/// A call that did not connect is still a *successful invocation* of the
/// placer; transport-level failures surface as the crate-level
/// [`Error`](crate::errors::Error) instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The call was placed and connected.
    Connected,
    /// The provider attempted the call but it did not connect.
    NotConnected {
        /// Provider-supplied reason (busy, no-answer, rejected, ...).
        reason: String,
    },
}

impl CallOutcome {
    /// True when the attempt connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, CallOutcome::Connected)
    }
}

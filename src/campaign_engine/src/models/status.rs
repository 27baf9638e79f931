//! Typed status values for constrained string columns.
//!
//! The schema constrains each status column with a CHECK; these enums are the
//! only path between those strings and the rest of the crate. The canonical
//! task value is "in-progress" (hyphenated) and parsing rejects anything
//! else, so a drifted spelling fails loudly at the boundary instead of
//! silently skipping rows.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A status string that does not match any canonical value.
#[derive(Debug, Error)]
#[error("unknown {kind} status: {value:?}")]
pub struct StatusParseError {
    /// Which status family was being parsed ("task", "call log", ...).
    pub kind: &'static str,
    /// The offending raw value.
    pub value: String,
}

/// Lifecycle state of a call task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Waiting for its `scheduled_at` instant.
    Pending,
    /// Claimed by a scheduler; being processed or orphaned.
    InProgress,
    /// Terminal: the call connected.
    Completed,
    /// Terminal: retries exhausted.
    Failed,
}

impl TaskStatus {
    /// Canonical database string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// True for the sticky terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl FromStr for TaskStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(StatusParseError {
                kind: "task",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a call log (one placement attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallLogStatus {
    /// Log row created; the placer has not been invoked yet.
    Initiated,
    /// The placer is on the wire.
    InProgress,
    /// Terminal: the attempt connected.
    Completed,
    /// Terminal: the attempt did not connect.
    Failed,
}

impl CallLogStatus {
    /// Canonical database string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            CallLogStatus::Initiated => "initiated",
            CallLogStatus::InProgress => "in-progress",
            CallLogStatus::Completed => "completed",
            CallLogStatus::Failed => "failed",
        }
    }
}

impl FromStr for CallLogStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(CallLogStatus::Initiated),
            "in-progress" => Ok(CallLogStatus::InProgress),
            "completed" => Ok(CallLogStatus::Completed),
            "failed" => Ok(CallLogStatus::Failed),
            other => Err(StatusParseError {
                kind: "call log",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CallLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validity state of a phone number row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhoneNumberStatus {
    /// Dialable.
    Valid,
    /// Known-bad number.
    Invalid,
    /// On a do-not-call list.
    DoNotCall,
}

impl PhoneNumberStatus {
    /// Canonical database string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            PhoneNumberStatus::Valid => "valid",
            PhoneNumberStatus::Invalid => "invalid",
            PhoneNumberStatus::DoNotCall => "do_not_call",
        }
    }
}

impl FromStr for PhoneNumberStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(PhoneNumberStatus::Valid),
            "invalid" => Ok(PhoneNumberStatus::Invalid),
            "do_not_call" => Ok(PhoneNumberStatus::DoNotCall),
            other => Err(StatusParseError {
                kind: "phone number",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PhoneNumberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived campaign state. Never stored; computed on demand from task rows
/// by [`crate::status::campaign_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    /// Paused flag set, or no tasks exist yet.
    Paused,
    /// Work remains pending or in flight.
    InProgress,
    /// Every task reached terminal `completed`.
    Completed,
    /// At least one task reached terminal `failed` (fail-visible policy).
    Failed,
}

impl CampaignStatus {
    /// Human-readable form, matching the task-status spellings.
    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Paused => "paused",
            CampaignStatus::InProgress => "in-progress",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! State-store gateway: typed, transactional access to campaign task rows.
//!
//! Every multi-row transition here is all-or-nothing, and every transition
//! out of `in-progress` is guarded on the row still being `in-progress`, so
//! replaying a terminal transition is a no-op rather than a double-count.
use chrono::{DateTime, Duration, Utc};
use diesel::SqliteConnection;

use crate::models::{CallTask, Campaign, NewCallLog, NewCallTask, PhoneNumber, Schedule};

pub mod repo;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while interacting with the store gateway.
pub enum GatewayError {
    #[error("call log not found: {id}")]
    /// Raised when a log transition targets a row that does not exist.
    MissingLog {
        /// The offending call log id.
        id: String,
    },
    #[error("task has unexpected status {status:?}")]
    /// Raised when a status string read from the store fails to parse.
    CorruptStatus {
        /// The raw status value.
        status: String,
    },
}

/// Result type used throughout the gateway for fallible operations.
pub type GatewayResult<T> = anyhow::Result<T>;

/// Coherent snapshot of a task and everything a worker needs to process it.
///
/// Loaded in a single joined query so callers never observe the task and its
/// campaign/schedule at different points in time.
#[derive(Debug, Clone)]
pub struct TaskBundle {
    /// The claimed task row.
    pub task: CallTask,
    /// Its campaign (concurrency cap, retry policy, counters).
    pub campaign: Campaign,
    /// The campaign's schedule (zone + window rules).
    pub schedule: Schedule,
    /// The number to dial.
    pub phone: PhoneNumber,
}

/// Per-status task counts for one campaign, from a single aggregate query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// Tasks waiting on their scheduled instant.
    pub pending: i64,
    /// Tasks currently claimed.
    pub in_progress: i64,
    /// Tasks at terminal `completed`.
    pub completed: i64,
    /// Tasks at terminal `failed`.
    pub failed: i64,
}

impl StatusCounts {
    /// Total tasks observed for the campaign.
    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

/// Portable surface; the SQLite implementation lives in `repo.rs`.
pub trait StoreGateway {
    /// Atomically claim up to `limit` due tasks of unpaused campaigns,
    /// flipping them `pending` -> `in-progress`. Tasks are due when
    /// `scheduled_at <= now + horizon`. Returns the claimed rows ordered by
    /// `(scheduled_at, id)`. This is the single serialization point between
    /// concurrent schedulers.
    fn claim_due(
        &self,
        conn: &mut SqliteConnection,
        limit: i64,
        horizon: Duration,
    ) -> GatewayResult<Vec<CallTask>>;

    /// Load the task + campaign + schedule + phone snapshot in one query.
    /// `None` when the task row is gone.
    fn load_bundle(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
    ) -> GatewayResult<Option<TaskBundle>>;

    /// Insert a task row and bump its campaign's `total_tasks`, in one
    /// transaction. Production rows come from the API; this is the shared
    /// write path for it and for test fixtures.
    fn insert_task(&self, conn: &mut SqliteConnection, task: &NewCallTask<'_>)
        -> GatewayResult<()>;

    /// Terminal success: log -> `completed` with `ended_at`, task ->
    /// `completed`, campaign `completed_tasks += 1`, one transaction.
    /// Returns `false` (and changes nothing) when the task was not
    /// `in-progress` — replaying a terminal transition is a no-op.
    fn complete_task(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
        call_log_id: &str,
    ) -> GatewayResult<bool>;

    /// Put a claimed task back to `pending` at a new instant without
    /// touching `retry_count`. The concurrency-denial path: no call was
    /// placed, so no attempt is consumed.
    fn reschedule_task(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
        new_scheduled_at: DateTime<Utc>,
    ) -> GatewayResult<bool>;

    /// Reschedule after a failed attempt: back to `pending`, task
    /// `retry_count += 1`, campaign `retries_attempted += 1`, one
    /// transaction.
    fn retry_task(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
        new_scheduled_at: DateTime<Utc>,
    ) -> GatewayResult<bool>;

    /// Terminal failure: task -> `failed`, campaign `failed_tasks += 1`,
    /// one transaction, guarded like [`StoreGateway::complete_task`].
    fn fail_task(&self, conn: &mut SqliteConnection, task_id: &str) -> GatewayResult<bool>;

    /// Append a call log row (one placement attempt).
    fn create_log(&self, conn: &mut SqliteConnection, log: &NewCallLog<'_>) -> GatewayResult<()>;

    /// Move a log to a non-terminal status (e.g. `in-progress` once the
    /// placer is invoked).
    fn update_log_status(
        &self,
        conn: &mut SqliteConnection,
        log_id: &str,
        status: crate::models::status::CallLogStatus,
    ) -> GatewayResult<()>;

    /// Move a log to a terminal status and stamp `ended_at`.
    fn finish_log(
        &self,
        conn: &mut SqliteConnection,
        log_id: &str,
        status: crate::models::status::CallLogStatus,
    ) -> GatewayResult<()>;

    /// Per-status task counts for a campaign, single GROUP BY query.
    fn aggregate_status(
        &self,
        conn: &mut SqliteConnection,
        campaign_id: &str,
    ) -> GatewayResult<StatusCounts>;

    /// Fetch one campaign row.
    fn load_campaign(
        &self,
        conn: &mut SqliteConnection,
        campaign_id: &str,
    ) -> GatewayResult<Option<Campaign>>;

    /// Reset `in-progress` tasks whose claim stamp is older than
    /// `older_than` back to `pending`, leaving `retry_count` untouched.
    /// Returns how many rows were reclaimed.
    fn reclaim_orphans(
        &self,
        conn: &mut SqliteConnection,
        older_than: Duration,
    ) -> GatewayResult<usize>;
}

//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`] for use with Diesel's Queryable/Insertable APIs:
//! - [`crate::schema::users`] — owner of every other row
//! - [`crate::schema::phone_numbers`] — dialable numbers, unique per user
//! - [`crate::schema::schedules`] — IANA time zone + JSON calling-window rules
//! - [`crate::schema::campaigns`] — execution parameters and counters
//! - [`crate::schema::call_tasks`] — the per-number unit of work
//! - [`crate::schema::call_logs`] — audit trail of placement attempts
//!
//! All ids are UUIDs stored as TEXT and all timestamps are RFC3339 UTC TEXT
//! (see [`crate::tz`]). Status columns are constrained strings; the typed
//! enums in [`status`] are the only way in and out of them.

pub mod status;

use diesel::prelude::*;

use crate::schema::*;

/// A row in [`crate::schema::users`]: parent of all other rows.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users, check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    /// UUID primary key (TEXT).
    pub id: String,
    /// Unique email address.
    pub email: String,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: String,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: String,
}

/// Insertable form of [`User`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    /// UUID primary key (TEXT).
    pub id: &'a str,
    /// Unique email address.
    pub email: &'a str,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: &'a str,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::phone_numbers`]: one dialable number.
///
/// `(user_id, number)` is unique; `status` is constrained to
/// "valid" | "invalid" | "do_not_call".
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = phone_numbers, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(User))]
pub struct PhoneNumber {
    /// UUID primary key (TEXT).
    pub id: String,
    /// FK to [`User::id`].
    pub user_id: String,
    /// The number in whatever dialable form the owner entered.
    pub number: String,
    /// Constrained status string; parse via [`status::PhoneNumberStatus`].
    pub status: String,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: String,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: String,
}

/// Insertable form of [`PhoneNumber`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = phone_numbers)]
pub struct NewPhoneNumber<'a> {
    /// UUID primary key (TEXT).
    pub id: &'a str,
    /// FK to [`User::id`].
    pub user_id: &'a str,
    /// The dialable number.
    pub number: &'a str,
    /// Initial status (typically "valid").
    pub status: &'a str,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: &'a str,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::schedules`]: a recurring calling window.
///
/// `schedule_rules` is a JSON document parsed and validated by
/// [`crate::schedule::ScheduleRules`]; nothing downstream reads it raw.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = schedules, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(User))]
pub struct Schedule {
    /// UUID primary key (TEXT).
    pub id: String,
    /// FK to [`User::id`].
    pub user_id: String,
    /// IANA time zone name, e.g. "America/New_York".
    pub time_zone: String,
    /// JSON rules document (days, start_time, end_time, exclude_holidays).
    pub schedule_rules: String,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: String,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: String,
}

/// Insertable form of [`Schedule`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schedules)]
pub struct NewSchedule<'a> {
    /// UUID primary key (TEXT).
    pub id: &'a str,
    /// FK to [`User::id`].
    pub user_id: &'a str,
    /// IANA time zone name.
    pub time_zone: &'a str,
    /// JSON rules document.
    pub schedule_rules: &'a str,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: &'a str,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::campaigns`]: execution parameters + counters.
///
/// The counters (`total_tasks`, `completed_tasks`, `failed_tasks`,
/// `retries_attempted`) are monotonically non-decreasing and only ever
/// written through the gateway's transactional transitions.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = campaigns, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Schedule))]
pub struct Campaign {
    /// UUID primary key (TEXT).
    pub id: String,
    /// FK to [`User::id`].
    pub user_id: String,
    /// FK to [`Schedule::id`].
    pub schedule_id: String,
    /// Paused campaigns are invisible to the claim query.
    pub is_paused: bool,
    /// Per-campaign in-flight call ceiling (>= 1).
    pub max_concurrent_calls: i32,
    /// Completed-but-failed attempts allowed per task (>= 0).
    pub max_retries: i32,
    /// Minimum delay before a failed attempt is retried (>= 0).
    pub retry_delay_seconds: i32,
    /// Number of tasks ever created under this campaign.
    pub total_tasks: i32,
    /// Number of tasks that reached terminal `completed`.
    pub completed_tasks: i32,
    /// Number of tasks that reached terminal `failed`.
    pub failed_tasks: i32,
    /// Number of place-failure retries across all tasks.
    pub retries_attempted: i32,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: String,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: String,
}

/// Insertable form of [`Campaign`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = campaigns)]
pub struct NewCampaign<'a> {
    /// UUID primary key (TEXT).
    pub id: &'a str,
    /// FK to [`User::id`].
    pub user_id: &'a str,
    /// FK to [`Schedule::id`].
    pub schedule_id: &'a str,
    /// Whether the campaign starts paused (the default).
    pub is_paused: bool,
    /// Per-campaign in-flight call ceiling (>= 1).
    pub max_concurrent_calls: i32,
    /// Completed-but-failed attempts allowed per task (>= 0).
    pub max_retries: i32,
    /// Minimum delay before a failed attempt is retried (>= 0).
    pub retry_delay_seconds: i32,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: &'a str,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::call_tasks`]: the per-number unit of work.
///
/// Owned by the execution plane from creation. `pending` and `in-progress`
/// are live states; `completed` and `failed` are sticky terminals.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = call_tasks, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Campaign))]
#[diesel(belongs_to(PhoneNumber))]
pub struct CallTask {
    /// UUID primary key (TEXT).
    pub id: String,
    /// FK to [`User::id`].
    pub user_id: String,
    /// FK to [`Campaign::id`].
    pub campaign_id: String,
    /// FK to [`PhoneNumber::id`]; unique per campaign.
    pub phone_number_id: String,
    /// Constrained status string; parse via [`status::TaskStatus`].
    pub status: String,
    /// Next activation instant in RFC3339 UTC.
    pub scheduled_at: String,
    /// Completed attempts that failed (never bumped by concurrency denials).
    pub retry_count: i32,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: String,
    /// Row update timestamp in RFC3339 UTC; the claim stamp, which the
    /// orphan sweep compares against its age threshold.
    pub updated_at: String,
}

/// Insertable form of [`CallTask`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = call_tasks)]
pub struct NewCallTask<'a> {
    /// UUID primary key (TEXT).
    pub id: &'a str,
    /// FK to [`User::id`].
    pub user_id: &'a str,
    /// FK to [`Campaign::id`].
    pub campaign_id: &'a str,
    /// FK to [`PhoneNumber::id`].
    pub phone_number_id: &'a str,
    /// Initial status (typically "pending").
    pub status: &'a str,
    /// First activation instant in RFC3339 UTC.
    pub scheduled_at: &'a str,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: &'a str,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::call_logs`]: one placement attempt.
///
/// `external_call_id` is unique across all logs; `phone_number_id` is
/// `ON DELETE RESTRICT` so the audit trail outlives nothing it refers to.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = call_logs, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(CallTask))]
pub struct CallLog {
    /// UUID primary key (TEXT).
    pub id: String,
    /// FK to [`User::id`].
    pub user_id: String,
    /// FK to [`CallTask::id`].
    pub call_task_id: String,
    /// FK to [`PhoneNumber::id`] (RESTRICT).
    pub phone_number_id: String,
    /// Number as dialed for this attempt.
    pub dialed_number: String,
    /// Unique provider-correlatable identifier for the attempt.
    pub external_call_id: String,
    /// Constrained status string; parse via [`status::CallLogStatus`].
    pub status: String,
    /// When the attempt started, RFC3339 UTC.
    pub started_at: Option<String>,
    /// When the attempt ended, RFC3339 UTC; >= started_at when both present.
    pub ended_at: Option<String>,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: String,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: String,
}

/// Insertable form of [`CallLog`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = call_logs)]
pub struct NewCallLog<'a> {
    /// UUID primary key (TEXT).
    pub id: &'a str,
    /// FK to [`User::id`].
    pub user_id: &'a str,
    /// FK to [`CallTask::id`].
    pub call_task_id: &'a str,
    /// FK to [`PhoneNumber::id`].
    pub phone_number_id: &'a str,
    /// Number as dialed for this attempt.
    pub dialed_number: &'a str,
    /// Unique provider-correlatable identifier for the attempt.
    pub external_call_id: &'a str,
    /// Initial status (typically "initiated").
    pub status: &'a str,
    /// When the attempt started, RFC3339 UTC.
    pub started_at: Option<&'a str>,
    /// Row creation timestamp in RFC3339 UTC.
    pub created_at: &'a str,
    /// Row update timestamp in RFC3339 UTC.
    pub updated_at: &'a str,
}

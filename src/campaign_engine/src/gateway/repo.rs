//! SQLite-backed implementation of the store gateway.
//!
//! This module exposes [`SqliteGateway`], the concrete implementation of
//! [`StoreGateway`](crate::gateway::StoreGateway). It handles:
//! - The atomic claim: select candidate ids in deterministic order, then
//!   flip them with a guarded UPDATE that re-checks `pending`, returning the
//!   rows actually won. Two schedulers racing over the same rows partition
//!   them; no task is claimed twice.
//! - Guarded terminal transitions (`completed` / `failed`) and reschedules,
//!   each bundled with its campaign counter bump in one immediate
//!   transaction.
//! - The call-log audit trail and the per-campaign aggregate count query.
//! - Orphan reclaim: claims older than a threshold go back to `pending`.
//!
//! All timestamps are written as RFC3339 UTC strings via [`crate::tz`];
//! `scheduled_at`/`updated_at` comparisons happen directly on those strings,
//! which order chronologically because the format is fixed-width UTC.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

use crate::gateway::{GatewayError, GatewayResult, StatusCounts, StoreGateway, TaskBundle};
use crate::models::status::{CallLogStatus, TaskStatus};
use crate::models::{CallTask, Campaign, NewCallLog, NewCallTask, PhoneNumber, Schedule};
use crate::schema::{call_logs, call_tasks, campaigns, phone_numbers, schedules};
use crate::tz;

/// Gateway over the relational store for campaign task state.
///
/// Stateless; connections are threaded through each call so ownership of
/// pooling stays with the process that drives the gateway.
pub struct SqliteGateway;

impl SqliteGateway {
    /// Creates a new SQLite-backed gateway.
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreGateway for SqliteGateway {
    fn claim_due(
        &self,
        conn: &mut SqliteConnection,
        limit: i64,
        horizon: Duration,
    ) -> GatewayResult<Vec<CallTask>> {
        use crate::schema::call_tasks::dsl as ct;

        if limit <= 0 {
            return Ok(vec![]);
        }

        let now = Utc::now();
        let now_s = tz::to_rfc3339_millis(now);
        let due_s = tz::to_rfc3339_millis(now + horizon);

        let mut claimed: Vec<CallTask> =
            conn.immediate_transaction::<_, anyhow::Error, _>(|tx| {
                // 1) Candidate ids: due, pending, campaign not paused, in
                //    deterministic (scheduled_at, id) order.
                let candidates: Vec<String> = ct::call_tasks
                    .inner_join(campaigns::table)
                    .filter(
                        campaigns::is_paused
                            .eq(false)
                            .and(ct::status.eq(TaskStatus::Pending.as_str()))
                            .and(ct::scheduled_at.le(&due_s)),
                    )
                    .order((ct::scheduled_at.asc(), ct::id.asc()))
                    .limit(limit)
                    .select(ct::id)
                    .load::<String>(tx)?;

                if candidates.is_empty() {
                    return Ok(Vec::new());
                }

                // 2) Flip them, re-checking `pending`; return the rows this
                //    claimer actually won.
                let rows = diesel::update(
                    ct::call_tasks.filter(
                        ct::id
                            .eq_any(&candidates)
                            .and(ct::status.eq(TaskStatus::Pending.as_str())),
                    ),
                )
                .set((
                    ct::status.eq(TaskStatus::InProgress.as_str()),
                    ct::updated_at.eq(&now_s),
                ))
                .returning(CallTask::as_returning())
                .get_results(tx)?;

                Ok(rows)
            })?;

        // UPDATE ... RETURNING row order is unspecified; restore claim order.
        claimed.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(claimed)
    }

    fn load_bundle(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
    ) -> GatewayResult<Option<TaskBundle>> {
        let row: Option<(CallTask, Campaign, Schedule, PhoneNumber)> = call_tasks::table
            .inner_join(campaigns::table.inner_join(schedules::table))
            .inner_join(phone_numbers::table)
            .filter(call_tasks::id.eq(task_id))
            .select((
                CallTask::as_select(),
                Campaign::as_select(),
                Schedule::as_select(),
                PhoneNumber::as_select(),
            ))
            .first(conn)
            .optional()?;

        Ok(row.map(|(task, campaign, schedule, phone)| TaskBundle {
            task,
            campaign,
            schedule,
            phone,
        }))
    }

    fn insert_task(
        &self,
        conn: &mut SqliteConnection,
        task: &NewCallTask<'_>,
    ) -> GatewayResult<()> {
        use crate::schema::campaigns::dsl as c;

        let now_s = tz::to_rfc3339_millis(Utc::now());
        conn.immediate_transaction::<_, anyhow::Error, _>(|tx| {
            diesel::insert_into(call_tasks::table)
                .values(task)
                .execute(tx)?;
            diesel::update(c::campaigns.find(task.campaign_id))
                .set((
                    c::total_tasks.eq(c::total_tasks + 1),
                    c::updated_at.eq(&now_s),
                ))
                .execute(tx)?;
            Ok(())
        })
    }

    fn complete_task(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
        call_log_id: &str,
    ) -> GatewayResult<bool> {
        use crate::schema::call_logs::dsl as cl;
        use crate::schema::call_tasks::dsl as ct;
        use crate::schema::campaigns::dsl as c;

        let now_s = tz::to_rfc3339_millis(Utc::now());
        conn.immediate_transaction::<_, anyhow::Error, _>(|tx| {
            let campaign_id: Option<String> = diesel::update(
                ct::call_tasks
                    .find(task_id)
                    .filter(ct::status.eq(TaskStatus::InProgress.as_str())),
            )
            .set((
                ct::status.eq(TaskStatus::Completed.as_str()),
                ct::updated_at.eq(&now_s),
            ))
            .returning(ct::campaign_id)
            .get_result(tx)
            .optional()?;

            // Not in-progress anymore: a replay or a foreign claim. Sticky
            // terminals make acking without changes safe.
            let Some(campaign_id) = campaign_id else {
                return Ok(false);
            };

            diesel::update(cl::call_logs.find(call_log_id))
                .set((
                    cl::status.eq(CallLogStatus::Completed.as_str()),
                    cl::ended_at.eq(Some(now_s.as_str())),
                    cl::updated_at.eq(&now_s),
                ))
                .execute(tx)?;

            diesel::update(c::campaigns.find(&campaign_id))
                .set((
                    c::completed_tasks.eq(c::completed_tasks + 1),
                    c::updated_at.eq(&now_s),
                ))
                .execute(tx)?;

            Ok(true)
        })
    }

    fn reschedule_task(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
        new_scheduled_at: DateTime<Utc>,
    ) -> GatewayResult<bool> {
        use crate::schema::call_tasks::dsl as ct;

        let now_s = tz::to_rfc3339_millis(Utc::now());
        let at_s = tz::to_rfc3339_millis(new_scheduled_at);
        let n = diesel::update(
            ct::call_tasks
                .find(task_id)
                .filter(ct::status.eq(TaskStatus::InProgress.as_str())),
        )
        .set((
            ct::status.eq(TaskStatus::Pending.as_str()),
            ct::scheduled_at.eq(&at_s),
            ct::updated_at.eq(&now_s),
        ))
        .execute(conn)?;
        Ok(n > 0)
    }

    fn retry_task(
        &self,
        conn: &mut SqliteConnection,
        task_id: &str,
        new_scheduled_at: DateTime<Utc>,
    ) -> GatewayResult<bool> {
        use crate::schema::call_tasks::dsl as ct;
        use crate::schema::campaigns::dsl as c;

        let now_s = tz::to_rfc3339_millis(Utc::now());
        let at_s = tz::to_rfc3339_millis(new_scheduled_at);
        conn.immediate_transaction::<_, anyhow::Error, _>(|tx| {
            let campaign_id: Option<String> = diesel::update(
                ct::call_tasks
                    .find(task_id)
                    .filter(ct::status.eq(TaskStatus::InProgress.as_str())),
            )
            .set((
                ct::status.eq(TaskStatus::Pending.as_str()),
                ct::scheduled_at.eq(&at_s),
                ct::retry_count.eq(ct::retry_count + 1),
                ct::updated_at.eq(&now_s),
            ))
            .returning(ct::campaign_id)
            .get_result(tx)
            .optional()?;

            let Some(campaign_id) = campaign_id else {
                return Ok(false);
            };

            diesel::update(c::campaigns.find(&campaign_id))
                .set((
                    c::retries_attempted.eq(c::retries_attempted + 1),
                    c::updated_at.eq(&now_s),
                ))
                .execute(tx)?;

            Ok(true)
        })
    }

    fn fail_task(&self, conn: &mut SqliteConnection, task_id: &str) -> GatewayResult<bool> {
        use crate::schema::call_tasks::dsl as ct;
        use crate::schema::campaigns::dsl as c;

        let now_s = tz::to_rfc3339_millis(Utc::now());
        conn.immediate_transaction::<_, anyhow::Error, _>(|tx| {
            let campaign_id: Option<String> = diesel::update(
                ct::call_tasks
                    .find(task_id)
                    .filter(ct::status.eq(TaskStatus::InProgress.as_str())),
            )
            .set((
                ct::status.eq(TaskStatus::Failed.as_str()),
                ct::updated_at.eq(&now_s),
            ))
            .returning(ct::campaign_id)
            .get_result(tx)
            .optional()?;

            let Some(campaign_id) = campaign_id else {
                return Ok(false);
            };

            diesel::update(c::campaigns.find(&campaign_id))
                .set((
                    c::failed_tasks.eq(c::failed_tasks + 1),
                    c::updated_at.eq(&now_s),
                ))
                .execute(tx)?;

            Ok(true)
        })
    }

    fn create_log(&self, conn: &mut SqliteConnection, log: &NewCallLog<'_>) -> GatewayResult<()> {
        diesel::insert_into(call_logs::table)
            .values(log)
            .execute(conn)?;
        Ok(())
    }

    fn update_log_status(
        &self,
        conn: &mut SqliteConnection,
        log_id: &str,
        status: CallLogStatus,
    ) -> GatewayResult<()> {
        use crate::schema::call_logs::dsl as cl;

        let now_s = tz::to_rfc3339_millis(Utc::now());
        let n = diesel::update(cl::call_logs.find(log_id))
            .set((cl::status.eq(status.as_str()), cl::updated_at.eq(&now_s)))
            .execute(conn)?;
        if n == 0 {
            return Err(GatewayError::MissingLog {
                id: log_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn finish_log(
        &self,
        conn: &mut SqliteConnection,
        log_id: &str,
        status: CallLogStatus,
    ) -> GatewayResult<()> {
        use crate::schema::call_logs::dsl as cl;

        let now_s = tz::to_rfc3339_millis(Utc::now());
        let n = diesel::update(cl::call_logs.find(log_id))
            .set((
                cl::status.eq(status.as_str()),
                cl::ended_at.eq(Some(now_s.as_str())),
                cl::updated_at.eq(&now_s),
            ))
            .execute(conn)?;
        if n == 0 {
            return Err(GatewayError::MissingLog {
                id: log_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn aggregate_status(
        &self,
        conn: &mut SqliteConnection,
        campaign_id: &str,
    ) -> GatewayResult<StatusCounts> {
        use crate::schema::call_tasks::dsl as ct;

        let rows: Vec<(String, i64)> = ct::call_tasks
            .filter(ct::campaign_id.eq(campaign_id))
            .group_by(ct::status)
            .select((ct::status, diesel::dsl::count_star()))
            .load(conn)?;

        let mut counts = StatusCounts::default();
        for (raw, n) in rows {
            let status: TaskStatus = raw.parse().map_err(|_| GatewayError::CorruptStatus {
                status: raw.clone(),
            })?;
            match status {
                TaskStatus::Pending => counts.pending = n,
                TaskStatus::InProgress => counts.in_progress = n,
                TaskStatus::Completed => counts.completed = n,
                TaskStatus::Failed => counts.failed = n,
            }
        }
        Ok(counts)
    }

    fn load_campaign(
        &self,
        conn: &mut SqliteConnection,
        campaign_id: &str,
    ) -> GatewayResult<Option<Campaign>> {
        let row = campaigns::table
            .find(campaign_id)
            .select(Campaign::as_select())
            .first(conn)
            .optional()?;
        Ok(row)
    }

    fn reclaim_orphans(
        &self,
        conn: &mut SqliteConnection,
        older_than: Duration,
    ) -> GatewayResult<usize> {
        use crate::schema::call_tasks::dsl as ct;

        let now = Utc::now();
        let now_s = tz::to_rfc3339_millis(now);
        let cutoff_s = tz::to_rfc3339_millis(now - older_than);

        let n = diesel::update(
            ct::call_tasks.filter(
                ct::status
                    .eq(TaskStatus::InProgress.as_str())
                    .and(ct::updated_at.lt(&cutoff_s)),
            ),
        )
        .set((
            ct::status.eq(TaskStatus::Pending.as_str()),
            ct::updated_at.eq(&now_s),
        ))
        .execute(conn)?;
        Ok(n)
    }
}

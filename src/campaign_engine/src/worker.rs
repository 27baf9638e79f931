//! Worker pool: executes claimed tasks against the placer.
//!
//! ## Shape
//! Dedicated OS threads, each with its own SQLite connection and its own
//! single-threaded tokio runtime for the async placer call. Threads block on
//! the dispatch queue with a short timeout so the shutdown flag is observed
//! promptly; the pool joins with a deadline and detaches stragglers, leaving
//! their tasks to the orphan sweep.
//!
//! ## Per-task state machine
//! LOAD the joined snapshot; a missing or no-longer-claimed row is acked
//! without changes (terminals are sticky). GATE a per-campaign slot; denial
//! reschedules to the next calling window without consuming an attempt.
//! Then RATE, LOG, PLACE under a deadline, and commit exactly one of:
//! completed, retry-reschedule, or failed. The gate slot is held by an RAII
//! guard, so it releases on every exit path.
//!
//! Placer transport errors are infrastructure failures: the log is closed
//! `failed` (at most one non-terminal log per task), the error propagates,
//! and the queue applies its bounded backoff. The task row stays
//! `in-progress` for the orphan sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use call_placer::models::call::{CallOutcome, CallRequest};
use call_placer::providers::CallPlacer;

use crate::db::connection::connect_sqlite;
use crate::dispatch::DispatchQueue;
use crate::gate::Gate;
use crate::gateway::repo::SqliteGateway;
use crate::gateway::{StoreGateway, TaskBundle};
use crate::models::status::{CallLogStatus, TaskStatus};
use crate::models::NewCallLog;
use crate::ratelimit::RateLimiter;
use crate::schedule::{self, ScheduleRules};
use crate::tz;

/// How long a worker blocks on the queue before re-checking shutdown.
const POP_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared handles a worker needs to process tasks.
pub struct WorkerEnv {
    /// Dispatch queue the pool consumes.
    pub queue: Arc<DispatchQueue>,
    /// Per-campaign concurrency gate.
    pub gate: Arc<Gate>,
    /// Host-wide placement rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// The telephony backend.
    pub placer: Arc<dyn CallPlacer>,
    /// Deadline imposed on each placer invocation; expiry counts as a
    /// failed attempt.
    pub placer_deadline: Duration,
    /// Database each worker opens its own connection to.
    pub database_url: String,
}

/// How one task left the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The row was gone or no longer claimed; acked without changes.
    Orphaned,
    /// Concurrency denied; rescheduled to the next window, no attempt used.
    Denied,
    /// The call connected; terminal `completed` committed.
    Completed,
    /// The attempt failed with retries remaining; rescheduled with a bump.
    Retried,
    /// Retries exhausted; terminal `failed` committed.
    Failed,
}

/// Pool of worker threads consuming the dispatch queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `count` worker threads over the shared environment.
    pub fn spawn(count: usize, env: Arc<WorkerEnv>) -> anyhow::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(count);

        for worker_id in 0..count {
            let env = Arc::clone(&env);
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("call-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &env, &shutdown))
                .with_context(|| format!("spawn worker {worker_id}"))?;
            workers.push(handle);
        }

        info!(worker_count = count, "worker pool started");
        Ok(Self { workers, shutdown })
    }

    /// Stop pulling new jobs and join workers, waiting up to `grace` in
    /// total. Workers that outlive the grace period are detached; their
    /// tasks will be reclaimed as orphans.
    pub fn shutdown(mut self, grace: Duration) {
        self.shutdown.store(true, Ordering::Release);
        let deadline = std::time::Instant::now() + grace;

        let workers = std::mem::take(&mut self.workers);
        let total = workers.len();
        let mut joined = 0usize;
        for worker in workers {
            let (tx, rx) = std::sync::mpsc::channel();
            let joiner = thread::spawn(move || {
                let ok = worker.join().is_ok();
                let _ = tx.send(ok);
            });

            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(true) => joined += 1,
                Ok(false) => warn!("worker panicked during drain"),
                Err(_) => {
                    warn!("worker did not drain in time; detaching");
                    continue;
                }
            }
            let _ = joiner.join();
        }
        info!(joined, total, "worker pool drained");
    }
}

fn worker_loop(worker_id: usize, env: &WorkerEnv, shutdown: &AtomicBool) {
    let mut conn = match connect_sqlite(&env.database_url) {
        Ok(conn) => conn,
        Err(e) => {
            warn!(worker_id, error = %e, "worker failed to open database; exiting");
            return;
        }
    };
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            warn!(worker_id, error = %e, "worker failed to build runtime; exiting");
            return;
        }
    };

    debug!(worker_id, "worker started");
    while !shutdown.load(Ordering::Acquire) {
        let Some(job) = env.queue.pop_blocking(POP_TIMEOUT) else {
            continue;
        };

        match process_task(&mut conn, &runtime, env, &job.task_id) {
            Ok(outcome) => {
                debug!(worker_id, task_id = %job.task_id, ?outcome, "task processed");
                env.queue.ack(&job.task_id);
            }
            Err(e) => {
                warn!(worker_id, task_id = %job.task_id, error = %e, "infrastructure error; nacking job");
                match env.queue.nack(job) {
                    Ok(outcome) => debug!(worker_id, ?outcome, "job nacked"),
                    Err(qe) => warn!(worker_id, error = %qe, "nack failed"),
                }
            }
        }
    }
    debug!(worker_id, "worker exiting");
}

/// Run the per-task state machine for one claimed task id.
///
/// `Ok` means the job is done from the queue's perspective (ack), whatever
/// became of the task; `Err` means infrastructure trouble and the job should
/// be retried at the queue level.
pub fn process_task(
    conn: &mut SqliteConnection,
    runtime: &tokio::runtime::Runtime,
    env: &WorkerEnv,
    task_id: &str,
) -> anyhow::Result<TaskOutcome> {
    let gateway = SqliteGateway::new();

    // LOAD: coherent task + campaign + schedule + phone snapshot.
    let Some(bundle) = gateway.load_bundle(conn, task_id)? else {
        warn!(task_id, "task row missing; acking");
        return Ok(TaskOutcome::Orphaned);
    };
    let status: TaskStatus = bundle.task.status.parse()?;
    if status != TaskStatus::InProgress {
        warn!(task_id, %status, "task no longer claimed; acking");
        return Ok(TaskOutcome::Orphaned);
    }

    let campaign = &bundle.campaign;

    // GATE: per-campaign slot, released on every exit path below.
    let Some(_slot) = env
        .gate
        .try_acquire(&campaign.id, campaign.max_concurrent_calls)
    else {
        let at = next_slot(&bundle, Utc::now())?;
        gateway.reschedule_task(conn, task_id, at)?;
        info!(
            task_id,
            campaign_id = %campaign.id,
            rescheduled_at = %tz::to_rfc3339_millis(at),
            "concurrency denied; rescheduled"
        );
        return Ok(TaskOutcome::Denied);
    };

    // RATE: host-wide calls/minute budget.
    env.limiter.acquire_blocking();

    // LOG: audit row for this attempt.
    let log_id = Uuid::new_v4().to_string();
    let external_call_id = format!("call-{}", Uuid::new_v4());
    let now_s = tz::to_rfc3339_millis(Utc::now());
    gateway.create_log(
        conn,
        &NewCallLog {
            id: &log_id,
            user_id: &bundle.task.user_id,
            call_task_id: task_id,
            phone_number_id: &bundle.phone.id,
            dialed_number: &bundle.phone.number,
            external_call_id: &external_call_id,
            status: CallLogStatus::Initiated.as_str(),
            started_at: Some(&now_s),
            created_at: &now_s,
            updated_at: &now_s,
        },
    )?;
    gateway.update_log_status(conn, &log_id, CallLogStatus::InProgress)?;
    info!(task_id, campaign_id = %campaign.id, %external_call_id, "placing call");

    // PLACE: under the engine's deadline; expiry is a failed attempt.
    let request = CallRequest {
        call_log_id: Uuid::parse_str(&log_id).context("log id is a uuid")?,
        external_call_id: external_call_id.clone(),
        dialed_number: bundle.phone.number.clone(),
    };
    let placed = runtime.block_on(async {
        tokio::time::timeout(env.placer_deadline, env.placer.place(request)).await
    });
    let outcome = match placed {
        Err(_) => Ok(CallOutcome::NotConnected {
            reason: "placer deadline exceeded".into(),
        }),
        Ok(res) => res,
    };

    match outcome {
        Ok(CallOutcome::Connected) => {
            gateway.complete_task(conn, task_id, &log_id)?;
            info!(task_id, campaign_id = %campaign.id, "call completed");
            Ok(TaskOutcome::Completed)
        }
        Ok(CallOutcome::NotConnected { reason }) => {
            gateway.finish_log(conn, &log_id, CallLogStatus::Failed)?;
            if bundle.task.retry_count < campaign.max_retries {
                // Honor the campaign's retry delay by pushing the window
                // search origin, so the slot is both delayed and valid.
                let origin =
                    Utc::now() + chrono::Duration::seconds(campaign.retry_delay_seconds.into());
                let at = next_slot(&bundle, origin)?;
                gateway.retry_task(conn, task_id, at)?;
                info!(
                    task_id,
                    campaign_id = %campaign.id,
                    %reason,
                    retry_count = bundle.task.retry_count + 1,
                    rescheduled_at = %tz::to_rfc3339_millis(at),
                    "place failed; retrying"
                );
                Ok(TaskOutcome::Retried)
            } else {
                gateway.fail_task(conn, task_id)?;
                warn!(
                    task_id,
                    campaign_id = %campaign.id,
                    %reason,
                    retry_count = bundle.task.retry_count,
                    "retries exhausted; task failed"
                );
                Ok(TaskOutcome::Failed)
            }
        }
        Err(placer_err) => {
            // Close the log so at most one non-terminal log exists per task,
            // then surface the infrastructure error to the queue.
            gateway.finish_log(conn, &log_id, CallLogStatus::Failed)?;
            Err(anyhow!(placer_err).context("placer transport failure"))
        }
    }
}

/// Next valid calling-window instant for the task's schedule.
fn next_slot(bundle: &TaskBundle, from: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let rules = ScheduleRules::from_json(&bundle.schedule.schedule_rules)?;
    schedule::next_valid(&rules, &bundle.schedule.time_zone, from).ok_or_else(|| {
        anyhow!(
            "no valid calling window within 14 days for schedule {}",
            bundle.schedule.id
        )
    })
}

//! Scheduler loop: claims due tasks and feeds the dispatch queue.
//!
//! A single thread ticking at a configurable period. Each tick reclaims
//! orphaned claims, then atomically claims up to a batch of due tasks and
//! bulk-enqueues their ids. The claim horizon is one period plus a minute of
//! look-ahead so no activation instant falls between ticks.
//!
//! Multiple replicas are safe: the gateway's guarded-update claim is the
//! serialization point, and the queue deduplicates ids that are already
//! live. Shutdown is cooperative; the loop finishes its current tick and
//! exits while in-flight workers drain independently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use diesel::SqliteConnection;
use tracing::{debug, info, warn};

use crate::db::connection::connect_sqlite;
use crate::dispatch::DispatchQueue;
use crate::gateway::repo::SqliteGateway;
use crate::gateway::StoreGateway;

/// Granularity at which the inter-tick sleep re-checks the shutdown flag.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Tunables for the loop.
#[derive(Debug, Clone)]
pub struct SchedulerParams {
    /// Tick period.
    pub period: Duration,
    /// Maximum tasks claimed per tick.
    pub batch_size: i64,
    /// Claim look-ahead window.
    pub horizon: chrono::Duration,
    /// Age after which an `in-progress` claim is reclaimed.
    pub orphan_threshold: chrono::Duration,
    /// Database the loop connects to.
    pub database_url: String,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Orphaned claims reset to `pending`.
    pub reclaimed: usize,
    /// Tasks claimed `pending` -> `in-progress`.
    pub claimed: usize,
    /// Ids accepted by the queue (claimed minus already-live dedups).
    pub enqueued: usize,
}

/// One scheduler tick: sweep orphans, claim due tasks, enqueue their ids.
pub fn tick(
    conn: &mut SqliteConnection,
    queue: &DispatchQueue,
    batch_size: i64,
    horizon: chrono::Duration,
    orphan_threshold: chrono::Duration,
) -> anyhow::Result<TickReport> {
    let gateway = SqliteGateway::new();

    let reclaimed = gateway.reclaim_orphans(conn, orphan_threshold)?;
    if reclaimed > 0 {
        warn!(reclaimed, "reset orphaned in-progress tasks");
    }

    let claimed_rows = gateway.claim_due(conn, batch_size, horizon)?;
    if claimed_rows.is_empty() {
        debug!("tick: nothing due");
        return Ok(TickReport {
            reclaimed,
            ..TickReport::default()
        });
    }

    let ids: Vec<String> = claimed_rows.iter().map(|t| t.id.clone()).collect();
    let enqueued = queue.enqueue_batch(&ids)?;
    info!(
        claimed = ids.len(),
        enqueued, "claimed batch enqueued for dispatch"
    );

    Ok(TickReport {
        reclaimed,
        claimed: ids.len(),
        enqueued,
    })
}

/// Handle to a running scheduler thread.
pub struct SchedulerHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Signal the loop to stop after its current tick and join it.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("scheduler thread panicked");
        }
    }
}

/// Spawn the scheduler loop on its own thread.
pub fn spawn(params: SchedulerParams, queue: Arc<DispatchQueue>) -> anyhow::Result<SchedulerHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let handle = std::thread::Builder::new()
        .name("call-scheduler".into())
        .spawn(move || run_loop(params, &queue, &flag))?;

    Ok(SchedulerHandle { handle, shutdown })
}

fn run_loop(params: SchedulerParams, queue: &DispatchQueue, shutdown: &AtomicBool) {
    let mut conn = match connect_sqlite(&params.database_url) {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "scheduler failed to open database; exiting");
            return;
        }
    };

    info!(period_secs = params.period.as_secs(), "scheduler started");
    while !shutdown.load(Ordering::Acquire) {
        match tick(
            &mut conn,
            queue,
            params.batch_size,
            params.horizon,
            params.orphan_threshold,
        ) {
            Ok(report) => debug!(?report, "scheduler tick"),
            Err(e) => warn!(error = %e, "scheduler tick failed"),
        }

        // Chunked sleep so shutdown is honored promptly.
        let mut slept = Duration::ZERO;
        while slept < params.period && !shutdown.load(Ordering::Acquire) {
            let slice = SLEEP_SLICE.min(params.period - slept);
            std::thread::sleep(slice);
            slept += slice;
        }
    }
    info!("scheduler stopped");
}

//! Durable dispatch queue between the scheduler and the worker pool.
//!
//! ## What this does
//! - Carries claimed task ids from the scheduler to workers, FIFO, persisted
//!   as a JSONL file so a restart resumes where the process left off.
//! - **Deduplicates** by task id: an id that is already enqueued or in
//!   flight (popped but not yet acked) is a live job, and re-enqueueing it
//!   is a no-op. The job identity *is* the task id.
//! - **Bounded transient retry**: a nacked job re-enters the queue with
//!   exponential backoff (`base * 2^attempt`) until its attempts are
//!   exhausted, then lands in a dead-letter file for operator attention.
//!   The underlying task row stays `in-progress`; the orphan sweep returns
//!   it to `pending` eventually, so dead-lettering never loses work.
//!
//! ## Durability model
//! The queue file is rewritten on every mutation of the pending set (the
//! pack-in/pack-out cost is trivial at the engine's batch sizes). A job that
//! was popped but not acked exists only in memory; losing it to a crash is
//! fine for the same orphan-sweep reason.

use std::collections::{HashSet, VecDeque};
use std::fs::{create_dir_all, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One queued unit of work: a claimed task id plus its transient-retry
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    /// The claimed task's id.
    pub task_id: String,
    /// Infrastructure-retry attempts consumed so far.
    pub attempt: u32,
    /// Earliest wall-clock instant (epoch ms) the job may be popped.
    pub available_at_ms: i64,
}

/// What happened to a nacked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// Requeued with backoff; will become poppable after the delay.
    Requeued {
        /// The applied backoff delay.
        delay: Duration,
    },
    /// Attempts exhausted; appended to the dead-letter file.
    DeadLettered,
}

/// Errors from queue persistence.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Filesystem failure on the queue directory or files.
    #[error("queue I/O: {0}")]
    Io(#[from] std::io::Error),
    /// A persisted line did not deserialize.
    #[error("queue record corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

struct QueueState {
    jobs: VecDeque<DispatchJob>,
    live: HashSet<String>,
    closed: bool,
}

/// Durable FIFO of task ids with dedup and bounded transient retry.
pub struct DispatchQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    dir: PathBuf,
    max_retries: u32,
    base_delay: Duration,
}

impl DispatchQueue {
    /// Open (or create) the queue rooted at `dir`, reloading any persisted
    /// jobs. `max_retries` bounds transient attempts per job; `base_delay`
    /// seeds the exponential backoff.
    pub fn open(
        dir: impl AsRef<Path>,
        max_retries: u32,
        base_delay: Duration,
    ) -> Result<Self, QueueError> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)?;

        let mut jobs = VecDeque::new();
        let mut live = HashSet::new();
        let path = dir.join("queue.jsonl");
        if path.exists() {
            let file = OpenOptions::new().read(true).open(&path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let job: DispatchJob = serde_json::from_str(&line)?;
                live.insert(job.task_id.clone());
                jobs.push_back(job);
            }
        }

        Ok(Self {
            state: Mutex::new(QueueState {
                jobs,
                live,
                closed: false,
            }),
            ready: Condvar::new(),
            dir,
            max_retries,
            base_delay,
        })
    }

    /// Enqueue a batch of task ids in one persistence round-trip, skipping
    /// ids that already have a live job. Returns how many were accepted.
    pub fn enqueue_batch(&self, task_ids: &[String]) -> Result<usize, QueueError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut state = self.lock();

        let mut accepted = 0;
        for task_id in task_ids {
            if !state.live.insert(task_id.clone()) {
                continue;
            }
            state.jobs.push_back(DispatchJob {
                task_id: task_id.clone(),
                attempt: 0,
                available_at_ms: now_ms,
            });
            accepted += 1;
        }

        if accepted > 0 {
            self.persist(&state)?;
            self.ready.notify_all();
        }
        Ok(accepted)
    }

    /// Pop the next due job, waiting up to `timeout`. Returns `None` on
    /// timeout or once the queue is closed and drained of due jobs.
    ///
    /// The popped job stays live until [`ack`](Self::ack) or
    /// [`nack`](Self::nack); its id cannot be re-enqueued in between.
    pub fn pop_blocking(&self, timeout: Duration) -> Option<DispatchJob> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            let now_ms = Utc::now().timestamp_millis();
            let due_idx = state
                .jobs
                .iter()
                .position(|j| j.available_at_ms <= now_ms);
            if let Some(job) = due_idx.and_then(|idx| state.jobs.remove(idx)) {
                // Ignore a persist failure here: the job is already owned by
                // the caller and the on-disk copy is a superset, which dedup
                // tolerates on reload.
                let _ = self.persist(&state);
                return Some(job);
            }

            if state.closed {
                return None;
            }

            let remaining = deadline.checked_duration_since(Instant::now())?;
            // Wake early if a backoff job becomes due before the timeout.
            let until_due = state
                .jobs
                .iter()
                .map(|j| j.available_at_ms.saturating_sub(now_ms).max(0) as u64)
                .min()
                .map(Duration::from_millis);
            let wait = match until_due {
                Some(d) => remaining.min(d),
                None => remaining,
            };

            let (next, timed_out) = self
                .ready
                .wait_timeout(state, wait)
                .unwrap_or_else(|e| e.into_inner());
            state = next;
            if timed_out.timed_out() && Instant::now() >= deadline {
                return None;
            }
        }
    }

    /// Acknowledge a processed job, freeing its task id for future claims.
    pub fn ack(&self, task_id: &str) {
        let mut state = self.lock();
        state.live.remove(task_id);
    }

    /// Report an infrastructure failure for a popped job. Requeues with
    /// exponential backoff until attempts are exhausted, then dead-letters.
    pub fn nack(&self, mut job: DispatchJob) -> Result<NackOutcome, QueueError> {
        let exhausted = job.attempt + 1 >= self.max_retries;
        let mut state = self.lock();

        if exhausted {
            state.live.remove(&job.task_id);
            drop(state);
            self.append_dead_letter(&job)?;
            return Ok(NackOutcome::DeadLettered);
        }

        let delay = self.base_delay * 2u32.saturating_pow(job.attempt);
        job.attempt += 1;
        job.available_at_ms = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        state.jobs.push_back(job);
        self.persist(&state)?;
        self.ready.notify_all();
        Ok(NackOutcome::Requeued { delay })
    }

    /// Close the queue: wake all blocked consumers so they can observe
    /// shutdown. Already-queued jobs stay on disk for the next run.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.ready.notify_all();
    }

    /// Number of jobs waiting in the queue (due or backing off).
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    /// True when no jobs are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live task ids (queued + in flight).
    pub fn live_len(&self) -> usize {
        self.lock().live.len()
    }

    /// Read back the dead-letter file.
    pub fn dead_letters(&self) -> Result<Vec<DispatchJob>, QueueError> {
        let path = self.dir.join("dead_letter.jsonl");
        if !path.exists() {
            return Ok(vec![]);
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &QueueState) -> Result<(), QueueError> {
        let path = self.dir.join("queue.jsonl");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        for job in &state.jobs {
            writeln!(file, "{}", serde_json::to_string(job)?)?;
        }
        Ok(())
    }

    fn append_dead_letter(&self, job: &DispatchJob) -> Result<(), QueueError> {
        let path = self.dir.join("dead_letter.jsonl");
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(job)?)?;
        Ok(())
    }
}

//! Dispatcher - orchestrates a collection run
//!
//! The dispatcher is responsible for:
//! - Creating the output sink and the work queue
//! - Starting the fixed worker pool
//! - Seeding the queue with every host
//! - Waiting on the all-done barrier (or cancellation)
//! - Joining workers, closing the sink and reporting results

use crate::collector::cancel::{AbortReason, CancelToken};
use crate::collector::queue::{WorkQueue, POLL_INTERVAL};
use crate::collector::sink::RecordSink;
use crate::collector::worker::{aggregate_stats, JobSpec, OutcomeCounts, Worker, WorkerContext};
use crate::credentials::Credentials;
use crate::error::{CollectorError, Result};
use crate::parse::ResponseParser;
use crate::session::SessionConnector;
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long an aborted run waits for in-flight workers before detaching them
pub const ABORT_JOIN_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Created, nothing started
    Idle,
    /// Spawning workers
    PoolStarting,
    /// Enqueuing hosts
    Dispatching,
    /// All hosts enqueued, waiting for the barrier
    Draining,
    /// Every host processed
    Complete,
    /// Stopped because a device rejected the credentials
    AbortedOnAuthFailure,
    /// Stopped by interrupt or output failure
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::PoolStarting => "pool-starting",
            RunState::Dispatching => "dispatching",
            RunState::Draining => "draining",
            RunState::Complete => "complete",
            RunState::AbortedOnAuthFailure => "aborted-on-auth-failure",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Result of a finished run
#[derive(Debug)]
pub struct CollectResult {
    /// Final state
    pub state: RunState,

    /// Hosts in the input list
    pub total_hosts: u64,

    /// Per-outcome counts
    pub outcomes: OutcomeCounts,

    /// Lines written to the output file
    pub records_written: u64,

    /// Hosts never handed to a worker
    pub unprocessed: u64,

    /// Why the run stopped early, if it did
    pub abort_reason: Option<AbortReason>,

    /// Workers that panicked or exited with an error
    pub worker_failures: Vec<String>,

    /// Workers still blocked when an aborted run gave up waiting
    pub detached_workers: usize,

    /// Wall time of the run
    pub duration: Duration,
}

impl CollectResult {
    /// Whether every host was processed
    pub fn completed(&self) -> bool {
        self.state == RunState::Complete
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct CollectProgress {
    /// Hosts in the input list
    pub total: u64,

    /// Hosts marked done
    pub done: u64,

    /// Hosts recorded
    pub succeeded: u64,

    /// Hosts failed
    pub failed: u64,

    /// Total workers
    pub workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl CollectProgress {
    /// Calculate hosts per second rate
    pub fn hosts_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.done as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates the worker pool for one run
pub struct Dispatcher {
    /// Shared worker resources
    ctx: WorkerContext,

    /// Pool size
    worker_count: usize,

    /// Host queue
    queue: WorkQueue,

    /// Worker threads
    workers: Vec<Worker>,

    /// Current run state
    state: Mutex<RunState>,
}

impl Dispatcher {
    /// Create a dispatcher; truncates the output file
    pub fn new(
        job: JobSpec,
        worker_count: usize,
        output_path: &Path,
        credentials: Credentials,
        connector: Arc<dyn SessionConnector>,
        parser: Arc<dyn ResponseParser>,
    ) -> Result<Self> {
        let cancel = CancelToken::new();
        let sink = RecordSink::create(output_path, cancel.clone())?;

        Ok(Self {
            ctx: WorkerContext {
                job: Arc::new(job),
                credentials: Arc::new(credentials),
                connector,
                parser,
                sink: Arc::new(sink),
                cancel,
            },
            worker_count: worker_count.max(1),
            queue: WorkQueue::new(),
            workers: Vec::new(),
            state: Mutex::new(RunState::Idle),
        })
    }

    /// Get a clone of the cancellation token (for signal handlers)
    pub fn cancel_token(&self) -> CancelToken {
        self.ctx.cancel.clone()
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    fn transition(&self, next: RunState) {
        let mut state = self.state.lock();
        let from = *state;
        self.ctx
            .sink
            .serialized(|| debug!(from = %from, to = %next, "Run state"));
        *state = next;
    }

    /// Run the collection over `hosts`
    ///
    /// `on_progress` is called from this thread roughly every 100ms while
    /// waiting for the pool.
    pub fn run<F>(mut self, hosts: Vec<String>, mut on_progress: F) -> Result<CollectResult>
    where
        F: FnMut(&CollectProgress),
    {
        let start_time = Instant::now();
        let total_hosts = hosts.len() as u64;

        info!(
            hosts = total_hosts,
            workers = self.worker_count,
            command = %self.ctx.job.command,
            "Starting collection"
        );

        self.transition(RunState::PoolStarting);
        if let Err(e) = self.spawn_workers() {
            self.ctx
                .sink
                .serialized(|| error!(error = %e, "Failed to start worker pool"));
            self.queue.close();
            self.join_workers(None);
            self.transition(RunState::Aborted);
            return Err(e);
        }

        // Workers are already pulling; they block on the empty queue
        self.transition(RunState::Dispatching);
        for host in hosts {
            if self.ctx.cancel.is_cancelled() {
                break;
            }
            if let Err(host) = self.queue.enqueue(host) {
                self.ctx
                    .sink
                    .serialized(|| warn!(host = %host, "Queue closed, host not dispatched"));
                break;
            }
        }

        self.transition(RunState::Draining);
        let completed = self.wait_for_completion(total_hosts, start_time, &mut on_progress);

        // Idle workers return from dequeue once the channel closes
        self.queue.close();

        // An aborted run does not wait out sessions stuck in network calls
        let deadline = self
            .ctx
            .cancel
            .is_cancelled()
            .then(|| Instant::now() + ABORT_JOIN_GRACE);
        let (worker_failures, detached_workers) = self.join_workers(deadline);
        let outcomes = aggregate_stats(&self.workers);
        self.workers.clear();

        let abort_reason = self.ctx.cancel.reason();
        let final_state = match &abort_reason {
            None if completed && worker_failures.is_empty() => RunState::Complete,
            Some(AbortReason::AuthFailed { .. }) => RunState::AbortedOnAuthFailure,
            _ => RunState::Aborted,
        };

        // Report once more so the display ends on the final counts
        on_progress(&CollectProgress {
            total: total_hosts,
            done: outcomes.processed(),
            succeeded: outcomes.succeeded,
            failed: outcomes.failed(),
            workers: self.worker_count,
            elapsed: start_time.elapsed(),
        });

        self.ctx.sink.close()?;
        self.transition(final_state);

        let duration = start_time.elapsed();
        let processed = outcomes.processed();

        let queue_stats = self.queue.stats();
        info!(
            state = %final_state,
            enqueued = queue_stats.enqueued(),
            completed = queue_stats.completed(),
            succeeded = outcomes.succeeded,
            failed = outcomes.failed(),
            duration_secs = duration.as_secs(),
            "Collection finished"
        );

        Ok(CollectResult {
            state: final_state,
            total_hosts,
            outcomes,
            records_written: self.ctx.sink.records_written(),
            unprocessed: total_hosts.saturating_sub(processed),
            abort_reason,
            worker_failures,
            detached_workers,
            duration,
        })
    }

    /// Spawn worker threads
    fn spawn_workers(&mut self) -> Result<()> {
        for id in 0..self.worker_count {
            let worker = Worker::spawn(id, self.ctx.clone(), self.queue.receiver())
                .map_err(CollectorError::Worker)?;
            self.workers.push(worker);
        }

        info!(count = self.workers.len(), "Workers spawned");
        Ok(())
    }

    /// Wait for the barrier or cancellation, reporting progress
    fn wait_for_completion<F>(&self, total: u64, start: Instant, on_progress: &mut F) -> bool
    where
        F: FnMut(&CollectProgress),
    {
        loop {
            if self.queue.wait_all_done_for(POLL_INTERVAL) {
                return true;
            }

            if self.ctx.cancel.is_cancelled() {
                if let Some(reason) = self.ctx.cancel.reason() {
                    let outstanding = self.queue.outstanding();
                    let queued = self.queue.len();
                    self.ctx.sink.serialized(|| {
                        warn!(reason = %reason, outstanding, queued, "Run cancelled")
                    });
                }
                return false;
            }

            // All workers gone with work outstanding: nothing will finish it
            if self.workers.iter().all(|w| w.is_finished()) {
                self.ctx
                    .sink
                    .serialized(|| error!("All workers have terminated unexpectedly"));
                return false;
            }

            let counts = aggregate_stats(&self.workers);
            on_progress(&CollectProgress {
                total,
                done: counts.processed(),
                succeeded: counts.succeeded,
                failed: counts.failed(),
                workers: self.worker_count,
                elapsed: start.elapsed(),
            });
        }
    }

    /// Join all worker threads, describing any abnormal exits
    ///
    /// With a deadline, workers still running when it passes are detached
    /// instead of joined. Returns the failures and the number detached.
    fn join_workers(&mut self, deadline: Option<Instant>) -> (Vec<String>, usize) {
        let mut failures = Vec::new();
        let mut detached = 0;

        for worker in &mut self.workers {
            if let Some(deadline) = deadline {
                while !worker.is_finished() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(10));
                }
                if !worker.is_finished() {
                    let id = worker.id();
                    self.ctx
                        .sink
                        .serialized(|| warn!(worker = id, "Worker still blocked, not waiting for it"));
                    worker.detach();
                    detached += 1;
                    continue;
                }
            }

            if let Err(e) = worker.join() {
                let id = worker.id();
                self.ctx
                    .sink
                    .serialized(|| warn!(worker = id, error = %e, "Worker failed"));
                failures.push(e.to_string());
            }
        }

        (failures, detached)
    }
}

//! Worker thread logic for parallel collection
//!
//! Each worker:
//! - Pulls one host at a time from the work queue
//! - Opens a session with the shared credentials
//! - Runs the configured command and parses the response
//! - Writes the extracted field to the shared sink
//! - Releases the session and marks the host done, on every path
//!
//! Timeouts, execution failures and extraction failures only affect the
//! host at hand. A rejected login cancels the whole run.

use crate::collector::cancel::{AbortReason, CancelToken};
use crate::collector::queue::WorkQueueReceiver;
use crate::collector::sink::{Record, RecordSink};
use crate::config::{CollectConfig, DeviceType};
use crate::credentials::Credentials;
use crate::error::{HostOutcome, SinkError, WorkerError};
use crate::parse::{extract_field, ResponseParser};
use crate::session::{ConnectParams, SessionConnector, SessionGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What every worker does to each host
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Command executed on each host
    pub command: String,

    /// Field extracted from the first parsed record
    pub field: String,

    /// Device type selector
    pub device_type: DeviceType,

    /// Management port
    pub port: u16,

    /// Session connect timeout
    pub connect_timeout: Duration,
}

impl From<&CollectConfig> for JobSpec {
    fn from(config: &CollectConfig) -> Self {
        Self {
            command: config.command.clone(),
            field: config.field.clone(),
            device_type: config.device_type,
            port: config.port,
            connect_timeout: config.connect_timeout,
        }
    }
}

/// Shared resources injected into every worker
#[derive(Clone)]
pub struct WorkerContext {
    /// Job description
    pub job: Arc<JobSpec>,

    /// Login credentials
    pub credentials: Arc<Credentials>,

    /// Session factory
    pub connector: Arc<dyn SessionConnector>,

    /// Response parser
    pub parser: Arc<dyn ResponseParser>,

    /// Output sink
    pub sink: Arc<RecordSink>,

    /// Run-wide cancellation
    pub cancel: CancelToken,
}

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Hosts whose field was written
    pub succeeded: AtomicU64,

    /// Hosts that could not be reached in time
    pub timed_out: AtomicU64,

    /// Hosts that rejected the credentials
    pub auth_failed: AtomicU64,

    /// Hosts where the command failed
    pub execution_failed: AtomicU64,

    /// Hosts whose response lacked the field
    pub extraction_failed: AtomicU64,

    /// Hosts dropped because the run was cancelled
    pub abandoned: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: &HostOutcome) {
        let counter = match outcome {
            HostOutcome::Success { .. } => &self.succeeded,
            HostOutcome::TimedOut { .. } => &self.timed_out,
            HostOutcome::AuthFailed { .. } => &self.auth_failed,
            HostOutcome::ExecutionFailed { .. } => &self.execution_failed,
            HostOutcome::ExtractionFailed { .. } => &self.extraction_failed,
            HostOutcome::Abandoned { .. } => &self.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Hosts that reached a per-host failure
    pub fn failed(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
            + self.auth_failed.load(Ordering::Relaxed)
            + self.execution_failed.load(Ordering::Relaxed)
            + self.extraction_failed.load(Ordering::Relaxed)
    }

    /// Hosts with any outcome
    pub fn processed(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed) + self.failed() + self.abandoned.load(Ordering::Relaxed)
    }
}

/// A worker thread that processes hosts
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<Result<(), WorkerError>>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: WorkerContext,
        queue_rx: WorkQueueReceiver,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("collector-{}", id))
            .spawn(move || worker_loop(id, ctx, queue_rx, stats_clone))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Check whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the worker to finish
    ///
    /// Stats stay readable afterwards; joining twice is a no-op.
    pub fn join(&mut self) -> Result<(), WorkerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(result) => result,
                Err(panic) => Err(WorkerError::Panicked {
                    id: self.id,
                    message: panic_message(panic.as_ref()),
                }),
            }
        } else {
            Ok(())
        }
    }

    /// Stop tracking a thread that is still running
    ///
    /// The thread keeps running until its current call returns; its stats
    /// stay readable.
    pub fn detach(&mut self) {
        if self.handle.take().is_some() {
            debug!(worker = self.id, "Worker detached");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Worker thread panicked".into()
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    ctx: WorkerContext,
    queue_rx: WorkQueueReceiver,
    stats: Arc<WorkerStats>,
) -> Result<(), WorkerError> {
    debug!(worker = id, "Worker starting");

    while let Some(task) = queue_rx.dequeue(&ctx.cancel) {
        let host = task.host().to_string();
        ctx.sink
            .serialized(|| info!(worker = id, host = %host, seq = task.seq(), "Acquired host"));

        let outcome = match process_host(&host, &ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                ctx.sink
                    .serialized(|| error!(worker = id, host = %host, error = %e, "Output write failed"));
                ctx.cancel.abort(AbortReason::SinkFailed {
                    reason: e.to_string(),
                });
                task.complete();
                return Err(WorkerError::Sink { id, source: e });
            }
        };
        stats.record(&outcome);

        match &outcome {
            HostOutcome::Success { field, .. } => {
                ctx.sink
                    .serialized(|| info!(worker = id, host = %host, value = %field, "Recorded"));
            }
            HostOutcome::TimedOut { reason, .. } => {
                ctx.sink
                    .serialized(|| warn!(worker = id, host = %host, reason = %reason, "Connection timed out"));
            }
            HostOutcome::AuthFailed { .. } => {
                ctx.sink.serialized(|| {
                    error!(worker = id, host = %host, "Authentication failed, stopping run")
                });
            }
            HostOutcome::ExecutionFailed { reason, .. } => {
                ctx.sink
                    .serialized(|| warn!(worker = id, host = %host, reason = %reason, "Command failed"));
            }
            HostOutcome::ExtractionFailed { reason, .. } => {
                ctx.sink.serialized(|| {
                    warn!(worker = id, host = %host, reason = %reason, "No value in response")
                });
            }
            HostOutcome::Abandoned { .. } => {
                debug!(worker = id, host = %host, "Host abandoned after cancellation");
            }
        }

        // Cancel before marking done so the barrier never reports success
        // for a run that hit a rejected login
        if matches!(outcome, HostOutcome::AuthFailed { .. }) {
            ctx.cancel.abort(AbortReason::AuthFailed { host });
        }

        task.complete();
    }

    debug!(
        worker = id,
        succeeded = stats.succeeded.load(Ordering::Relaxed),
        failed = stats.failed(),
        "Worker shutting down"
    );

    Ok(())
}

/// Run the full session lifecycle for one host
///
/// Only a sink failure is returned as an error; everything else is an
/// outcome for this host.
fn process_host(host: &str, ctx: &WorkerContext) -> Result<HostOutcome, SinkError> {
    // The token may have fired while this worker was blocked in dequeue
    if ctx.cancel.is_cancelled() {
        return Ok(HostOutcome::Abandoned {
            host: host.to_string(),
        });
    }

    let job = &ctx.job;
    let params = ConnectParams {
        host,
        port: job.port,
        device_type: job.device_type,
        credentials: &ctx.credentials,
        timeout: job.connect_timeout,
        cancel: &ctx.cancel,
    };

    let mut session = match ctx.connector.connect(&params) {
        Ok(session) => SessionGuard::new(host, session),
        Err(e) => return Ok(HostOutcome::from_session_error(host, &e)),
    };

    if ctx.cancel.is_cancelled() {
        return Ok(HostOutcome::Abandoned {
            host: host.to_string(),
        });
    }

    let raw = match session.execute(&job.command) {
        Ok(raw) => raw,
        Err(e) => return Ok(HostOutcome::from_session_error(host, &e)),
    };
    session.release();

    let records = ctx.parser.parse(&raw);
    let field = match extract_field(&records, &job.field) {
        Ok(field) => field,
        Err(e) => {
            return Ok(HostOutcome::ExtractionFailed {
                host: host.to_string(),
                reason: e.to_string(),
            })
        }
    };

    if !ctx.sink.append(&Record::new(host, field.clone()))? {
        return Ok(HostOutcome::Abandoned {
            host: host.to_string(),
        });
    }

    Ok(HostOutcome::Success {
        host: host.to_string(),
        field,
    })
}

/// Aggregate statistics from multiple workers
pub fn aggregate_stats(workers: &[Worker]) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();

    for worker in workers {
        let s = worker.stats();
        counts.succeeded += s.succeeded.load(Ordering::Relaxed);
        counts.timed_out += s.timed_out.load(Ordering::Relaxed);
        counts.auth_failed += s.auth_failed.load(Ordering::Relaxed);
        counts.execution_failed += s.execution_failed.load(Ordering::Relaxed);
        counts.extraction_failed += s.extraction_failed.load(Ordering::Relaxed);
        counts.abandoned += s.abandoned.load(Ordering::Relaxed);
    }

    counts
}

/// Per-outcome host counts across the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: u64,
    pub timed_out: u64,
    pub auth_failed: u64,
    pub execution_failed: u64,
    pub extraction_failed: u64,
    pub abandoned: u64,
}

impl OutcomeCounts {
    /// Hosts with a per-host failure
    pub fn failed(&self) -> u64 {
        self.timed_out + self.auth_failed + self.execution_failed + self.extraction_failed
    }

    /// Hosts with any outcome
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed() + self.abandoned
    }
}

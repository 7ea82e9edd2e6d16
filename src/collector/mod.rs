//! Parallel collection engine
//!
//! This module implements the fixed-size worker pool that drains a queue
//! of hosts.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │       Dispatcher        │
//!                     │  - seeds WorkQueue      │
//!                     │  - waits on all-done    │
//!                     └───────────┬─────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │  session  │             │  session  │             │  session  │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └─────────────────────────┼─────────────────────────┘
//!                                 ▼
//!                     ┌─────────────────────────┐
//!                     │       RecordSink        │
//!                     │  host,field per line    │
//!                     └─────────────────────────┘
//! ```

pub mod cancel;
pub mod dispatcher;
pub mod queue;
pub mod sink;
pub mod worker;

pub use cancel::{AbortReason, CancelToken};
pub use dispatcher::{CollectProgress, CollectResult, Dispatcher, RunState};
pub use queue::{HostTask, TaskGuard, WorkQueue, WorkQueueReceiver};
pub use sink::{Record, RecordSink};
pub use worker::{JobSpec, OutcomeCounts, Worker, WorkerContext};

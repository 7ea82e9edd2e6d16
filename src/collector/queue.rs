//! Host work queue with completion tracking
//!
//! Hosts travel over an unbounded crossbeam channel. Alongside the channel
//! the queue keeps an outstanding-work counter: `enqueue` raises it, and
//! every dequeued host lowers it exactly once when its [`TaskGuard`] is
//! completed or dropped. [`WorkQueue::wait_all_done`] blocks until the
//! counter reaches zero.
//!
//! Blocking calls poll in short slices so a [`CancelToken`] can stop them.

use crate::collector::cancel::CancelToken;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How often blocked callers re-check the cancellation token
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One host waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTask {
    /// Host identifier
    pub host: String,

    /// Position in the host list
    pub seq: usize,
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total hosts enqueued
    pub enqueued: AtomicU64,

    /// Total hosts handed to workers
    pub dequeued: AtomicU64,

    /// Total hosts marked done
    pub completed: AtomicU64,
}

impl QueueStats {
    /// Hosts marked done so far
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Hosts enqueued so far
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}

/// Outstanding-work counter shared by all handles
#[derive(Debug, Default)]
struct Pending {
    count: Mutex<u64>,
    all_done: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        if *count == 0 {
            warn!("mark_done called with no outstanding work");
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.all_done.notify_all();
        }
    }

    fn outstanding(&self) -> u64 {
        *self.count.lock()
    }

    fn wait_for(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return true;
        }
        self.all_done.wait_for(&mut count, timeout);
        *count == 0
    }
}

/// FIFO of hosts with an all-done barrier
pub struct WorkQueue {
    /// Sender for adding hosts; `None` once closed
    sender: Mutex<Option<Sender<HostTask>>>,

    /// Receiver cloned into every worker handle
    receiver: Receiver<HostTask>,

    /// Outstanding-work counter
    pending: Arc<Pending>,

    /// Queue statistics
    stats: Arc<QueueStats>,

    /// Next sequence number
    next_seq: AtomicU64,
}

impl WorkQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();

        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            pending: Arc::new(Pending::default()),
            stats: Arc::new(QueueStats::default()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Add one unit of outstanding work
    ///
    /// Returns the host back if the queue has been closed.
    pub fn enqueue(&self, host: impl Into<String>) -> Result<(), String> {
        let host = host.into();
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(host);
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) as usize;

        // Count before sending so the barrier never sees a transient zero
        self.pending.add();
        if let Err(e) = sender.send(HostTask { host, seq }) {
            self.pending.done();
            return Err(e.into_inner().host);
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Get a receiving handle (clone for each worker)
    pub fn receiver(&self) -> WorkQueueReceiver {
        WorkQueueReceiver {
            receiver: self.receiver.clone(),
            pending: Arc::clone(&self.pending),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Block until every enqueued host is marked done
    ///
    /// Returns `false` if the token fired first.
    pub fn wait_all_done(&self, cancel: &CancelToken) -> bool {
        loop {
            if self.wait_all_done_for(POLL_INTERVAL) {
                return true;
            }
            if cancel.is_cancelled() {
                return false;
            }
        }
    }

    /// Wait up to `timeout` for the outstanding count to reach zero
    pub fn wait_all_done_for(&self, timeout: Duration) -> bool {
        self.pending.wait_for(timeout)
    }

    /// Stop accepting hosts; idle workers return from `dequeue`
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Number of hosts not yet marked done
    pub fn outstanding(&self) -> u64 {
        self.pending.outstanding()
    }

    /// Number of hosts waiting in the channel
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if no hosts are waiting in the channel
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for receiving hosts from the queue
#[derive(Clone)]
pub struct WorkQueueReceiver {
    receiver: Receiver<HostTask>,
    pending: Arc<Pending>,
    stats: Arc<QueueStats>,
}

impl WorkQueueReceiver {
    /// Take the next host, blocking while the queue is empty
    ///
    /// Returns `None` once the token fires or the queue is closed and
    /// drained.
    pub fn dequeue(&self, cancel: &CancelToken) -> Option<TaskGuard> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(task) => {
                    self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                    return Some(TaskGuard {
                        task,
                        receiver: self.clone(),
                        done: false,
                    });
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn mark_done(&self) {
        self.stats.completed.fetch_add(1, Ordering::Relaxed);
        self.pending.done();
    }
}

/// A dequeued host; marks itself done exactly once
pub struct TaskGuard {
    task: HostTask,
    receiver: WorkQueueReceiver,
    done: bool,
}

impl TaskGuard {
    /// Host being processed
    pub fn host(&self) -> &str {
        &self.task.host
    }

    /// Position in the host list
    pub fn seq(&self) -> usize {
        self.task.seq
    }

    /// Mark the host done now
    pub fn complete(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.receiver.mark_done();
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_queue_basic() {
        let queue = WorkQueue::new();
        let cancel = CancelToken::new();

        queue.enqueue("10.0.0.1").unwrap();
        queue.enqueue("10.0.0.2").unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.outstanding(), 2);

        let receiver = queue.receiver();
        let first = receiver.dequeue(&cancel).unwrap();
        assert_eq!(first.host(), "10.0.0.1");
        assert_eq!(first.seq(), 0);

        // Dequeued but not done
        assert_eq!(queue.outstanding(), 2);
        first.complete();
        assert_eq!(queue.outstanding(), 1);
    }

    #[test]
    fn test_guard_marks_done_once() {
        let queue = WorkQueue::new();
        let cancel = CancelToken::new();
        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();

        let receiver = queue.receiver();
        let guard = receiver.dequeue(&cancel).unwrap();
        guard.complete();

        {
            let _guard = receiver.dequeue(&cancel).unwrap();
        }

        assert_eq!(queue.outstanding(), 0);
        assert_eq!(queue.stats().completed(), 2);
        assert!(queue.wait_all_done_for(Duration::from_millis(1)));
    }

    #[test]
    fn test_barrier_waits_for_workers() {
        let queue = Arc::new(WorkQueue::new());
        let cancel = CancelToken::new();
        for i in 0..50 {
            queue.enqueue(format!("host-{}", i)).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let receiver = queue.receiver();
                let cancel = cancel.clone();
                thread::spawn(move || {
                    let mut seen = 0;
                    while let Some(task) = receiver.dequeue(&cancel) {
                        seen += 1;
                        drop(task);
                    }
                    seen
                })
            })
            .collect();

        assert!(queue.wait_all_done(&cancel));
        queue.close();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
        assert_eq!(queue.stats().enqueued(), 50);
    }

    #[test]
    fn test_cancel_releases_blocked_callers() {
        let queue = Arc::new(WorkQueue::new());
        let cancel = CancelToken::new();
        queue.enqueue("never-processed").unwrap();

        let receiver = queue.receiver();
        let idle = {
            let cancel = cancel.clone();
            let receiver = receiver.clone();
            thread::spawn(move || {
                // Take the only host and hold it, then block on the empty queue
                let held = receiver.dequeue(&cancel);
                let next = receiver.dequeue(&cancel);
                (held, next.is_none())
            })
        };

        thread::sleep(Duration::from_millis(50));
        cancel.abort(crate::collector::cancel::AbortReason::Interrupted);

        let (held, idle_returned) = idle.join().unwrap();
        assert!(idle_returned);
        assert!(held.is_some());
        assert!(!queue.wait_all_done(&cancel));

        drop(held);
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_enqueue_after_close() {
        let queue = WorkQueue::new();
        queue.close();
        assert_eq!(queue.enqueue("late"), Err("late".to_string()));
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_close_wakes_idle_receiver() {
        let queue = WorkQueue::new();
        let receiver = queue.receiver();
        queue.close();
        assert!(receiver.dequeue(&CancelToken::new()).is_none());
    }
}

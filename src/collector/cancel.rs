//! Run-wide cancellation
//!
//! One [`CancelToken`] is shared by the dispatcher, every worker, the
//! output sink and the signal handler. The first abort wins and records
//! why the run stopped.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a run was cut short
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A device rejected the shared credentials
    AuthFailed { host: String },

    /// The output file could not be written
    SinkFailed { reason: String },

    /// Operator interrupt (Ctrl-C)
    Interrupted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::AuthFailed { host } => write!(f, "authentication failed for {}", host),
            AbortReason::SinkFailed { reason } => write!(f, "output write failed: {}", reason),
            AbortReason::Interrupted => f.write_str("interrupted"),
        }
    }
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    reason: Mutex<Option<AbortReason>>,
}

/// Shared cancellation flag with the reason for the first abort
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the run
    ///
    /// Returns `true` if this call triggered cancellation; later calls keep
    /// the original reason.
    pub fn abort(&self, reason: AbortReason) -> bool {
        let mut slot = self.state.reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.state.cancelled.store(true, Ordering::SeqCst);
        true
    }

    /// Check whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Reason for the abort, if any
    pub fn reason(&self) -> Option<AbortReason> {
        self.state.reason.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_abort_wins() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);

        assert!(shared.abort(AbortReason::AuthFailed {
            host: "10.0.0.7".into()
        }));
        assert!(!token.abort(AbortReason::Interrupted));

        assert!(token.is_cancelled());
        assert_eq!(
            token.reason(),
            Some(AbortReason::AuthFailed {
                host: "10.0.0.7".into()
            })
        );
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(AbortReason::Interrupted.to_string(), "interrupted");
        assert_eq!(
            AbortReason::AuthFailed { host: "sw1".into() }.to_string(),
            "authentication failed for sw1"
        );
    }
}

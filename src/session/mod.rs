//! Remote management sessions
//!
//! The collector only needs three things from a device: open an
//! authenticated session, run one command, and let go of the session.
//! Those are expressed by [`SessionConnector`] and [`Session`]; the SSH
//! client in [`ssh`] is the implementation used by the binary.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   SessionGuard                       │
//! │  - One per host being processed                     │
//! │  - RAII cleanup (disconnect on drop, every path)    │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │          dyn Session (from SessionConnector)         │
//! │  - SSH exec channel or interactive shell            │
//! └─────────────────────────────────────────────────────┘
//! ```

#[cfg(feature = "ssh")]
pub mod ssh;

use crate::collector::CancelToken;
use crate::config::DeviceType;
use crate::credentials::Credentials;
use crate::error::SessionResult;
use std::time::Duration;
use tracing::{debug, trace};

#[cfg(feature = "ssh")]
pub use ssh::SshConnector;

/// Everything needed to open a session to one host
#[derive(Debug, Clone, Copy)]
pub struct ConnectParams<'a> {
    /// Target host (address or name)
    pub host: &'a str,

    /// Management port
    pub port: u16,

    /// Kind of device
    pub device_type: DeviceType,

    /// Shared login credentials
    pub credentials: &'a Credentials,

    /// Upper bound on session establishment
    pub timeout: Duration,

    /// Run-wide cancellation; blocking calls must give up once it fires
    pub cancel: &'a CancelToken,
}

/// An established, authenticated session to one device
pub trait Session: Send {
    /// Run a command and return its raw output
    fn execute(&mut self, command: &str) -> SessionResult<String>;

    /// Close the session
    fn disconnect(&mut self) -> SessionResult<()>;
}

/// Opens sessions to devices
///
/// Implementations are shared by every worker, so `connect` takes `&self`.
pub trait SessionConnector: Send + Sync {
    /// Connect and authenticate
    ///
    /// Must report an unreachable host as `Timeout`/`Unreachable` and a
    /// rejected login as `AuthRejected`; the worker treats them differently.
    /// Connect and the returned session's `execute` must return
    /// `Cancelled` promptly once `params.cancel` fires.
    fn connect(&self, params: &ConnectParams<'_>) -> SessionResult<Box<dyn Session>>;
}

/// Scoped ownership of a session
///
/// The session is disconnected when the guard goes out of scope, whether
/// the host succeeded or failed part-way through.
pub struct SessionGuard {
    host: String,
    session: Option<Box<dyn Session>>,
}

impl SessionGuard {
    /// Take ownership of an established session
    pub fn new(host: impl Into<String>, session: Box<dyn Session>) -> Self {
        Self {
            host: host.into(),
            session: Some(session),
        }
    }

    /// Run a command on the guarded session
    pub fn execute(&mut self, command: &str) -> SessionResult<String> {
        match self.session.as_mut() {
            Some(session) => session.execute(command),
            None => Err(crate::error::SessionError::Protocol {
                host: self.host.clone(),
                reason: "session already released".into(),
            }),
        }
    }

    /// Release the session now instead of at end of scope
    pub fn release(mut self) {
        self.disconnect();
    }

    fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.disconnect() {
                Ok(()) => trace!(host = %self.host, "Session released"),
                Err(e) => debug!(host = %self.host, error = %e, "Session release failed"),
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.disconnect();
    }
}

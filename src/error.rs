//! Error types for netinv
//!
//! This module defines the error hierarchy for the collector:
//! - Session errors raised by a remote management client
//! - Parse and field extraction errors
//! - Output sink errors
//! - Configuration and worker errors
//!
//! Per-host failures are classified into a [`HostOutcome`] at the worker
//! boundary. Only authentication failures and sink failures escalate to
//! the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the netinv application
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Output sink errors
    #[error("Output error: {0}")]
    Sink(#[from] SinkError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Errors raised while talking to one device
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Session could not be established within the connect timeout
    #[error("Connection to '{host}' timed out after {secs}s")]
    Timeout { host: String, secs: u64 },

    /// Host refused or could not be reached
    #[error("Failed to connect to '{host}': {reason}")]
    Unreachable { host: String, reason: String },

    /// Device rejected the credentials
    #[error("Authentication failed for '{username}' on '{host}'")]
    AuthRejected { host: String, username: String },

    /// Command could not be executed on an established session
    #[error("Command '{command}' failed on '{host}': {reason}")]
    Execution {
        host: String,
        command: String,
        reason: String,
    },

    /// Transport or protocol level failure after connecting
    #[error("Protocol error on '{host}': {reason}")]
    Protocol { host: String, reason: String },

    /// Call abandoned because the run was cancelled
    #[error("Session to '{host}' cancelled")]
    Cancelled { host: String },
}

impl SessionError {
    /// Check if this error happened while establishing the session
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout { .. } | SessionError::Unreachable { .. }
        )
    }

    /// Check if this error should abort the whole run
    ///
    /// A rejected login points at the shared credentials, so every other
    /// host would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::AuthRejected { .. })
    }
}

/// Errors turning a raw response into the extracted field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Response contained no structured records
    #[error("Response contained no structured records")]
    NoRecords,

    /// First record has no such field
    #[error("Field '{field}' not present in first record")]
    MissingField { field: String },

    /// Field exists but is blank
    #[error("Field '{field}' is empty")]
    EmptyField { field: String },
}

/// Output sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// Failed to create the output file
    #[error("Failed to create output file '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// Write or flush failed
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Append attempted after close
    #[error("Output sink already closed")]
    Closed,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid connect timeout
    #[error("Invalid timeout {secs}s: must be between 1 and {max}")]
    InvalidTimeout { secs: u64, max: u64 },

    /// Empty command string
    #[error("Command to execute must not be empty")]
    EmptyCommand,

    /// Empty field name
    #[error("Field to extract must not be empty")]
    EmptyField,

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Hosts file could not be read
    #[error("Cannot read hosts file '{path}': {reason}")]
    HostsFile { path: PathBuf, reason: String },

    /// Hosts file had no usable entries
    #[error("Hosts file '{path}' contains no hosts")]
    NoHosts { path: PathBuf },

    /// Credentials could not be obtained
    #[error("Cannot obtain credentials: {0}")]
    Credentials(String),
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Worker stopped because the output sink failed
    #[error("Worker {id} could not write output: {source}")]
    Sink { id: usize, source: SinkError },
}

/// Result type alias for CollectorError
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Result type alias for SessionError
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Result type alias for SinkError
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Represents the outcome of collecting from a single host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Field extracted and written
    Success { host: String, field: String },

    /// Session could not be established in time (or at all)
    TimedOut { host: String, reason: String },

    /// Credentials rejected; aborts the run
    AuthFailed { host: String },

    /// Command execution failed on an established session
    ExecutionFailed { host: String, reason: String },

    /// Response was empty or lacked the designated field
    ExtractionFailed { host: String, reason: String },

    /// Dropped because the run was cancelled mid-lifecycle
    Abandoned { host: String },
}

impl HostOutcome {
    /// Classify a session error raised for `host`
    pub fn from_session_error(host: &str, err: &SessionError) -> Self {
        let host = host.to_string();
        if err.is_fatal() {
            return HostOutcome::AuthFailed { host };
        }
        if err.is_connect_failure() {
            return HostOutcome::TimedOut {
                host,
                reason: err.to_string(),
            };
        }
        match err {
            SessionError::Cancelled { .. } => HostOutcome::Abandoned { host },
            _ => HostOutcome::ExecutionFailed {
                host,
                reason: err.to_string(),
            },
        }
    }
}

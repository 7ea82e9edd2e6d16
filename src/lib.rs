//! netinv - Parallel Network Device Inventory Collector
//!
//! Logs into a list of network devices, runs one command on each, and
//! records a single extracted field per device (by default the chassis
//! serial number from `show inventory`).
//!
//! # Features
//!
//! - **Fixed Worker Pool**: A configurable number of worker threads pull
//!   hosts from a shared queue, one session per host.
//!
//! - **Failure Isolation**: Unreachable hosts, failed commands and
//!   unparseable output are logged and skipped without holding up the rest
//!   of the batch.
//!
//! - **Fail Fast on Credentials**: A rejected login stops the whole run,
//!   since every other host would reject the same credentials.
//!
//! - **Flat Output**: One `host,field` line per successful host, written
//!   atomically under concurrent workers.
//!
//! # Example
//!
//! ```bash
//! # Serial numbers of every ASA in ips.txt
//! netinv -i ips.txt -o serials.txt
//!
//! # IOS switches, 32 parallel sessions
//! netinv -i switches.txt --device-type cisco_ios -w 32
//! ```

pub mod collector;
pub mod config;
pub mod credentials;
pub mod error;
pub mod parse;
pub mod progress;
pub mod session;

pub use collector::{CollectResult, Dispatcher, JobSpec, RunState};
pub use config::{CliArgs, CollectConfig, DeviceType};
pub use credentials::Credentials;
pub use error::{CollectorError, HostOutcome, Result};

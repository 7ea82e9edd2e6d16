//! Scripted in-memory devices shared by the integration tests

#![allow(dead_code)]

use netinv::collector::{Dispatcher, JobSpec};
use netinv::config::DeviceType;
use netinv::credentials::Credentials;
use netinv::error::{SessionError, SessionResult};
use netinv::parse::InventoryParser;
use netinv::session::{ConnectParams, Session, SessionConnector};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How a simulated device responds
#[derive(Clone)]
pub enum Behavior {
    /// Answers `show inventory` with this chassis serial
    Serial(&'static str),
    /// Never answers the connect
    Timeout,
    /// Rejects the login
    RejectAuth,
    /// Accepts the login, fails the command
    ExecFail,
    /// Accepts the login, returns nothing useful
    Empty,
    /// Succeeds after a delay
    Slow(&'static str, Duration),
    /// Panics inside the connector
    Panic,
    /// Rejects the login after a delay
    RejectAuthAfter(Duration),
    /// Connect blocks for a while but gives up when the run is cancelled
    SlowConnect(Duration),
    /// Connect blocks for a while and ignores cancellation
    StuckConnect(Duration),
}

#[derive(Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

pub struct ScriptedConnector {
    script: HashMap<String, Behavior>,
    default: Behavior,
    pub counters: Arc<Counters>,
}

impl ScriptedConnector {
    pub fn new(script: &[(&str, Behavior)], default: Behavior) -> Self {
        Self {
            script: script
                .iter()
                .map(|(h, b)| (h.to_string(), b.clone()))
                .collect(),
            default,
            counters: Arc::new(Counters::default()),
        }
    }
}

struct ScriptedSession {
    host: String,
    behavior: Behavior,
    counters: Arc<Counters>,
}

fn inventory_output(serial: &str) -> String {
    format!(
        "NAME: \"Chassis\", DESCR: \"ASA 5516-X with FirePOWER services\"\n\
         PID: ASA5516           , VID: V05     , SN: {}\n\n\
         NAME: \"Storage Device 1\", DESCR: \"ASA 5516-X SSD\"\n\
         PID: N/A               , VID: N/A     , SN: MSA0000000\n",
        serial
    )
}

impl Session for ScriptedSession {
    fn execute(&mut self, command: &str) -> SessionResult<String> {
        match &self.behavior {
            Behavior::Serial(sn) => Ok(inventory_output(sn)),
            Behavior::Slow(sn, delay) => {
                thread::sleep(*delay);
                Ok(inventory_output(sn))
            }
            Behavior::Empty => Ok(String::new()),
            _ => Err(SessionError::Execution {
                host: self.host.clone(),
                command: command.to_string(),
                reason: "% Invalid input detected".into(),
            }),
        }
    }

    fn disconnect(&mut self) -> SessionResult<()> {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SessionConnector for ScriptedConnector {
    fn connect(&self, params: &ConnectParams<'_>) -> SessionResult<Box<dyn Session>> {
        let behavior = self
            .script
            .get(params.host)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        match behavior {
            Behavior::Timeout => Err(SessionError::Timeout {
                host: params.host.to_string(),
                secs: params.timeout.as_secs(),
            }),
            Behavior::RejectAuth => Err(SessionError::AuthRejected {
                host: params.host.to_string(),
                username: params.credentials.username().to_string(),
            }),
            Behavior::Panic => panic!("scripted connector panic for {}", params.host),
            Behavior::RejectAuthAfter(delay) => {
                thread::sleep(delay);
                Err(SessionError::AuthRejected {
                    host: params.host.to_string(),
                    username: params.credentials.username().to_string(),
                })
            }
            Behavior::SlowConnect(delay) => {
                let start = Instant::now();
                while start.elapsed() < delay {
                    if params.cancel.is_cancelled() {
                        return Err(SessionError::Cancelled {
                            host: params.host.to_string(),
                        });
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(SessionError::Timeout {
                    host: params.host.to_string(),
                    secs: delay.as_secs(),
                })
            }
            Behavior::StuckConnect(delay) => {
                thread::sleep(delay);
                Err(SessionError::Timeout {
                    host: params.host.to_string(),
                    secs: delay.as_secs(),
                })
            }
            behavior => {
                self.counters.connects.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedSession {
                    host: params.host.to_string(),
                    behavior,
                    counters: Arc::clone(&self.counters),
                }))
            }
        }
    }
}

pub fn job() -> JobSpec {
    JobSpec {
        command: "show inventory".into(),
        field: "sn".into(),
        device_type: DeviceType::CiscoAsa,
        port: 22,
        connect_timeout: Duration::from_secs(30),
    }
}

pub fn dispatcher(connector: Arc<ScriptedConnector>, workers: usize, output: &Path) -> Dispatcher {
    Dispatcher::new(
        job(),
        workers,
        output,
        Credentials::new("admin", "secret"),
        connector,
        Arc::new(InventoryParser),
    )
    .unwrap()
}

pub fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}

pub fn sorted_lines(path: &Path) -> Vec<String> {
    let mut lines: Vec<String> = std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

//! SSH sessions built on russh
//!
//! russh is async, while collector workers are plain threads. The
//! connector owns a small tokio runtime and every session call blocks on
//! it, so a worker sees ordinary synchronous calls.
//!
//! Network operating systems (ASA, IOS, NX-OS) are driven through an
//! interactive shell with paging disabled; `linux` hosts get a plain exec
//! request.
//!
//! Every blocking call races the run's cancellation token, so an aborted
//! run does not wait out connect or command timeouts.

use super::{ConnectParams, Session, SessionConnector};
use crate::collector::CancelToken;
use crate::config::DeviceType;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use russh::client;
use russh::ChannelMsg;
use russh_keys::key::PublicKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, trace};

/// Number of runtime threads driving all SSH sessions
const RUNTIME_THREADS: usize = 2;

/// How often a blocked call checks the cancellation token
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Resolves once the token fires
async fn cancelled(token: &CancelToken) {
    while !token.is_cancelled() {
        tokio::time::sleep(CANCEL_POLL).await;
    }
}

/// Client handler; output is read from the channel, not the handler
struct DeviceHandler;

#[async_trait]
impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // TODO: verify host keys against a known_hosts file
        Ok(true)
    }
}

/// Opens password-authenticated SSH sessions
pub struct SshConnector {
    runtime: Runtime,
}

impl SshConnector {
    /// Create a connector with its own runtime
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("ssh-io")
            .enable_all()
            .build()?;

        Ok(Self { runtime })
    }
}

impl SessionConnector for SshConnector {
    fn connect(&self, params: &ConnectParams<'_>) -> SessionResult<Box<dyn Session>> {
        let handle = self.runtime.block_on(async {
            tokio::select! {
                result = open(params) => result,
                _ = cancelled(params.cancel) => Err(SessionError::Cancelled {
                    host: params.host.to_string(),
                }),
            }
        })?;

        Ok(Box::new(SshSession {
            runtime: self.runtime.handle().clone(),
            handle,
            host: params.host.to_string(),
            device_type: params.device_type,
            idle_timeout: params.timeout,
            cancel: params.cancel.clone(),
        }))
    }
}

/// Connect, handshake and authenticate within `params.timeout`
async fn open(params: &ConnectParams<'_>) -> SessionResult<client::Handle<DeviceHandler>> {
    let host = params.host;
    let timeout = params.timeout;

    let establish = async {
        let stream = TcpStream::connect((host, params.port))
            .await
            .map_err(|e| SessionError::Unreachable {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(timeout),
            ..Default::default()
        });

        let mut session = client::connect_stream(config, stream, DeviceHandler)
            .await
            .map_err(|e| SessionError::Unreachable {
                host: host.to_string(),
                reason: format!("SSH handshake failed: {}", e),
            })?;

        let username = params.credentials.username();
        let authenticated = session
            .authenticate_password(username, params.credentials.password())
            .await
            .map_err(|e| SessionError::Protocol {
                host: host.to_string(),
                reason: format!("authentication exchange failed: {}", e),
            })?;

        if !authenticated {
            return Err(SessionError::AuthRejected {
                host: host.to_string(),
                username: username.to_string(),
            });
        }

        debug!(host = %host, port = params.port, "SSH session established");
        Ok(session)
    };

    tokio::time::timeout(timeout, establish)
        .await
        .map_err(|_| SessionError::Timeout {
            host: host.to_string(),
            secs: timeout.as_secs(),
        })?
}

/// An authenticated SSH session to one device
pub struct SshSession {
    runtime: Handle,
    handle: client::Handle<DeviceHandler>,
    host: String,
    device_type: DeviceType,
    idle_timeout: Duration,
    cancel: CancelToken,
}

impl SshSession {
    fn exec_error(&self, command: &str, reason: impl ToString) -> SessionError {
        SessionError::Execution {
            host: self.host.clone(),
            command: command.to_string(),
            reason: reason.to_string(),
        }
    }

    async fn run(&self, command: &str) -> SessionResult<String> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.exec_error(command, e))?;

        if self.device_type.uses_shell() {
            channel
                .request_pty(false, "vt100", 200, 24, 0, 0, &[])
                .await
                .map_err(|e| self.exec_error(command, e))?;
            channel
                .request_shell(true)
                .await
                .map_err(|e| self.exec_error(command, e))?;

            let mut script = String::new();
            if let Some(pager_off) = self.device_type.pager_off_command() {
                script.push_str(pager_off);
                script.push('\n');
            }
            script.push_str(command);
            script.push_str("\nexit\n");

            channel
                .data(script.as_bytes())
                .await
                .map_err(|e| self.exec_error(command, e))?;
        } else {
            channel
                .exec(true, command)
                .await
                .map_err(|e| self.exec_error(command, e))?;
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        loop {
            let msg = tokio::time::timeout(self.idle_timeout, channel.wait())
                .await
                .map_err(|_| {
                    self.exec_error(
                        command,
                        format!("no output for {}s", self.idle_timeout.as_secs()),
                    )
                })?;

            match msg {
                Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                }
                Some(ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        trace!(
            host = %self.host,
            bytes = stdout.len(),
            status = ?exit_status,
            "Command output received"
        );

        // Shells exit with the status of the `exit` builtin, which says
        // nothing about the command itself.
        if !self.device_type.uses_shell() {
            if let Some(status) = exit_status.filter(|s| *s != 0) {
                let detail = String::from_utf8_lossy(&stderr);
                return Err(self.exec_error(
                    command,
                    format!("exit status {}: {}", status, detail.trim()),
                ));
            }
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

impl Session for SshSession {
    fn execute(&mut self, command: &str) -> SessionResult<String> {
        let runtime = self.runtime.clone();
        runtime.block_on(async {
            tokio::select! {
                result = self.run(command) => result,
                _ = cancelled(&self.cancel) => Err(SessionError::Cancelled {
                    host: self.host.clone(),
                }),
            }
        })
    }

    fn disconnect(&mut self) -> SessionResult<()> {
        let runtime = self.runtime.clone();
        runtime
            .block_on(
                self.handle
                    .disconnect(russh::Disconnect::ByApplication, "", "en"),
            )
            .map_err(|e| SessionError::Protocol {
                host: self.host.clone(),
                reason: e.to_string(),
            })
    }
}

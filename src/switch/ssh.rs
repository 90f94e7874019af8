//! SSH command execution against a switch.
//!
//! Every call opens its own session (no pooling, no control-master reuse
//! across cycles), runs one command, and closes the session again.
//!
//! Security note: host keys are not verified. The session is opened with
//! `StrictHostKeyChecking=no`, so any host identity is accepted on every
//! contact. Switches are addressed on a management network and routinely
//! re-key on firmware upgrades; run the collector only where that network is
//! trusted.

use crate::error::{CollectorError, Result};
use crate::metrics::data::SwitchTarget;
use crate::metrics::traits::CommandExecutor;
use async_trait::async_trait;
use openssh::{KnownHosts, Session, SessionBuilder};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default SSH connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default command execution timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted on top of ssh's own `ConnectTimeout` before the
/// attempt is abandoned locally.
const CONNECT_GRACE: Duration = Duration::from_secs(2);

/// SSH executor options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SshOptions {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Command execution timeout.
    pub command_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Broad class of a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    Authentication,
    Timeout,
    Refused,
    Handshake,
}

/// Classify an ssh connection failure from its message text.
///
/// ssh reports most failures only through stderr, so the text is all there
/// is to go on. Anything unrecognised is treated as a protocol failure.
pub fn classify_connect_failure(message: &str) -> ConnectFailure {
    let message = message.to_lowercase();

    if message.contains("permission denied")
        || message.contains("authentication")
        || message.contains("too many authentication failures")
        || message.contains("identity file")
        || message.contains("invalid format")
        || message.contains("load key")
    {
        return ConnectFailure::Authentication;
    }

    if message.contains("timed out") || message.contains("timeout") {
        return ConnectFailure::Timeout;
    }

    if message.contains("connection refused")
        || message.contains("no route to host")
        || message.contains("network is unreachable")
        || message.contains("could not resolve hostname")
        || message.contains("name or service not known")
    {
        return ConnectFailure::Refused;
    }

    ConnectFailure::Handshake
}

/// [`CommandExecutor`] backed by the system `ssh` client.
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    options: SshOptions,
}

impl SshExecutor {
    /// Create an executor with the given options.
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    async fn connect(&self, target: &SwitchTarget) -> Result<Session> {
        // ssh silently skips unreadable identity files; fail loudly instead.
        if let Err(e) = tokio::fs::File::open(&target.private_key_path).await {
            return Err(CollectorError::Authentication {
                host: target.host.clone(),
                user: target.user.clone(),
                reason: format!(
                    "private key {} is not readable: {}",
                    target.private_key_path.display(),
                    e
                ),
            });
        }

        let mut builder = SessionBuilder::default();
        builder
            .known_hosts_check(KnownHosts::Accept)
            .connect_timeout(self.options.connect_timeout)
            .user(target.user.clone())
            .port(target.port)
            .keyfile(&target.private_key_path)
            .control_directory(std::env::temp_dir());

        debug!("Connecting to {} via SSH...", target.destination());

        let attempt = tokio::time::timeout(
            self.options.connect_timeout + CONNECT_GRACE,
            builder.connect(&target.host),
        )
        .await;

        match attempt {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(self.connect_error(target, &error_chain(&e))),
            Err(_) => Err(CollectorError::ConnectionTimeout {
                host: target.host.clone(),
                timeout_secs: self.options.connect_timeout.as_secs(),
            }),
        }
    }

    fn connect_error(&self, target: &SwitchTarget, message: &str) -> CollectorError {
        let host = target.host.clone();
        let reason = message.to_string();
        match classify_connect_failure(message) {
            ConnectFailure::Authentication => CollectorError::Authentication {
                host,
                user: target.user.clone(),
                reason,
            },
            ConnectFailure::Timeout => CollectorError::ConnectionTimeout {
                host,
                timeout_secs: self.options.connect_timeout.as_secs(),
            },
            ConnectFailure::Refused => CollectorError::ConnectionRefused { host, reason },
            ConnectFailure::Handshake => CollectorError::Handshake { host, reason },
        }
    }

    async fn run(&self, session: &Session, target: &SwitchTarget, command: &str) -> Result<Vec<String>> {
        let start = Instant::now();
        debug!("Executing on {}: {}", target.name, command);

        let output = tokio::time::timeout(
            self.options.command_timeout,
            session.raw_command(command).output(),
        )
        .await
        .map_err(|_| CollectorError::CommandTimeout {
            host: target.host.clone(),
            timeout_secs: self.options.command_timeout.as_secs(),
        })?
        .map_err(|e| CollectorError::Execution {
            host: target.host.clone(),
            reason: error_chain(&e),
        })?;

        if !output.status.success() {
            return Err(CollectorError::RemoteCommand {
                host: target.host.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines = output_lines(&stdout);

        debug!(
            "Command completed on {} ({} lines, {}ms)",
            target.name,
            lines.len(),
            start.elapsed().as_millis()
        );

        Ok(lines)
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    async fn execute(&self, target: &SwitchTarget, command: &str) -> Result<Vec<String>> {
        let session = self.connect(target).await?;
        let result = self.run(&session, target, command).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close SSH session to {}: {}", target.host, e);
        }

        result
    }
}

/// Split command output into lines, dropping the terminator of the last one.
pub fn output_lines(stdout: &str) -> Vec<String> {
    stdout.lines().map(str::to_string).collect()
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

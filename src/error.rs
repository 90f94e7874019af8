//! Error handling for the switch collector.

/// A specialized `Result` type for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Every way a poll cycle (or startup) can fail.
///
/// Executor, parser, mapper and sink failures terminate a single poll cycle.
/// Only [`CollectorError::Config`] is fatal, and only at startup.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// The switch rejected our credentials or the private key is unusable
    #[error("authentication failed for {user}@{host}: {reason}")]
    Authentication {
        host: String,
        user: String,
        reason: String,
    },

    /// SSH protocol negotiation failed
    #[error("SSH handshake with {host} failed: {reason}")]
    Handshake { host: String, reason: String },

    /// No session could be established within the connect timeout
    #[error("connection to {host} timed out after {timeout_secs}s")]
    ConnectionTimeout { host: String, timeout_secs: u64 },

    /// The host refused or could not be reached
    #[error("connection to {host} refused: {reason}")]
    ConnectionRefused { host: String, reason: String },

    /// The session broke or the command could not be started after connecting
    #[error("command on {host} failed: {reason}")]
    Execution { host: String, reason: String },

    /// The remote command did not finish within its bound
    #[error("command on {host} timed out after {timeout_secs}s")]
    CommandTimeout { host: String, timeout_secs: u64 },

    /// The remote command ran but exited unsuccessfully
    #[error("command on {host} exited with status {status}: {stderr}")]
    RemoteCommand {
        host: String,
        status: i32,
        stderr: String,
    },

    /// The port dump did not have the expected `key=value` shape
    #[error("malformed command output at line {line}: {reason}")]
    MalformedOutput { line: usize, reason: String },

    /// A port reported by the switch has no configured description
    #[error("port {port} has no interface description")]
    UnknownPort { port: String },

    /// A counter field is missing or not an integer
    #[error("port {port}: invalid value {value:?} for field {field}")]
    InvalidField {
        port: String,
        field: String,
        value: String,
    },

    /// The metrics store did not accept the batch
    #[error("failed to write metrics: {0}")]
    SinkWrite(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    /// Create a new malformed output error
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            line,
            reason: reason.into(),
        }
    }

    /// Create a new sink write error
    pub fn sink_error(msg: impl Into<String>) -> Self {
        Self::SinkWrite(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "authentication",
            Self::Handshake { .. } => "handshake",
            Self::ConnectionTimeout { .. } => "connection_timeout",
            Self::ConnectionRefused { .. } => "connection_refused",
            Self::Execution { .. } => "execution",
            Self::CommandTimeout { .. } => "command_timeout",
            Self::RemoteCommand { .. } => "remote_command",
            Self::MalformedOutput { .. } => "malformed_output",
            Self::UnknownPort { .. } => "unknown_port",
            Self::InvalidField { .. } => "invalid_field",
            Self::SinkWrite(_) => "sink_write",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }

    /// True when the failure happened before a session was established.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. }
                | Self::Handshake { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionRefused { .. }
        )
    }

    /// True for any failure raised while talking to the switch.
    pub fn is_execution_error(&self) -> bool {
        self.is_connection_error()
            || matches!(
                self,
                Self::Execution { .. } | Self::CommandTimeout { .. } | Self::RemoteCommand { .. }
            )
    }
}

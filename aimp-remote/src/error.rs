use aimp_api::ApiError;
use thiserror::Error;

use crate::connection::ConnectionStatus;

/// Errors produced by the session layer
#[derive(Error, Debug)]
pub enum SessionError {
    /// Rejected synchronously: bad host, port, timeout or sync periods
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("A session is already active (status: {0})")]
    AlreadyActive(ConnectionStatus),

    #[error("Already disconnecting")]
    AlreadyDisconnecting,

    #[error("Not connected")]
    NotConnected,

    /// The host name could not be resolved
    #[error("Host not found: {0}")]
    HostNotFound(String),

    /// The host resolved but the player did not answer
    #[error("Remote player not found at {host}:{port}")]
    RemoteNotFound { host: String, port: u16 },

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The operation was abandoned because the session is shutting down
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Error budget exhausted: {0} failures within the reset window")]
    BudgetExceeded(u32),

    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A command was rejected locally before reaching the player
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl SessionError {
    /// Cancellations are never counted against the error budget
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SessionError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

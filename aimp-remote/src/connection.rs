//! Connection lifecycle types

use std::fmt;
use std::sync::Arc;

use crate::error::SessionError;

/// Where a session is in its lifecycle
///
/// `Disconnected → Connecting → Initializing → Connected → Disconnecting →
/// Disconnected`. A failed or cancelled connect goes through `Disconnecting`
/// as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Initializing,
    Connected,
    Disconnecting,
}

impl ConnectionStatus {
    /// Whether a session exists in any form
    pub fn is_active(self) -> bool {
        self != ConnectionStatus::Disconnected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Initializing => "initializing",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnecting => "disconnecting",
        };
        f.write_str(label)
    }
}

/// Notification sent to connection listeners
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    StatusChanged(ConnectionStatus),
    HostNotFound { host: String },
    RemoteNotFound { host: String, port: u16 },
    /// Any other failure of the connect sequence
    UnresolvedError(Arc<SessionError>),
}

/// Receives lifecycle notifications of a session controller
pub trait ConnectionListener: Send + Sync {
    fn on_connection_event(&self, event: &ConnectionEvent);
}

impl<F> ConnectionListener for F
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    fn on_connection_event(&self, event: &ConnectionEvent) {
        self(event)
    }
}

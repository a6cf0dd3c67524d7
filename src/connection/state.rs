use std::fmt;

/// Lifecycle of one connection, as seen by the registry and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Performing handshake
    Handshaking,

    /// Handshake complete, no stream role yet
    Idle,

    /// Playing a stream
    Reading,

    /// Publishing a stream
    Publishing,

    /// Connection closed
    Closed,
}

impl ConnectionState {
    /// Label exported to observability
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Handshaking => "handshake",
            ConnectionState::Idle => "idle",
            ConnectionState::Reading => "read",
            ConnectionState::Publishing => "publish",
            ConnectionState::Closed => "closed",
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Reading | ConnectionState::Publishing
        )
    }

    /// Validate transition
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        match (*self, next) {
            (ConnectionState::Handshaking, ConnectionState::Idle) => true,
            (ConnectionState::Idle, ConnectionState::Reading) => true,
            (ConnectionState::Idle, ConnectionState::Publishing) => true,
            (ConnectionState::Reading, ConnectionState::Idle) => true,
            (ConnectionState::Publishing, ConnectionState::Idle) => true,
            (ConnectionState::Closed, _) => false,
            (_, ConnectionState::Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

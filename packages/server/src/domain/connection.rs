//! Live connection endpoint owned by the connection registry.

use tokio::sync::mpsc;

use super::{
    error::{DomainError, PushError},
    value_object::{ConnectionId, PermissionLevel},
};

/// Outbound channel of one connection. The socket task drains the receiver.
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// `Connecting -> Open -> Closed`. Nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    fn name(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

/// One viewer attached to one stream.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    permission: PermissionLevel,
    sender: PusherChannel,
    state: ConnectionState,
}

impl Connection {
    pub fn new(permission: PermissionLevel, sender: PusherChannel) -> Self {
        Self {
            id: ConnectionId::generate(),
            permission,
            sender,
            state: ConnectionState::Connecting,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn permission(&self) -> PermissionLevel {
        self.permission
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mark_open(&mut self) -> Result<(), DomainError> {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Open;
                Ok(())
            }
            other => Err(DomainError::InvalidConnectionTransition {
                from: other.name(),
                to: ConnectionState::Open.name(),
            }),
        }
    }

    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Queue `payload` for the socket. Fails once the socket task is gone.
    pub fn send(&self, payload: String) -> Result<(), PushError> {
        if self.state != ConnectionState::Open {
            return Err(PushError::PushFailed(format!(
                "connection is {}",
                self.state.name()
            )));
        }
        self.sender
            .send(payload)
            .map_err(|e| PushError::PushFailed(e.to_string()))
    }
}

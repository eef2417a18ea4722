//! Error types for the peer session.

use std::time::Duration;

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Peer session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Room identity already claimed by another host. Recoverable: pick a new code.
    #[error("room identity {0} is already claimed")]
    IdentityCollision(String),

    /// Every generated room code collided.
    #[error("no free room code after {attempts} attempts")]
    RoomsExhausted { attempts: u32 },

    /// No peer joined / answered in time.
    #[error("timed out after {0:?} waiting for peer")]
    ConnectTimeout(Duration),

    /// Nobody is listening on the derived identity.
    #[error("no peer at {0}")]
    PeerUnavailable(String),

    /// Underlying channel failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Best-effort send failed. Logged, never propagated out of `send`.
    #[error("send failed: {0}")]
    SendFailure(String),

    /// Room code was not four digits.
    #[error("invalid room code {0:?}")]
    InvalidRoomCode(String),

    /// Frame was not a protocol message.
    #[error("malformed message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Create/join called while a session is already up.
    #[error("session already active")]
    AlreadyActive,
}

impl SessionError {
    /// Whether the error can be retried with a different room code.
    pub fn is_collision(&self) -> bool {
        matches!(self, SessionError::IdentityCollision(_))
    }
}

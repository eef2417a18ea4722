//! Peer-to-peer session and sync protocol
//!
//! - `session`: room-code matchmaking and connection lifecycle
//! - `transport`: reliable ordered channels (in-process and TCP)
//! - `protocol`: wire messages
//! - `sync`: handshake, throttled broadcast, mirroring, rematch

pub mod error;
pub mod protocol;
pub mod room;
pub mod session;
pub mod sync;
pub mod transport;

pub use error::{Result, SessionError};
pub use protocol::{PuckSnapshot, StateSnapshot, SyncMessage};
pub use room::{IDENTITY_PREFIX, RoomCode};
pub use session::{PeerSession, Role, SessionConfig, SessionState};
pub use sync::{BroadcastThrottle, Reaction, SyncAction, SyncChannel, SyncConfig};
pub use transport::{Link, Listener, MemoryTransport, TcpTransport, Transport};

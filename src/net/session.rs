//! Peer session: room codes, connection lifecycle and the open channel.
//!
//! `Disconnected -> Connecting -> Connected -> Ready -> Playing`, and back to
//! `Disconnected` from anywhere on close, error or explicit teardown.

use std::time::Duration;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::error::{Result, SessionError};
use super::protocol::SyncMessage;
use super::room::RoomCode;
use super::transport::{Link, Listener, Transport};
use crate::consts::*;

/// Which peer computes physics. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Host,
    Guest,
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Channel open, handshake pending
    Connected,
    /// Ready/start handshake done
    Ready,
    Playing,
}

/// Timeouts and retry bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub host_connect_timeout: Duration,
    pub guest_connect_timeout: Duration,
    pub max_claim_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host_connect_timeout: Duration::from_millis(HOST_CONNECT_TIMEOUT_MS),
            guest_connect_timeout: Duration::from_millis(GUEST_CONNECT_TIMEOUT_MS),
            max_claim_attempts: 8,
        }
    }
}

/// One create/join attempt and the channel it produced
#[derive(Debug)]
pub struct PeerSession<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    role: Option<Role>,
    room: Option<RoomCode>,
    listener: Option<T::Listener>,
    link: Option<Link>,
    rng: Pcg32,
}

impl<T: Transport> PeerSession<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self::with_seed(transport, config, rand::random())
    }

    /// Session whose room codes come from a fixed seed
    pub fn with_seed(transport: T, config: SessionConfig, seed: u64) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Disconnected,
            role: None,
            room: None,
            listener: None,
            link: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn room_code(&self) -> Option<&RoomCode> {
        self.room.as_ref()
    }

    /// Whether a channel is open (connected, ready or playing)
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connected | SessionState::Ready | SessionState::Playing
        ) && self.link.as_ref().is_some_and(Link::is_open)
    }

    /// Whether a channel exists that may still hold unread frames. Stays true
    /// after the peer leaves until `recv` has drained it and returned `None`.
    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }

    /// Host: claim an identity under a fresh room code, regenerating the code
    /// on collision up to `max_claim_attempts` times.
    pub async fn claim_room(&mut self) -> Result<RoomCode> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::AlreadyActive);
        }
        self.state = SessionState::Connecting;
        self.role = Some(Role::Host);

        for attempt in 1..=self.config.max_claim_attempts {
            let code = RoomCode::generate(&mut self.rng);
            match self.transport.claim(&code.identity()).await {
                Ok(listener) => {
                    log::info!("Claimed room {} (attempt {})", code, attempt);
                    self.listener = Some(listener);
                    self.room = Some(code.clone());
                    return Ok(code);
                }
                Err(e) if e.is_collision() => {
                    log::warn!("Room {} taken, drawing another code", code);
                }
                Err(e) => {
                    self.disconnect();
                    return Err(e);
                }
            }
        }

        let attempts = self.config.max_claim_attempts;
        self.disconnect();
        Err(SessionError::RoomsExhausted { attempts })
    }

    /// Host: wait for a guest to open its channel
    pub async fn await_guest(&mut self) -> Result<()> {
        let Some(listener) = self.listener.as_mut() else {
            return Err(SessionError::Transport("no room claimed".to_string()));
        };

        let wait = self.config.host_connect_timeout;
        let accepted = tokio::time::timeout(wait, listener.accept()).await;
        match accepted {
            Ok(Ok(link)) => {
                log::info!("Guest connected to room {:?}", self.room.as_ref().map(RoomCode::as_str));
                // Two seats only: stop taking peers and release the identity
                self.listener = None;
                self.link = Some(link);
                self.state = SessionState::Connected;
                Ok(())
            }
            Ok(Err(e)) => {
                self.disconnect();
                Err(e)
            }
            Err(_) => {
                log::warn!("No guest joined within {:?}", wait);
                self.disconnect();
                Err(SessionError::ConnectTimeout(wait))
            }
        }
    }

    /// Host: claim a room and wait for the guest
    pub async fn create(&mut self) -> Result<RoomCode> {
        let code = self.claim_room().await?;
        self.await_guest().await?;
        Ok(code)
    }

    /// Guest: connect to the host behind `code`
    pub async fn join(&mut self, code: &RoomCode) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::AlreadyActive);
        }
        self.state = SessionState::Connecting;
        self.role = Some(Role::Guest);
        self.room = Some(code.clone());

        let wait = self.config.guest_connect_timeout;
        let identity = code.identity();
        let connected = tokio::time::timeout(wait, self.transport.connect(&identity)).await;
        match connected {
            Ok(Ok(link)) => {
                log::info!("Joined room {}", code);
                self.link = Some(link);
                self.state = SessionState::Connected;
                Ok(())
            }
            Ok(Err(e)) => {
                log::warn!("Joining room {} failed: {}", code, e);
                self.disconnect();
                Err(e)
            }
            Err(_) => {
                log::warn!("Room {} did not answer within {:?}", code, wait);
                self.disconnect();
                Err(SessionError::ConnectTimeout(wait))
            }
        }
    }

    /// Best-effort send. A closed channel makes this a no-op; failures are
    /// logged and dropped, never queued or retried.
    pub fn send(&self, message: &SyncMessage) {
        let Some(link) = self.link.as_ref().filter(|l| l.is_open()) else {
            return;
        };
        let result = message.encode().and_then(|frame| link.send(frame));
        if let Err(e) = result {
            log::warn!("Dropping {} message: {}", message.kind(), e);
        }
    }

    /// Next well-formed message, or `None` once the channel is gone.
    /// Malformed frames are logged and skipped.
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        loop {
            let frame = self.link.as_mut()?.recv().await?;
            match SyncMessage::decode(&frame) {
                Ok(message) => return Some(message),
                Err(e) => log::warn!("Skipping frame: {}", e),
            }
        }
    }

    /// Handshake finished
    pub fn mark_ready(&mut self) {
        if self.state == SessionState::Connected {
            self.state = SessionState::Ready;
        }
    }

    /// A match has started
    pub fn begin_playing(&mut self) {
        if matches!(self.state, SessionState::Ready | SessionState::Playing) {
            self.state = SessionState::Playing;
        }
    }

    /// Close the channel, release the claimed identity and forget the room.
    /// Safe to call any number of times.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            log::info!("Session closed ({:?})", self.state);
        }
        self.link = None;
        self.listener = None;
        self.room = None;
        self.role = None;
        self.state = SessionState::Disconnected;
    }
}

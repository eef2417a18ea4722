//! Reliable, ordered frame transports.
//!
//! A transport lets a host claim an identity and a guest connect to it. Both
//! ends then talk through a [`Link`], a pair of unbounded frame channels. The
//! socket work happens in background tasks so the dispatcher only ever sees
//! whole frames, in order.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

use super::error::{Result, SessionError};
use super::room::RoomCode;

/// One end of an open channel. Dropping it closes the channel for both sides.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl Link {
    /// Two cross-wired in-process ends
    pub fn pair() -> (Link, Link) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Link {
                outbound: a_tx,
                inbound: b_rx,
            },
            Link {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }

    /// Wrap a TCP stream; frames travel as newline-delimited text.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream(stream: TcpStream) -> Link {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".to_string());
        let (read_half, mut write_half) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let written = async {
                    write_half.write_all(frame.as_bytes()).await?;
                    write_half.write_all(b"\n").await
                };
                if let Err(e) = written.await {
                    log::warn!("Write to {} failed: {}", peer, e);
                    break;
                }
            }
            // Dropping the write half sends FIN so the peer sees the close
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if in_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("Read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Link {
            outbound: out_tx,
            inbound: in_rx,
        }
    }

    /// Queue a frame for delivery
    pub fn send(&self, frame: String) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| SessionError::SendFailure("channel closed".to_string()))
    }

    /// Next frame, or `None` once the remote end is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Host side of a claimed identity
pub trait Listener: Send + Debug {
    /// Wait for a guest whose channel is fully open
    fn accept(&mut self) -> impl Future<Output = Result<Link>> + Send;
}

/// A way to claim and reach peer identities
pub trait Transport: Send + Sync + Debug {
    type Listener: Listener;

    /// Become reachable under `identity`. Fails with
    /// [`SessionError::IdentityCollision`] if someone already holds it.
    fn claim(&self, identity: &str) -> impl Future<Output = Result<Self::Listener>> + Send;

    /// Open a reliable, ordered channel to `identity`
    fn connect(&self, identity: &str) -> impl Future<Output = Result<Link>> + Send;
}

#[derive(Debug, Default)]
struct Broker {
    listeners: HashMap<String, mpsc::UnboundedSender<Link>>,
    /// Offers to identities nobody has claimed yet
    pending: HashMap<String, Vec<oneshot::Sender<Link>>>,
}

/// In-process signaling broker.
///
/// Connecting to an unclaimed identity parks the offer until a host claims it,
/// so a guest with the wrong code waits out its connect timeout.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    broker: Arc<Mutex<Broker>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Broker> {
        self.broker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offers still parked on unclaimed identities
    #[cfg(test)]
    fn pending_offers(&self) -> usize {
        self.lock().pending.values().map(Vec::len).sum()
    }

    /// Whether someone currently holds `identity`
    pub fn is_claimed(&self, identity: &str) -> bool {
        self.lock()
            .listeners
            .get(identity)
            .is_some_and(|tx| !tx.is_closed())
    }
}

impl Transport for MemoryTransport {
    type Listener = MemoryListener;

    async fn claim(&self, identity: &str) -> Result<MemoryListener> {
        let mut broker = self.lock();
        if broker
            .listeners
            .get(identity)
            .is_some_and(|tx| !tx.is_closed())
        {
            return Err(SessionError::IdentityCollision(identity.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for offer in broker.pending.remove(identity).unwrap_or_default() {
            let (host_end, guest_end) = Link::pair();
            // Guests that already gave up dropped their receiver
            if offer.send(guest_end).is_ok() {
                let _ = tx.send(host_end);
            }
        }
        broker.listeners.insert(identity.to_string(), tx);

        Ok(MemoryListener {
            incoming: rx,
            broker: Arc::clone(&self.broker),
        })
    }

    async fn connect(&self, identity: &str) -> Result<Link> {
        let offer = {
            let mut broker = self.lock();
            if let Some(tx) = broker.listeners.get(identity) {
                let (host_end, guest_end) = Link::pair();
                if tx.send(host_end).is_ok() {
                    return Ok(guest_end);
                }
                broker.listeners.remove(identity);
            }
            // Drop offers whose guests already gave up
            broker.pending.retain(|_, offers| {
                offers.retain(|offer| !offer.is_closed());
                !offers.is_empty()
            });
            let (tx, rx) = oneshot::channel();
            broker
                .pending
                .entry(identity.to_string())
                .or_default()
                .push(tx);
            rx
        };
        offer
            .await
            .map_err(|_| SessionError::PeerUnavailable(identity.to_string()))
    }
}

/// Claimed identity on a [`MemoryTransport`]; released on drop
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<Link>,
    broker: Arc<Mutex<Broker>>,
}

impl Listener for MemoryListener {
    async fn accept(&mut self) -> Result<Link> {
        self.incoming
            .recv()
            .await
            .ok_or_else(|| SessionError::Transport("listener closed".to_string()))
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.incoming.close();
        let mut broker = self.broker.lock().unwrap_or_else(PoisonError::into_inner);
        broker.listeners.retain(|_, tx| !tx.is_closed());
    }
}

/// TCP transport: identity `prefix + code` lives on port `base_port + code`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: IpAddr,
    base_port: u16,
}

impl TcpTransport {
    pub fn new(host: IpAddr, base_port: u16) -> Self {
        Self { host, base_port }
    }

    /// Socket address a host identity is reachable on
    pub fn address_for(&self, identity: &str) -> Result<SocketAddr> {
        let code = RoomCode::from_identity(identity)
            .ok_or_else(|| SessionError::Transport(format!("unroutable identity {identity}")))?;
        let port = self.base_port.checked_add(code.number()).ok_or_else(|| {
            SessionError::Transport(format!(
                "port {} + {} out of range",
                self.base_port,
                code.number()
            ))
        })?;
        Ok(SocketAddr::new(self.host, port))
    }
}

impl Transport for TcpTransport {
    type Listener = TcpLinkListener;

    async fn claim(&self, identity: &str) -> Result<TcpLinkListener> {
        let addr = self.address_for(identity)?;
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                log::debug!("Listening for {} on {}", identity, addr);
                Ok(TcpLinkListener { listener })
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                Err(SessionError::IdentityCollision(identity.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn connect(&self, identity: &str) -> Result<Link> {
        let addr = self.address_for(identity)?;
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                Ok(Link::from_stream(stream))
            }
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(SessionError::PeerUnavailable(identity.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Bound TCP port for a claimed identity
#[derive(Debug)]
pub struct TcpLinkListener {
    listener: TcpListener,
}

impl Listener for TcpLinkListener {
    async fn accept(&mut self) -> Result<Link> {
        let (stream, addr) = self.listener.accept().await?;
        log::debug!("Accepted peer from {}", addr);
        stream.set_nodelay(true)?;
        Ok(Link::from_stream(stream))
    }
}

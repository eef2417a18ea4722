//! Sync protocol state machine.
//!
//! Sits between the peer session and the match: decides what to send and how
//! inbound messages change local state. Callers do the I/O and pass the time in.

use std::time::{Duration, Instant};

use glam::Vec2;

use super::protocol::{StateSnapshot, SyncMessage};
use super::session::Role;
use crate::consts::*;
use crate::sim::{ArenaGeometry, MatchState, mirror_position};

/// Drops broadcasts that come sooner than `interval` after the last one sent.
/// Nothing is queued: the next tick carries a fresher snapshot anyway.
#[derive(Debug, Clone)]
pub struct BroadcastThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl BroadcastThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Take the send slot if the interval has elapsed
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }

    /// Record an out-of-band send so the window restarts from it
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

/// Protocol timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub ready_delay: Duration,
    pub broadcast_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ready_delay: Duration::from_millis(READY_DELAY_MS),
            broadcast_interval: Duration::from_millis(BROADCAST_INTERVAL_MS),
        }
    }
}

/// What an inbound message asks the local match to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncAction {
    /// Throw away the current match and begin a fresh one
    StartMatch,
    /// Overwrite puck and score (already mirrored into local orientation)
    ApplyState(StateSnapshot),
    /// Move the opponent paddle (already mirrored)
    MoveOpponent(Vec2),
}

/// Result of handling one message: something to send back and/or do locally
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reaction {
    pub reply: Option<SyncMessage>,
    pub action: Option<SyncAction>,
}

/// Per-session protocol state
#[derive(Debug, Clone)]
pub struct SyncChannel {
    role: Role,
    arena: ArenaGeometry,
    config: SyncConfig,
    ready_at: Option<Instant>,
    throttle: BroadcastThrottle,
}

impl SyncChannel {
    pub fn new(role: Role, arena: ArenaGeometry, config: SyncConfig) -> Self {
        Self {
            role,
            arena,
            config,
            ready_at: None,
            throttle: BroadcastThrottle::new(config.broadcast_interval),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Geometry used for mirroring
    pub fn set_arena(&mut self, arena: ArenaGeometry) {
        self.arena = arena;
    }

    /// Channel just opened. The guest waits `ready_delay` before announcing
    /// itself so the host has its handlers wired.
    pub fn channel_opened(&mut self, now: Instant) {
        if self.role == Role::Guest {
            self.ready_at = Some(now + self.config.ready_delay);
        }
    }

    /// Guest: `ready` once the delay has passed. Fires at most once per open.
    pub fn poll_ready(&mut self, now: Instant) -> Option<SyncMessage> {
        match self.ready_at {
            Some(at) if now >= at => {
                self.ready_at = None;
                log::debug!("Sending ready");
                Some(SyncMessage::Ready)
            }
            _ => None,
        }
    }

    /// Handle one inbound message
    pub fn receive(&mut self, message: SyncMessage) -> Reaction {
        match (self.role, message) {
            (Role::Host, SyncMessage::Ready) => Reaction {
                reply: Some(SyncMessage::Start),
                action: Some(SyncAction::StartMatch),
            },
            (Role::Guest, SyncMessage::Start) => Reaction {
                reply: None,
                action: Some(SyncAction::StartMatch),
            },
            (_, SyncMessage::Paddle { x, y }) => Reaction {
                reply: None,
                action: Some(SyncAction::MoveOpponent(mirror_position(
                    Vec2::new(x, y),
                    &self.arena,
                ))),
            },
            (Role::Guest, SyncMessage::GameState { state }) => Reaction {
                reply: None,
                action: Some(SyncAction::ApplyState(state.mirrored(&self.arena))),
            },
            (Role::Host, SyncMessage::PlayAgain) => Reaction {
                reply: Some(SyncMessage::Start),
                action: Some(SyncAction::StartMatch),
            },
            (Role::Guest, SyncMessage::PlayAgain) => Reaction {
                reply: None,
                action: Some(SyncAction::StartMatch),
            },
            (role, other) => {
                log::debug!("{:?} ignoring {} message", role, other.kind());
                Reaction::default()
            }
        }
    }

    /// Host: snapshot to broadcast, unless throttled
    pub fn broadcast_state(&mut self, state: &MatchState, now: Instant) -> Option<SyncMessage> {
        if self.role != Role::Host || !self.throttle.try_acquire(now) {
            return None;
        }
        Some(SyncMessage::GameState {
            state: StateSnapshot::capture(state),
        })
    }

    /// Host: snapshot that must go out regardless of the throttle (score changes)
    pub fn force_state(&mut self, state: &MatchState, now: Instant) -> Option<SyncMessage> {
        if self.role != Role::Host {
            return None;
        }
        self.throttle.mark_sent(now);
        Some(SyncMessage::GameState {
            state: StateSnapshot::capture(state),
        })
    }

    /// Relay the local paddle position
    pub fn paddle_moved(&self, pos: Vec2) -> SyncMessage {
        SyncMessage::paddle(pos)
    }

    /// Local rematch request: the host restarts at once, the guest asks
    pub fn request_rematch(&self) -> Reaction {
        match self.role {
            Role::Host => Reaction {
                reply: Some(SyncMessage::Start),
                action: Some(SyncAction::StartMatch),
            },
            Role::Guest => Reaction {
                reply: Some(SyncMessage::PlayAgain),
                action: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::PuckSnapshot;
    use crate::sim::Score;

    fn channel(role: Role) -> SyncChannel {
        SyncChannel::new(role, ArenaGeometry::default(), SyncConfig::default())
    }

    #[test]
    fn test_throttle_caps_rate() {
        let mut throttle = BroadcastThrottle::new(Duration::from_millis(BROADCAST_INTERVAL_MS));
        let t0 = Instant::now();
        let sent = (0..40)
            .map(|i| t0 + Duration::from_millis(i * 5))
            .filter(|&now| throttle.try_acquire(now))
            .count();
        // 200ms of attempts every 5ms
        assert!(sent <= 200_usize.div_ceil(33));
        assert!(sent >= 5);
    }

    #[test]
    fn test_forced_send_restarts_window() {
        let mut host = channel(Role::Host);
        let state = MatchState::new(&ArenaGeometry::default());
        let t0 = Instant::now();
        assert!(host.force_state(&state, t0).is_some());
        assert!(host.broadcast_state(&state, t0 + Duration::from_millis(10)).is_none());
        assert!(host.broadcast_state(&state, t0 + Duration::from_millis(33)).is_some());
    }

    #[test]
    fn test_guest_never_broadcasts_state() {
        let mut guest = channel(Role::Guest);
        let state = MatchState::new(&ArenaGeometry::default());
        assert!(guest.broadcast_state(&state, Instant::now()).is_none());
        assert!(guest.force_state(&state, Instant::now()).is_none());
    }

    #[test]
    fn test_guest_ready_after_delay_once() {
        let mut guest = channel(Role::Guest);
        let t0 = Instant::now();
        guest.channel_opened(t0);
        assert_eq!(guest.poll_ready(t0 + Duration::from_millis(499)), None);
        assert_eq!(
            guest.poll_ready(t0 + Duration::from_millis(500)),
            Some(SyncMessage::Ready)
        );
        assert_eq!(guest.poll_ready(t0 + Duration::from_millis(900)), None);

        let mut host = channel(Role::Host);
        host.channel_opened(t0);
        assert_eq!(host.poll_ready(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_ready_start_handshake() {
        let mut host = channel(Role::Host);
        let mut guest = channel(Role::Guest);

        let reaction = host.receive(SyncMessage::Ready);
        assert_eq!(reaction.reply, Some(SyncMessage::Start));
        assert_eq!(reaction.action, Some(SyncAction::StartMatch));

        let reaction = guest.receive(SyncMessage::Start);
        assert_eq!(reaction.reply, None);
        assert_eq!(reaction.action, Some(SyncAction::StartMatch));
    }

    #[test]
    fn test_game_state_is_mirrored_for_guest_and_ignored_by_host() {
        let arena = ArenaGeometry::default();
        let state = StateSnapshot {
            puck: PuckSnapshot {
                x: 100.0,
                y: 200.0,
                vx: 1.0,
                vy: 2.0,
            },
            score: Score {
                player: 1,
                opponent: 2,
            },
        };

        let mut guest = channel(Role::Guest);
        let reaction = guest.receive(SyncMessage::GameState { state });
        assert_eq!(
            reaction.action,
            Some(SyncAction::ApplyState(state.mirrored(&arena)))
        );

        let mut host = channel(Role::Host);
        assert_eq!(host.receive(SyncMessage::GameState { state }), Reaction::default());
    }

    #[test]
    fn test_paddle_is_mirrored_either_way() {
        let arena = ArenaGeometry::default();
        for role in [Role::Host, Role::Guest] {
            let mut sync = channel(role);
            let reaction = sync.receive(SyncMessage::Paddle { x: 150.0, y: 600.0 });
            assert_eq!(
                reaction.action,
                Some(SyncAction::MoveOpponent(Vec2::new(
                    arena.width - 150.0,
                    arena.height - 600.0
                )))
            );
        }
    }

    #[test]
    fn test_rematch_flow() {
        let host = channel(Role::Host);
        let guest = channel(Role::Guest);
        assert_eq!(
            host.request_rematch(),
            Reaction {
                reply: Some(SyncMessage::Start),
                action: Some(SyncAction::StartMatch)
            }
        );
        assert_eq!(
            guest.request_rematch(),
            Reaction {
                reply: Some(SyncMessage::PlayAgain),
                action: None
            }
        );

        let mut host = channel(Role::Host);
        let reaction = host.receive(SyncMessage::PlayAgain);
        assert_eq!(reaction.reply, Some(SyncMessage::Start));

        let mut guest = channel(Role::Guest);
        let reaction = guest.receive(SyncMessage::PlayAgain);
        assert_eq!(reaction.reply, None);
        assert_eq!(reaction.action, Some(SyncAction::StartMatch));
    }
}

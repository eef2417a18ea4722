//! Dispatcher loop
//!
//! One task owns the peer session, the sync channel and the current match.
//! Commands from the UI, inbound messages and display refreshes are handled one
//! at a time in `run`, so match state is never touched concurrently.

use std::time::Instant;

use glam::Vec2;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::MissedTickBehavior;

use crate::net::{
    PeerSession, Reaction, Role, RoomCode, SessionError, SyncAction, SyncChannel, SyncMessage,
    Transport,
};
use crate::settings::Settings;
use crate::sim::{ArenaGeometry, Match, Score, Side, SimEvent, apply_local_target};
use crate::view::{Frame, NullRenderer, Renderer};

/// Inputs the UI can send
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateSession,
    JoinSession(RoomCode),
    /// Raw pointer position, before clamping
    SetPaddleTarget(Vec2),
    Rematch,
    Disconnect,
    /// Viewport changed; bodies go back to the starting layout
    Resize { width: f32, height: f32 },
}

/// Outputs for rendering, audio and UI collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    WallBounce,
    PaddleHit,
    GoalScored(Side),
    MatchOver { local_won: bool, score: Score },
    ConnectionEstablished,
    ConnectionLost,
    ConnectionError(String),
    /// Host claimed a room and is waiting for the guest
    RoomCreated(RoomCode),
    MatchStarted(Role),
}

impl From<SimEvent> for GameEvent {
    fn from(event: SimEvent) -> Self {
        match event {
            SimEvent::WallBounce => GameEvent::WallBounce,
            SimEvent::PaddleHit => GameEvent::PaddleHit,
            SimEvent::GoalScored(side) => GameEvent::GoalScored(side),
            SimEvent::MatchOver { winner, score } => GameEvent::MatchOver {
                local_won: winner == Side::Player,
                score,
            },
        }
    }
}

/// Current time on the runtime's clock (pausable in tests)
fn clock() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// One peer: session, protocol state and the match in progress
#[derive(Debug)]
pub struct Game<T: Transport, R: Renderer = NullRenderer> {
    session: PeerSession<T>,
    sync: Option<SyncChannel>,
    current: Option<Match>,
    settings: Settings,
    arena: ArenaGeometry,
    renderer: R,
    events: UnboundedSender<GameEvent>,
}

impl<T: Transport, R: Renderer> Game<T, R> {
    /// Build a game and the receiver for its events
    pub fn new(transport: T, settings: Settings, renderer: R) -> (Self, UnboundedReceiver<GameEvent>) {
        let session = PeerSession::new(transport, settings.session_config());
        Self::with_session(session, settings, renderer)
    }

    pub fn with_session(
        session: PeerSession<T>,
        settings: Settings,
        renderer: R,
    ) -> (Self, UnboundedReceiver<GameEvent>) {
        let (events, rx) = unbounded_channel();
        let game = Self {
            session,
            sync: None,
            current: None,
            arena: settings.arena_geometry(),
            settings,
            renderer,
            events,
        };
        (game, rx)
    }

    pub fn session(&self) -> &PeerSession<T> {
        &self.session
    }

    pub fn current_match(&self) -> Option<&Match> {
        self.current.as_ref()
    }

    pub fn arena(&self) -> &ArenaGeometry {
        &self.arena
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn emit(&self, event: GameEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Handle one UI command. Create and join suspend until the channel
    /// opens, times out or fails.
    pub async fn handle_command(&mut self, command: Command) {
        match command {
            Command::CreateSession => self.create_session().await,
            Command::JoinSession(code) => self.join_session(code).await,
            Command::SetPaddleTarget(raw) => self.set_paddle_target(raw),
            Command::Rematch => self.request_rematch(clock()),
            Command::Disconnect => self.disconnect(),
            Command::Resize { width, height } => self.resize(width, height),
        }
    }

    async fn create_session(&mut self) {
        let code = match self.session.claim_room().await {
            Ok(code) => code,
            Err(e) => return self.connection_failed(e),
        };
        self.emit(GameEvent::RoomCreated(code));
        match self.session.await_guest().await {
            Ok(()) => self.channel_opened(Role::Host, clock()),
            Err(e) => self.connection_failed(e),
        }
    }

    async fn join_session(&mut self, code: RoomCode) {
        match self.session.join(&code).await {
            Ok(()) => self.channel_opened(Role::Guest, clock()),
            Err(e) => self.connection_failed(e),
        }
    }

    fn channel_opened(&mut self, role: Role, now: Instant) {
        let mut sync = SyncChannel::new(role, self.arena, self.settings.sync_config());
        sync.channel_opened(now);
        self.sync = Some(sync);
        self.emit(GameEvent::ConnectionEstablished);
    }

    fn connection_failed(&mut self, error: SessionError) {
        log::warn!("Connection failed: {}", error);
        self.session.disconnect();
        self.sync = None;
        self.emit(GameEvent::ConnectionError(error.to_string()));
    }

    /// Channel closed under an open session
    fn connection_lost(&mut self) {
        log::warn!("Connection lost");
        self.session.disconnect();
        self.sync = None;
        self.current = None;
        self.emit(GameEvent::ConnectionLost);
    }

    fn disconnect(&mut self) {
        self.session.disconnect();
        self.sync = None;
        self.current = None;
    }

    fn set_paddle_target(&mut self, raw: Vec2) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let pos = apply_local_target(&mut current.state, raw, &self.arena);
        if let Some(sync) = &self.sync {
            self.session.send(&sync.paddle_moved(pos));
        }
    }

    fn request_rematch(&mut self, now: Instant) {
        let Some(sync) = &self.sync else {
            return;
        };
        log::info!("Rematch requested");
        let reaction = sync.request_rematch();
        self.react(reaction, now);
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.arena = ArenaGeometry::from_viewport(width, height);
        if let Some(current) = self.current.as_mut() {
            current.resize(self.arena);
        }
        if let Some(sync) = self.sync.as_mut() {
            sync.set_arena(self.arena);
        }
    }

    /// Handle one inbound protocol message
    pub fn handle_message(&mut self, message: SyncMessage, now: Instant) {
        let Some(sync) = self.sync.as_mut() else {
            return;
        };
        let reaction = sync.receive(message);
        self.react(reaction, now);
    }

    fn react(&mut self, reaction: Reaction, now: Instant) {
        // Reply first: the host's `start` must leave before it starts simulating
        if let Some(reply) = reaction.reply {
            self.session.send(&reply);
        }
        match reaction.action {
            Some(SyncAction::StartMatch) => self.start_match(now),
            Some(SyncAction::ApplyState(state)) => {
                if let Some(current) = self.current.as_mut() {
                    let events = current.apply_remote(state.puck.pos(), state.puck.vel(), state.score);
                    for event in events {
                        self.emit(event.into());
                    }
                }
            }
            Some(SyncAction::MoveOpponent(pos)) => {
                if let Some(current) = self.current.as_mut() {
                    current.set_opponent_paddle(pos);
                }
            }
            None => {}
        }
    }

    /// Replace the match wholesale with a fresh one
    fn start_match(&mut self, now: Instant) {
        let Some(role) = self.sync.as_ref().map(SyncChannel::role) else {
            return;
        };
        self.current = Some(Match::new(
            self.arena,
            self.settings.match_rules(),
            rand::random(),
            now,
        ));
        self.session.mark_ready();
        self.session.begin_playing();
        log::info!("Match started as {:?}", role);
        self.emit(GameEvent::MatchStarted(role));
    }

    /// One display refresh: step physics (host), send ready (guest), render (both).
    ///
    /// A goal tick still sends one unthrottled `gameState` so the guest learns
    /// the new score; after that a finished match sends nothing.
    pub fn frame(&mut self, now: Instant) {
        if let Some(sync) = self.sync.as_mut() {
            match sync.role() {
                Role::Host => {
                    if let Some(current) = self.current.as_mut().filter(|m| !m.is_over()) {
                        let report = current.step(now);
                        let message = if report.goal.is_some() {
                            sync.force_state(&current.state, now)
                        } else {
                            sync.broadcast_state(&current.state, now)
                        };
                        if let Some(message) = message {
                            self.session.send(&message);
                        }
                        for event in report.events {
                            let _ = self.events.send(event.into());
                        }
                    }
                }
                Role::Guest => {
                    if let Some(ready) = sync.poll_ready(now) {
                        self.session.send(&ready);
                    }
                }
            }
        }

        let frame = Frame {
            role: self.session.role(),
            session: self.session.state(),
            room: self.session.room_code(),
            arena: &self.arena,
            current: self.current.as_ref(),
        };
        self.renderer.render(&frame);
    }

    /// Create or join while still listening for `Disconnect`, which abandons
    /// the attempt and releases whatever it had claimed. Other commands that
    /// arrive meanwhile are applied once the attempt settles.
    ///
    /// Returns false once the command sender is gone.
    async fn connect_or_cancel(
        &mut self,
        command: Command,
        commands: &mut UnboundedReceiver<Command>,
    ) -> bool {
        let mut deferred = Vec::new();
        let interrupted = {
            let connecting = self.handle_command(command);
            tokio::pin!(connecting);
            loop {
                tokio::select! {
                    () = &mut connecting => break None,
                    next = commands.recv() => match next {
                        Some(Command::Disconnect) => break Some(true),
                        Some(Command::CreateSession | Command::JoinSession(_)) => {
                            log::warn!("Already connecting, ignoring another create/join");
                        }
                        Some(other) => deferred.push(other),
                        None => break Some(false),
                    },
                }
            }
        };

        match interrupted {
            None => {
                for command in deferred {
                    self.handle_command(command).await;
                }
                true
            }
            Some(keep_running) => {
                log::info!("Connection attempt abandoned");
                self.disconnect();
                keep_running
            }
        }
    }

    /// Run until the command sender is dropped
    pub async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        let mut frames = tokio::time::interval(self.settings.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let linked = self.session.has_link();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command @ (Command::CreateSession | Command::JoinSession(_))) => {
                        if !self.connect_or_cancel(command, &mut commands).await {
                            break;
                        }
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                message = self.session.recv(), if linked => match message {
                    Some(message) => self.handle_message(message, clock()),
                    None => self.connection_lost(),
                },
                _ = frames.tick() => self.frame(clock()),
            }
        }

        self.session.disconnect();
        log::debug!("Game loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::consts::*;
    use crate::net::{MemoryTransport, SessionState};
    use crate::sim::MatchPhase;

    type TestGame = Game<MemoryTransport>;

    fn game(transport: &MemoryTransport) -> (TestGame, UnboundedReceiver<GameEvent>) {
        Game::new(transport.clone(), Settings::default(), NullRenderer)
    }

    fn drain(rx: &mut UnboundedReceiver<GameEvent>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Deliver the next inbound message
    async fn pump(game: &mut TestGame, now: Instant) {
        let message = game.session.recv().await.unwrap();
        game.handle_message(message, now);
    }

    async fn connect(
        transport: &MemoryTransport,
    ) -> (
        (TestGame, UnboundedReceiver<GameEvent>),
        (TestGame, UnboundedReceiver<GameEvent>),
    ) {
        let (mut host, mut host_rx) = game(transport);
        let (mut guest, guest_rx) = game(transport);
        let join = async {
            let code = loop {
                match host_rx.recv().await {
                    Some(GameEvent::RoomCreated(code)) => break code,
                    Some(_) => {}
                    None => panic!("host dropped its events"),
                }
            };
            guest.handle_command(Command::JoinSession(code)).await;
        };
        tokio::join!(host.handle_command(Command::CreateSession), join);
        ((host, host_rx), (guest, guest_rx))
    }

    /// Connect and run the ready/start handshake
    async fn playing(
        transport: &MemoryTransport,
    ) -> (
        (TestGame, UnboundedReceiver<GameEvent>),
        (TestGame, UnboundedReceiver<GameEvent>),
    ) {
        let ((mut host, host_rx), (mut guest, guest_rx)) = connect(transport).await;
        let now = clock() + Duration::from_millis(READY_DELAY_MS);
        guest.frame(now);
        pump(&mut host, now).await;
        pump(&mut guest, now).await;
        ((host, host_rx), (guest, guest_rx))
    }

    #[tokio::test]
    async fn test_connect_emits_established_on_both_sides() {
        let transport = MemoryTransport::new();
        let ((host, mut host_rx), (guest, mut guest_rx)) = connect(&transport).await;
        assert_eq!(drain(&mut host_rx), vec![GameEvent::ConnectionEstablished]);
        assert_eq!(drain(&mut guest_rx), vec![GameEvent::ConnectionEstablished]);
        assert_eq!(host.session().state(), SessionState::Connected);
        assert_eq!(guest.session().state(), SessionState::Connected);
        assert!(host.current_match().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_waits_before_ready() {
        let transport = MemoryTransport::new();
        let ((mut host, _), (mut guest, _)) = connect(&transport).await;
        guest.frame(clock());
        guest.session.send(&SyncMessage::PlayAgain);
        // First thing the host sees is our marker, not an early ready
        assert_eq!(host.session.recv().await, Some(SyncMessage::PlayAgain));
    }

    #[tokio::test]
    async fn test_handshake_starts_fresh_matches() {
        let transport = MemoryTransport::new();
        let ((host, mut host_rx), (guest, mut guest_rx)) = playing(&transport).await;

        assert!(drain(&mut host_rx).contains(&GameEvent::MatchStarted(Role::Host)));
        assert!(drain(&mut guest_rx).contains(&GameEvent::MatchStarted(Role::Guest)));
        assert_eq!(host.session().state(), SessionState::Playing);
        assert_eq!(guest.session().state(), SessionState::Playing);

        let arena = *host.arena();
        for current in [host.current_match().unwrap(), guest.current_match().unwrap()] {
            assert_eq!(current.score(), Score::default());
            assert_eq!(current.phase(), MatchPhase::InPlay);
            assert_eq!(current.state.puck.body.pos, arena.center());
        }
    }

    #[tokio::test]
    async fn test_guest_mirrors_host_state() {
        let transport = MemoryTransport::new();
        let ((mut host, _), (mut guest, _)) = playing(&transport).await;

        let current = host.current.as_mut().unwrap();
        current.state.puck.body.pos = Vec2::new(100.0, 200.0);
        current.state.puck.body.vel = Vec2::new(2.0, -1.0);
        let now = clock() + Duration::from_secs(1);
        host.frame(now);
        let sent = host.current_match().unwrap().state.puck.body;

        pump(&mut guest, now).await;
        let arena = *guest.arena();
        let seen = guest.current_match().unwrap().state.puck.body;
        assert_eq!(seen.pos, Vec2::new(arena.width - sent.pos.x, arena.height - sent.pos.y));
        assert_eq!(seen.vel, -sent.vel);
    }

    #[tokio::test]
    async fn test_paddle_relay_lands_on_opponent() {
        let transport = MemoryTransport::new();
        let ((mut host, _), (mut guest, _)) = playing(&transport).await;

        guest
            .handle_command(Command::SetPaddleTarget(Vec2::new(120.0, 600.0)))
            .await;
        assert_eq!(
            guest.current_match().unwrap().state.player.body.pos,
            Vec2::new(120.0, 600.0)
        );

        pump(&mut host, clock()).await;
        let arena = *host.arena();
        assert_eq!(
            host.current_match().unwrap().state.opponent.body.pos,
            Vec2::new(arena.width - 120.0, arena.height - 600.0)
        );
    }

    #[tokio::test]
    async fn test_goal_reaches_guest_unthrottled() {
        let transport = MemoryTransport::new();
        let ((mut host, mut host_rx), (mut guest, mut guest_rx)) = playing(&transport).await;
        drain(&mut host_rx);
        drain(&mut guest_rx);

        let t0 = clock() + Duration::from_secs(1);
        // Regular broadcast, then a goal inside the same throttle window
        host.frame(t0);
        let arena = *host.arena();
        let current = host.current.as_mut().unwrap();
        let r = current.state.puck.body.radius;
        current.state.puck.body.pos = Vec2::new(arena.width / 2.0, arena.max_y(r) - 1.0);
        current.state.puck.body.vel = Vec2::new(0.0, 10.0);
        current.state.player.body.pos = Vec2::new(arena.min_x(30.0) + 1.0, arena.height * 0.75);
        host.frame(t0 + Duration::from_millis(10));

        assert!(drain(&mut host_rx).contains(&GameEvent::GoalScored(Side::Opponent)));

        pump(&mut guest, t0).await;
        pump(&mut guest, t0).await;
        assert_eq!(
            guest.current_match().unwrap().score(),
            Score {
                player: 1,
                opponent: 0
            }
        );
        assert_eq!(drain(&mut guest_rx), vec![GameEvent::GoalScored(Side::Player)]);
    }

    #[tokio::test]
    async fn test_host_stops_broadcasting_after_match_over() {
        let transport = MemoryTransport::new();
        let ((mut host, mut host_rx), (mut guest, mut guest_rx)) = playing(&transport).await;
        drain(&mut host_rx);

        let arena = *host.arena();
        let current = host.current.as_mut().unwrap();
        current.state.score = Score {
            player: 10,
            opponent: 10,
        };
        let r = current.state.puck.body.radius;
        current.state.puck.body.pos = Vec2::new(arena.width / 2.0, arena.min_y(r) + 1.0);
        current.state.puck.body.vel = Vec2::new(0.0, -10.0);
        current.state.opponent.body.pos = Vec2::new(arena.min_x(30.0) + 1.0, arena.height * 0.25);

        let t0 = clock() + Duration::from_secs(1);
        host.frame(t0);
        assert!(drain(&mut host_rx).contains(&GameEvent::MatchOver {
            local_won: true,
            score: Score {
                player: 11,
                opponent: 10
            }
        }));

        for i in 1..10 {
            host.frame(t0 + Duration::from_millis(40 * i));
        }
        pump(&mut guest, t0).await;
        assert!(guest.current_match().unwrap().is_over());
        assert!(drain(&mut guest_rx).contains(&GameEvent::MatchOver {
            local_won: false,
            score: Score {
                player: 10,
                opponent: 11
            }
        }));

        // Only the final snapshot was sent
        host.session.send(&SyncMessage::Start);
        assert_eq!(guest.session.recv().await, Some(SyncMessage::Start));
    }

    #[tokio::test]
    async fn test_rematch_from_guest_restarts_both() {
        let transport = MemoryTransport::new();
        let ((mut host, mut host_rx), (mut guest, mut guest_rx)) = playing(&transport).await;
        host.current.as_mut().unwrap().state.score = Score {
            player: 4,
            opponent: 2,
        };
        drain(&mut host_rx);
        drain(&mut guest_rx);

        guest.handle_command(Command::Rematch).await;
        pump(&mut host, clock()).await;
        pump(&mut guest, clock()).await;

        assert_eq!(drain(&mut host_rx), vec![GameEvent::MatchStarted(Role::Host)]);
        assert_eq!(drain(&mut guest_rx), vec![GameEvent::MatchStarted(Role::Guest)]);
        assert_eq!(host.current_match().unwrap().score(), Score::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_without_host_reports_error() {
        let transport = MemoryTransport::new();
        let (mut guest, mut rx) = game(&transport);
        let started = tokio::time::Instant::now();
        guest
            .handle_command(Command::JoinSession("4821".parse().unwrap()))
            .await;
        assert!(started.elapsed() >= Duration::from_millis(GUEST_CONNECT_TIMEOUT_MS));
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GameEvent::ConnectionError(_)));
        assert!(guest.current_match().is_none());
        assert_eq!(guest.session().state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_resize_resets_layout() {
        let transport = MemoryTransport::new();
        let ((mut host, _), _guest) = playing(&transport).await;
        host.current.as_mut().unwrap().state.puck.body.pos = Vec2::new(5.0, 5.0);
        host.handle_command(Command::Resize {
            width: 800.0,
            height: 1400.0,
        })
        .await;
        let arena = *host.arena();
        assert_eq!(arena.width, 800.0);
        assert_eq!(host.current_match().unwrap().state.puck.body.pos, arena.center());
    }

    async fn next_room(rx: &mut UnboundedReceiver<GameEvent>) -> RoomCode {
        loop {
            match rx.recv().await {
                Some(GameEvent::RoomCreated(code)) => return code,
                Some(_) => {}
                None => panic!("game stopped"),
            }
        }
    }

    #[tokio::test]
    async fn test_peer_leaving_after_last_message_is_noticed() {
        let transport = MemoryTransport::new();
        let ((host, mut host_rx), (mut guest, _)) = playing(&transport).await;
        drain(&mut host_rx);

        // A frame still queued when the peer leaves must not hide the close
        guest
            .handle_command(Command::SetPaddleTarget(Vec2::new(120.0, 600.0)))
            .await;
        guest.handle_command(Command::Disconnect).await;

        let (_commands, command_rx) = unbounded_channel();
        let running = tokio::spawn(host.run(command_rx));
        let lost = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                match host_rx.recv().await {
                    Some(GameEvent::ConnectionLost) => return true,
                    Some(_) => {}
                    None => return false,
                }
            }
        })
        .await;
        running.abort();
        assert_eq!(lost, Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_abandons_waiting_room() {
        let transport = MemoryTransport::new();
        let (host, mut host_rx) = game(&transport);
        let (commands, command_rx) = unbounded_channel();
        let running = tokio::spawn(host.run(command_rx));

        commands.send(Command::CreateSession).unwrap();
        let code = next_room(&mut host_rx).await;
        assert!(transport.is_claimed(&code.identity()));

        commands.send(Command::Disconnect).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!transport.is_claimed(&code.identity()));
        assert!(
            !drain(&mut host_rx)
                .iter()
                .any(|e| matches!(e, GameEvent::ConnectionError(_)))
        );

        // The loop is still taking commands
        commands.send(Command::CreateSession).unwrap();
        let again = next_room(&mut host_rx).await;
        assert!(transport.is_claimed(&again.identity()));
        running.abort();
    }

    #[tokio::test]
    async fn test_disconnect_clears_everything() {
        let transport = MemoryTransport::new();
        let ((mut host, _), (mut guest, _)) = playing(&transport).await;
        guest.handle_command(Command::Disconnect).await;
        assert!(guest.current_match().is_none());
        assert_eq!(guest.session().state(), SessionState::Disconnected);
        assert_eq!(host.session.recv().await, None);
    }
}

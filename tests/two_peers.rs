//! Host and guest games talking over the in-process transport

use std::sync::{Arc, Mutex};
use std::time::Duration;

use glam::Vec2;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use hockey_link::net::{MemoryTransport, Role, SessionState};
use hockey_link::sim::{MatchState, Score};
use hockey_link::view::{Frame, Renderer};
use hockey_link::{Command, Game, GameEvent, Settings};

/// Last frame each peer rendered
#[derive(Debug, Default)]
struct Seen {
    session: Option<SessionState>,
    state: Option<MatchState>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Seen>>);

impl Renderer for Recorder {
    fn render(&mut self, frame: &Frame<'_>) {
        let mut seen = self.0.lock().unwrap();
        seen.session = Some(frame.session);
        seen.state = frame.state().cloned();
    }
}

struct Peer {
    commands: UnboundedSender<Command>,
    events: UnboundedReceiver<GameEvent>,
    seen: Recorder,
}

fn spawn_peer(transport: &MemoryTransport) -> Peer {
    let seen = Recorder::default();
    let (game, events) = Game::new(transport.clone(), Settings::default(), seen.clone());
    let (commands, command_rx) = unbounded_channel();
    tokio::spawn(game.run(command_rx));
    Peer {
        commands,
        events,
        seen,
    }
}

async fn wait_for(peer: &mut Peer, wanted: impl Fn(&GameEvent) -> bool) -> GameEvent {
    let found = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match peer.events.recv().await {
                Some(event) if wanted(&event) => return event,
                Some(_) => {}
                None => panic!("game stopped"),
            }
        }
    })
    .await;
    found.expect("event did not arrive")
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

async fn start_match(transport: &MemoryTransport) -> (Peer, Peer) {
    let mut host = spawn_peer(transport);
    let mut guest = spawn_peer(transport);

    host.commands.send(Command::CreateSession).unwrap();
    let GameEvent::RoomCreated(code) =
        wait_for(&mut host, |e| matches!(e, GameEvent::RoomCreated(_))).await
    else {
        unreachable!()
    };
    guest.commands.send(Command::JoinSession(code)).unwrap();

    wait_for(&mut host, |e| *e == GameEvent::MatchStarted(Role::Host)).await;
    wait_for(&mut guest, |e| *e == GameEvent::MatchStarted(Role::Guest)).await;
    (host, guest)
}

#[tokio::test(start_paused = true)]
async fn handshake_puts_both_peers_in_play() {
    let transport = MemoryTransport::new();
    let (host, guest) = start_match(&transport).await;
    settle().await;

    for peer in [&host, &guest] {
        let seen = peer.seen.0.lock().unwrap();
        assert_eq!(seen.session, Some(SessionState::Playing));
        let state = seen.state.as_ref().unwrap();
        assert_eq!(state.score, Score::default());
    }
}

#[tokio::test(start_paused = true)]
async fn guest_paddle_shows_up_mirrored_on_host() {
    let transport = MemoryTransport::new();
    let (host, guest) = start_match(&transport).await;

    guest
        .commands
        .send(Command::SetPaddleTarget(Vec2::new(150.0, 600.0)))
        .unwrap();
    settle().await;

    let seen = host.seen.0.lock().unwrap();
    let opponent = seen.state.as_ref().unwrap().opponent.body.pos;
    assert_eq!(opponent, Vec2::new(400.0 - 150.0, 700.0 - 600.0));
}

#[tokio::test(start_paused = true)]
async fn guest_tracks_host_puck() {
    let transport = MemoryTransport::new();
    let (host, guest) = start_match(&transport).await;

    // Host drives its paddle up through the resting puck
    host.commands
        .send(Command::SetPaddleTarget(Vec2::new(200.0, 380.0)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let host_puck = host.seen.0.lock().unwrap().state.as_ref().unwrap().puck.body;
    let guest_puck = guest.seen.0.lock().unwrap().state.as_ref().unwrap().puck.body;
    // Knocked upfield on the host, which the guest sees as its own half
    assert!(host_puck.pos.y < 350.0);
    assert!(guest_puck.pos.y > 350.0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_seen_as_connection_lost() {
    let transport = MemoryTransport::new();
    let (mut host, guest) = start_match(&transport).await;

    guest.commands.send(Command::Disconnect).unwrap();
    wait_for(&mut host, |e| *e == GameEvent::ConnectionLost).await;
    settle().await;

    let seen = host.seen.0.lock().unwrap();
    assert_eq!(seen.session, Some(SessionState::Disconnected));
    assert!(seen.state.is_none());
}

#[tokio::test(start_paused = true)]
async fn join_unknown_room_fails() {
    let transport = MemoryTransport::new();
    let mut guest = spawn_peer(&transport);
    guest
        .commands
        .send(Command::JoinSession("4821".parse().unwrap()))
        .unwrap();
    let event = wait_for(&mut guest, |e| matches!(e, GameEvent::ConnectionError(_))).await;
    assert!(matches!(event, GameEvent::ConnectionError(_)));
    assert!(guest.seen.0.lock().unwrap().state.is_none());
}

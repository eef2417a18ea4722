//! Hockey Link headless peer
//!
//! `hockey-link host` claims a room and waits for a guest;
//! `hockey-link join <code>` connects to one. The local paddle is flown by
//! the autopilot so two terminals can play a full match over TCP.

use std::process::ExitCode;

use env_logger::Env;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use hockey_link::net::RoomCode;
use hockey_link::sim::autopilot_target;
use hockey_link::view::{Frame, Renderer};
use hockey_link::{Command, Game, GameEvent, Settings};

enum Mode {
    Host,
    Join(RoomCode),
}

fn parse_args() -> Result<Mode, String> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("host") => Ok(Mode::Host),
        Some("join") => {
            let code = args.next().ok_or("join needs a room code")?;
            code.parse().map(Mode::Join).map_err(|e| format!("{e}"))
        }
        _ => Err("usage: hockey-link host | hockey-link join <code>".to_string()),
    }
}

/// Steers the local paddle and logs status changes
struct Autopilot {
    commands: UnboundedSender<Command>,
    last_status: String,
}

impl Renderer for Autopilot {
    fn render(&mut self, frame: &Frame<'_>) {
        let status = frame.status_line();
        if status != self.last_status {
            log::info!("{}", status);
            self.last_status = status;
        }

        if let Some(state) = frame.state() {
            let target = autopilot_target(state, frame.arena);
            let _ = self.commands.send(Command::SetPaddleTarget(target));
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mode = match parse_args() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let settings = Settings::load();
    let (commands, command_rx) = unbounded_channel();
    let autopilot = Autopilot {
        commands: commands.clone(),
        last_status: String::new(),
    };
    let (game, mut events) = Game::new(settings.tcp_transport(), settings, autopilot);
    let game_task = tokio::spawn(game.run(command_rx));

    let first = match mode {
        Mode::Host => Command::CreateSession,
        Mode::Join(code) => Command::JoinSession(code),
    };
    let _ = commands.send(first);

    let code = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(GameEvent::RoomCreated(code)) => {
                    println!("Room code: {code}");
                }
                Some(GameEvent::ConnectionEstablished) => log::info!("Peer connected"),
                Some(GameEvent::MatchStarted(role)) => log::info!("Match started ({:?})", role),
                Some(GameEvent::GoalScored(side)) => log::info!("Goal for {:?}", side),
                Some(GameEvent::MatchOver { local_won, score }) => {
                    let verdict = if local_won { "You win" } else { "You lose" };
                    println!("{verdict} {}-{}", score.player, score.opponent);
                }
                Some(GameEvent::ConnectionError(detail)) => {
                    eprintln!("Connection failed: {detail}");
                    break ExitCode::FAILURE;
                }
                Some(GameEvent::ConnectionLost) => {
                    eprintln!("Connection lost");
                    break ExitCode::FAILURE;
                }
                Some(GameEvent::WallBounce | GameEvent::PaddleHit) => {}
                None => break ExitCode::SUCCESS,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                let _ = commands.send(Command::Disconnect);
                break ExitCode::SUCCESS;
            }
        }
    };

    // The autopilot holds a sender too, so the loop only ends once aborted
    game_task.abort();
    code
}

//! Rendering collaborator seam
//!
//! Drawing, audio and menus live outside this crate. Every display refresh the
//! game hands a read-only `Frame` to whatever `Renderer` it was built with.

use std::fmt::Write;

use crate::net::{Role, RoomCode, SessionState};
use crate::sim::{ArenaGeometry, Match, MatchPhase, MatchState, Score};

/// Everything a renderer may look at for one refresh
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub role: Option<Role>,
    pub session: SessionState,
    pub room: Option<&'a RoomCode>,
    pub arena: &'a ArenaGeometry,
    pub current: Option<&'a Match>,
}

impl<'a> Frame<'a> {
    pub fn state(&self) -> Option<&'a MatchState> {
        self.current.map(|m| &m.state)
    }

    pub fn phase(&self) -> Option<MatchPhase> {
        self.current.map(Match::phase)
    }

    pub fn score(&self) -> Option<Score> {
        self.current.map(Match::score)
    }

    /// One-line summary, e.g. `host room 4821 playing 3-2`
    pub fn status_line(&self) -> String {
        let mut line = match self.role {
            Some(Role::Host) => "host".to_string(),
            Some(Role::Guest) => "guest".to_string(),
            None => "idle".to_string(),
        };
        if let Some(room) = self.room {
            let _ = write!(line, " room {room}");
        }
        let _ = write!(line, " {:?}", self.session);
        if let Some(score) = self.score() {
            let _ = write!(line, " {}-{}", score.player, score.opponent);
        }
        if let Some(MatchPhase::MatchOver { winner }) = self.phase() {
            let _ = write!(line, " ({winner:?} wins)");
        }
        line.to_lowercase()
    }
}

/// Draws the current frame
pub trait Renderer: Send {
    fn render(&mut self, frame: &Frame<'_>);
}

/// Renders nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &Frame<'_>) {}
}

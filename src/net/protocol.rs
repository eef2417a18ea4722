//! Wire protocol
//!
//! One JSON object per frame, tagged by `type`:
//!
//! ```json
//! {"type":"ready"}
//! {"type":"start"}
//! {"type":"paddle","x":200.0,"y":525.0}
//! {"type":"gameState","state":{"puck":{"x":1,"y":2,"vx":0,"vy":0},"score":{"player":0,"opponent":0}}}
//! {"type":"playAgain"}
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::error::Result;
use crate::sim::{ArenaGeometry, MatchState, Score, mirror_position, mirror_score, mirror_velocity};

/// Puck position and velocity as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PuckSnapshot {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl PuckSnapshot {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn vel(&self) -> Vec2 {
        Vec2::new(self.vx, self.vy)
    }
}

/// Authoritative state the host broadcasts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub puck: PuckSnapshot,
    pub score: Score,
}

impl StateSnapshot {
    /// Capture the host's current view
    pub fn capture(state: &MatchState) -> Self {
        let body = &state.puck.body;
        Self {
            puck: PuckSnapshot {
                x: body.pos.x,
                y: body.pos.y,
                vx: body.vel.x,
                vy: body.vel.y,
            },
            score: state.score,
        }
    }

    /// The same state seen from the other seat
    pub fn mirrored(&self, arena: &ArenaGeometry) -> Self {
        let pos = mirror_position(self.puck.pos(), arena);
        let vel = mirror_velocity(self.puck.vel());
        Self {
            puck: PuckSnapshot {
                x: pos.x,
                y: pos.y,
                vx: vel.x,
                vy: vel.y,
            },
            score: mirror_score(self.score),
        }
    }
}

/// Every message either peer can send
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncMessage {
    /// Guest has its handlers wired and wants to play
    Ready,
    /// Host starts a new match
    Start,
    /// Sender's own paddle position, in the sender's orientation
    Paddle { x: f32, y: f32 },
    /// Host's authoritative snapshot, in the host's orientation
    GameState { state: StateSnapshot },
    /// Rematch request
    PlayAgain,
}

impl SyncMessage {
    pub fn paddle(pos: Vec2) -> Self {
        SyncMessage::Paddle { x: pos.x, y: pos.y }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Ready => "ready",
            SyncMessage::Start => "start",
            SyncMessage::Paddle { .. } => "paddle",
            SyncMessage::GameState { .. } => "gameState",
            SyncMessage::PlayAgain => "playAgain",
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}

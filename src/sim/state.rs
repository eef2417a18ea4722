//! Match state and core simulation types
//!
//! Everything the host simulates and the guest mirrors lives here.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Which seat a body or score belongs to, from the local client's point of view.
///
/// The local client is always `Player` at the bottom of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Player,
    Opponent,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }
}

/// Shared shape for the puck and both paddles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
}

impl Body {
    pub fn at_rest(pos: Vec2, radius: f32) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            radius,
        }
    }
}

/// The puck, with its visual trail (newest first)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Puck {
    pub body: Body,
    #[serde(skip)]
    pub trail: Vec<Vec2>,
}

impl Puck {
    pub fn new(pos: Vec2, radius: f32) -> Self {
        Self {
            body: Body::at_rest(pos, radius),
            trail: Vec::with_capacity(TRAIL_LENGTH + 1),
        }
    }

    /// Record current position to trail (call each tick)
    pub fn record_trail(&mut self) {
        self.trail.insert(0, self.body.pos);
        if self.trail.len() > TRAIL_LENGTH {
            self.trail.pop();
        }
    }

    /// Clear trail (on reset)
    pub fn clear_trail(&mut self) {
        self.trail.clear();
    }
}

/// A paddle, tagged with the seat it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub body: Body,
    pub role: Side,
}

impl Paddle {
    pub fn new(role: Side, pos: Vec2, radius: f32) -> Self {
        Self {
            body: Body::at_rest(pos, radius),
            role,
        }
    }

    /// Move to a new position, estimating velocity from the displacement
    pub fn move_to(&mut self, target: Vec2) {
        self.body.vel = (target - self.body.pos) * PADDLE_VELOCITY_FACTOR;
        self.body.pos = target;
    }
}

/// Goals per side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub player: u32,
    pub opponent: u32,
}

impl Score {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::Player => self.player,
            Side::Opponent => self.opponent,
        }
    }

    /// Add one goal for `side` and return the new total
    pub fn award(&mut self, side: Side) -> u32 {
        let slot = match side {
            Side::Player => &mut self.player,
            Side::Opponent => &mut self.opponent,
        };
        *slot += 1;
        *slot
    }

    /// The side that has reached `winning_score`, if any
    pub fn winner(&self, winning_score: u32) -> Option<Side> {
        if self.player >= winning_score {
            Some(Side::Player)
        } else if self.opponent >= winning_score {
            Some(Side::Opponent)
        } else {
            None
        }
    }
}

/// Arena dimensions, derived once per viewport size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArenaGeometry {
    pub width: f32,
    pub height: f32,
    pub wall_thickness: f32,
    pub goal_width: f32,
    pub paddle_radius: f32,
    pub puck_radius: f32,
}

impl Default for ArenaGeometry {
    fn default() -> Self {
        Self::from_viewport(ARENA_WIDTH, ARENA_HEIGHT)
    }
}

impl ArenaGeometry {
    /// Scale walls, goal mouth and bodies to the viewport
    pub fn from_viewport(width: f32, height: f32) -> Self {
        let short_side = width.min(height);
        Self {
            width,
            height,
            wall_thickness: (short_side * 0.025).max(2.0),
            // Always narrower than the arena
            goal_width: width * 0.4,
            paddle_radius: short_side * 0.075,
            puck_radius: short_side * 0.045,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Lowest x a body of `radius` may occupy
    #[inline]
    pub fn min_x(&self, radius: f32) -> f32 {
        self.wall_thickness + radius
    }

    #[inline]
    pub fn max_x(&self, radius: f32) -> f32 {
        self.width - self.wall_thickness - radius
    }

    #[inline]
    pub fn min_y(&self, radius: f32) -> f32 {
        self.wall_thickness + radius
    }

    #[inline]
    pub fn max_y(&self, radius: f32) -> f32 {
        self.height - self.wall_thickness - radius
    }

    /// Left edge of the goal mouth
    pub fn goal_left(&self) -> f32 {
        (self.width - self.goal_width) / 2.0
    }

    /// Right edge of the goal mouth
    pub fn goal_right(&self) -> f32 {
        self.goal_left() + self.goal_width
    }

    /// Starting spot for a paddle
    pub fn paddle_home(&self, side: Side) -> Vec2 {
        match side {
            Side::Player => Vec2::new(self.width / 2.0, self.height * 0.75),
            Side::Opponent => Vec2::new(self.width / 2.0, self.height * 0.25),
        }
    }
}

/// Authoritative record of puck, paddles and score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchState {
    pub puck: Puck,
    pub player: Paddle,
    pub opponent: Paddle,
    pub score: Score,
}

impl MatchState {
    /// Fresh state in the starting layout
    pub fn new(arena: &ArenaGeometry) -> Self {
        Self {
            puck: Puck::new(arena.center(), arena.puck_radius),
            player: Paddle::new(Side::Player, arena.paddle_home(Side::Player), arena.paddle_radius),
            opponent: Paddle::new(
                Side::Opponent,
                arena.paddle_home(Side::Opponent),
                arena.paddle_radius,
            ),
            score: Score::default(),
        }
    }

    /// Put every body back in the starting layout for a new geometry.
    /// The score is kept.
    pub fn relayout(&mut self, arena: &ArenaGeometry) {
        let score = self.score;
        *self = Self::new(arena);
        self.score = score;
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::Player => &self.player,
            Side::Opponent => &self.opponent,
        }
    }

    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::Player => &mut self.player,
            Side::Opponent => &mut self.opponent,
        }
    }
}

//! Seat mirroring
//!
//! Each client renders itself at the bottom of the arena, so anything crossing
//! the link is rotated half a turn about the arena center and the score is
//! swapped. Every transform here is its own inverse.

use glam::Vec2;

use super::state::{ArenaGeometry, Score};

/// Reflect a position through the arena center
#[inline]
pub fn mirror_position(pos: Vec2, arena: &ArenaGeometry) -> Vec2 {
    Vec2::new(arena.width - pos.x, arena.height - pos.y)
}

/// Reverse a velocity
#[inline]
pub fn mirror_velocity(vel: Vec2) -> Vec2 {
    -vel
}

/// Swap player and opponent
#[inline]
pub fn mirror_score(score: Score) -> Score {
    Score {
        player: score.opponent,
        opponent: score.player,
    }
}

//! Collision detection and response for the puck
//!
//! Walls are axis-aligned; paddles are circles. All functions are pure
//! apart from mutating the bodies they are handed.

use glam::Vec2;

use super::state::{ArenaGeometry, Body, Side};
use crate::consts::*;

/// Outcome of checking the top and bottom walls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndWallContact {
    /// Puck stayed inside the arena
    Clear,
    /// Puck bounced off the wall beside a goal mouth
    Bounce,
    /// Puck entered a goal mouth
    Goal { scorer: Side },
}

/// Exponential velocity decay normalized to `dt`
#[inline]
pub fn apply_friction(vel: Vec2, dt: f32) -> Vec2 {
    vel * FRICTION.powf(dt)
}

/// Rescale `vel` so its length never exceeds `max_speed`, keeping direction
pub fn clamp_speed(vel: Vec2, max_speed: f32) -> Vec2 {
    let speed = vel.length();
    if speed <= max_speed {
        return vel;
    }
    let mut clamped = vel * (max_speed / speed);
    // Rounding can leave the rescaled length one ulp over the cap
    while clamped.length() > max_speed {
        clamped *= 1.0 - f32::EPSILON;
    }
    clamped
}

/// Bounce off the left/right walls. Returns true on contact.
pub fn resolve_side_walls(body: &mut Body, arena: &ArenaGeometry) -> bool {
    let min_x = arena.min_x(body.radius);
    let max_x = arena.max_x(body.radius);

    if body.pos.x < min_x {
        body.pos.x = min_x;
        body.vel.x = body.vel.x.abs() * WALL_RESTITUTION;
        true
    } else if body.pos.x > max_x {
        body.pos.x = max_x;
        body.vel.x = -body.vel.x.abs() * WALL_RESTITUTION;
        true
    } else {
        false
    }
}

/// Whether an x coordinate lies strictly inside the goal mouth
#[inline]
pub fn in_goal_mouth(x: f32, arena: &ArenaGeometry) -> bool {
    x > arena.goal_left() && x < arena.goal_right()
}

/// Check the top/bottom walls: a crossing inside the goal mouth is a goal for
/// the side attacking that wall, anything else bounces like a side wall.
///
/// The top wall is defended by the opponent, the bottom wall by the player.
pub fn resolve_end_walls(body: &mut Body, arena: &ArenaGeometry) -> EndWallContact {
    let min_y = arena.min_y(body.radius);
    let max_y = arena.max_y(body.radius);

    if body.pos.y < min_y {
        if in_goal_mouth(body.pos.x, arena) {
            return EndWallContact::Goal {
                scorer: Side::Player,
            };
        }
        body.pos.y = min_y;
        body.vel.y = body.vel.y.abs() * WALL_RESTITUTION;
        EndWallContact::Bounce
    } else if body.pos.y > max_y {
        if in_goal_mouth(body.pos.x, arena) {
            return EndWallContact::Goal {
                scorer: Side::Opponent,
            };
        }
        body.pos.y = max_y;
        body.vel.y = -body.vel.y.abs() * WALL_RESTITUTION;
        EndWallContact::Bounce
    } else {
        EndWallContact::Clear
    }
}

/// Keep a body inside the playable rectangle without touching its velocity
pub fn confine(body: &mut Body, arena: &ArenaGeometry) {
    body.pos.x = body
        .pos
        .x
        .clamp(arena.min_x(body.radius), arena.max_x(body.radius));
    body.pos.y = body
        .pos
        .y
        .clamp(arena.min_y(body.radius), arena.max_y(body.radius));
}

/// Resolve puck/paddle overlap. Returns true on contact.
///
/// The puck is pushed out along the contact normal; an impulse is applied
/// only while the bodies are still approaching, after which the puck picks
/// up part of the paddle's own motion.
pub fn resolve_paddle(puck: &mut Body, paddle: &Body) -> bool {
    let offset = puck.pos - paddle.pos;
    let dist = offset.length();
    let reach = puck.radius + paddle.radius;

    if dist >= reach || dist <= 0.0 {
        return false;
    }

    let normal = offset / dist;
    puck.pos += normal * (reach - dist);

    let rel_normal_vel = (puck.vel - paddle.vel).dot(normal);
    if rel_normal_vel < 0.0 {
        puck.vel -= (1.0 + PADDLE_RESTITUTION) * rel_normal_vel * normal;
        puck.vel += paddle.vel * PADDLE_PUSH;
    }
    true
}

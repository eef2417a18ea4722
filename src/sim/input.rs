//! Pointer input to paddle position

use glam::Vec2;

use super::state::{ArenaGeometry, MatchState, Side};

/// Clamp a raw pointer position to the local player's half of the arena
/// (the bottom half) and to the playable bounds.
pub fn clamp_paddle_target(raw: Vec2, arena: &ArenaGeometry) -> Vec2 {
    let r = arena.paddle_radius;
    let min_y = (arena.height / 2.0 + r).min(arena.max_y(r));
    Vec2::new(
        raw.x.clamp(arena.min_x(r), arena.max_x(r)),
        raw.y.clamp(min_y, arena.max_y(r)),
    )
}

/// Move the local paddle toward a raw pointer position.
///
/// Returns the clamped position so it can be relayed to the other peer.
pub fn apply_local_target(state: &mut MatchState, raw: Vec2, arena: &ArenaGeometry) -> Vec2 {
    let target = clamp_paddle_target(raw, arena);
    state.paddle_mut(Side::Player).move_to(target);
    target
}

/// Idle/demo play: where the local paddle should head this refresh.
///
/// Guards the goal mouth while the puck is away or retreating, and steps in
/// behind it (goal side) to strike once it is in our half heading our way.
pub fn autopilot_target(state: &MatchState, arena: &ArenaGeometry) -> Vec2 {
    let puck = &state.puck.body;
    let home = arena.paddle_home(Side::Player);
    let in_our_half = puck.pos.y > arena.height / 2.0;
    let incoming = puck.vel.y >= 0.0;

    let raw = if in_our_half && (incoming || puck.vel.length_squared() < 1.0) {
        // Get below the puck so the hit sends it upfield
        puck.pos + Vec2::new(0.0, puck.radius)
    } else {
        let guard_y = home.y + (arena.max_y(arena.paddle_radius) - home.y) * 0.5;
        let x = puck.pos.x.clamp(arena.goal_left(), arena.goal_right());
        Vec2::new(x, guard_y)
    };
    clamp_paddle_target(raw, arena)
}

//! Variable timestep simulation tick
//!
//! Advances the puck by one display refresh on the host. `dt` is measured in
//! reference frames so the same tuning works at any refresh rate.

use super::collision::{
    EndWallContact, apply_friction, clamp_speed, confine, resolve_end_walls, resolve_paddle,
    resolve_side_walls,
};
use super::state::{ArenaGeometry, MatchState, Score, Side};
use crate::consts::*;

/// Side effects for audio/visual collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    WallBounce,
    PaddleHit,
    GoalScored(Side),
    MatchOver { winner: Side, score: Score },
}

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub events: Vec<SimEvent>,
    /// Set when the puck entered a goal mouth; the tick stopped there
    pub goal: Option<Side>,
}

/// Convert elapsed wall-clock milliseconds into a clamped `dt`
#[inline]
pub fn clamp_dt(elapsed_ms: f32) -> f32 {
    (elapsed_ms / REFERENCE_FRAME_MS).clamp(0.0, MAX_DT)
}

/// Advance the match state by `dt` reference frames
pub fn tick(state: &mut MatchState, arena: &ArenaGeometry, dt: f32) -> TickReport {
    let mut report = TickReport::default();
    let puck = &mut state.puck;

    puck.record_trail();

    let body = &mut puck.body;
    body.pos += body.vel * dt;
    body.vel = apply_friction(body.vel, dt);
    body.vel = clamp_speed(body.vel, MAX_PUCK_SPEED);

    if resolve_side_walls(body, arena) {
        report.events.push(SimEvent::WallBounce);
    }

    match resolve_end_walls(body, arena) {
        EndWallContact::Goal { scorer } => {
            report.goal = Some(scorer);
            return report;
        }
        EndWallContact::Bounce => report.events.push(SimEvent::WallBounce),
        EndWallContact::Clear => {}
    }

    // Both paddles may touch the puck in the same tick
    for side in [Side::Player, Side::Opponent] {
        let paddle = state.paddle(side).body;
        if resolve_paddle(&mut state.puck.body, &paddle) {
            report.events.push(SimEvent::PaddleHit);
        }
    }
    confine(&mut state.puck.body, arena);

    report
}

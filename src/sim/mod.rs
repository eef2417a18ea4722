//! Puck and paddle simulation
//!
//! All gameplay physics lives here. This module is pure:
//! - No I/O, no async, no clocks of its own (callers pass `Instant`s in)
//! - Only the host steps it; the guest feeds it mirrored snapshots

pub mod collision;
pub mod input;
pub mod matchplay;
pub mod mirror;
pub mod state;
pub mod tick;

pub use collision::{EndWallContact, apply_friction, clamp_speed, in_goal_mouth};
pub use input::{apply_local_target, autopilot_target, clamp_paddle_target};
pub use matchplay::{Match, MatchPhase, MatchRules};
pub use mirror::{mirror_position, mirror_score, mirror_velocity};
pub use state::{ArenaGeometry, Body, MatchState, Paddle, Puck, Score, Side};
pub use tick::{SimEvent, TickReport, clamp_dt, tick};

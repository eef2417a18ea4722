//! Hockey Link - two-player air hockey over a peer-to-peer link
//!
//! Core modules:
//! - `sim`: Puck/paddle physics, goal rules and the mirroring transform
//! - `net`: Peer session (room codes, transports) and the sync protocol
//! - `game`: Dispatcher loop tying ticks, commands and inbound messages together
//! - `view`: Rendering collaborator seam
//! - `settings`: Tunable timings, arena size and network options

pub mod game;
pub mod net;
pub mod settings;
pub mod sim;
pub mod view;

pub use game::{Command, Game, GameEvent};
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Frame duration that one unit of `dt` corresponds to (60 Hz display)
    pub const REFERENCE_FRAME_MS: f32 = 1000.0 / 60.0;
    /// Upper bound on `dt` so a suspended tab cannot produce a runaway step
    pub const MAX_DT: f32 = 2.0;

    /// Per-reference-frame velocity retention
    pub const FRICTION: f32 = 0.99;
    /// Puck speed cap, display units per reference frame
    pub const MAX_PUCK_SPEED: f32 = 20.0;
    /// Puck speed right after a reset serve
    pub const SERVE_SPEED: f32 = 5.0;
    /// Serve direction spread around the defending axis (±45°)
    pub const SERVE_SPREAD: f32 = std::f32::consts::FRAC_PI_4;

    /// Wall bounce restitution (lossy)
    pub const WALL_RESTITUTION: f32 = 0.9;
    /// Paddle bounce restitution (adds energy on hard hits)
    pub const PADDLE_RESTITUTION: f32 = 1.1;
    /// Share of the paddle's own velocity handed to the puck on contact
    pub const PADDLE_PUSH: f32 = 0.5;
    /// Paddle velocity estimate from pointer motion
    pub const PADDLE_VELOCITY_FACTOR: f32 = 0.3;

    /// Number of trail points kept behind the puck
    pub const TRAIL_LENGTH: usize = 15;

    /// Default winning score
    pub const WINNING_SCORE: u32 = 11;

    /// Observable timing contract (milliseconds)
    pub const HOST_CONNECT_TIMEOUT_MS: u64 = 60_000;
    pub const GUEST_CONNECT_TIMEOUT_MS: u64 = 10_000;
    pub const READY_DELAY_MS: u64 = 500;
    pub const BROADCAST_INTERVAL_MS: u64 = 33;
    pub const GOAL_RESET_DELAY_MS: u64 = 1500;
    /// Display refresh driving the loop
    pub const FRAME_INTERVAL_MS: u64 = 16;

    /// Default logical arena size
    pub const ARENA_WIDTH: f32 = 400.0;
    pub const ARENA_HEIGHT: f32 = 700.0;
}

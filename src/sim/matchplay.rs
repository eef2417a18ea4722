//! Goal rules and match lifecycle
//!
//! A `Match` is created on every `start` and thrown away on the next one.
//! On the host it drives `tick` and the goal state machine:
//!
//! `InPlay -> GoalPending -> MatchOver` or `-> ResetDelay -> InPlay`
//!
//! On the guest it only absorbs mirrored snapshots from the host.

use std::time::{Duration, Instant};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::state::{ArenaGeometry, MatchState, Score, Side};
use super::tick::{SimEvent, TickReport, clamp_dt, tick};
use crate::consts::*;

/// Current phase of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Puck is live
    InPlay,
    /// Puck entered a goal this tick; the score has not been settled yet
    GoalPending { scorer: Side },
    /// Waiting to re-serve toward the side that conceded
    ResetDelay { serve_toward: Side, resume_at: Instant },
    /// Someone reached the winning score
    MatchOver { winner: Side },
}

/// Rules that may be tuned through settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRules {
    pub winning_score: u32,
    pub goal_reset_delay: Duration,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            winning_score: WINNING_SCORE,
            goal_reset_delay: Duration::from_millis(GOAL_RESET_DELAY_MS),
        }
    }
}

/// One match between the two seats
#[derive(Debug, Clone)]
pub struct Match {
    pub state: MatchState,
    arena: ArenaGeometry,
    rules: MatchRules,
    phase: MatchPhase,
    rng: Pcg32,
    last_step: Instant,
}

impl Match {
    /// Start a fresh match in the starting layout
    pub fn new(arena: ArenaGeometry, rules: MatchRules, seed: u64, now: Instant) -> Self {
        Self {
            state: MatchState::new(&arena),
            arena,
            rules,
            phase: MatchPhase::InPlay,
            rng: Pcg32::seed_from_u64(seed),
            last_step: now,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn arena(&self) -> &ArenaGeometry {
        &self.arena
    }

    pub fn score(&self) -> Score {
        self.state.score
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, MatchPhase::MatchOver { .. })
    }

    /// Advance the authoritative simulation to `now` (host only)
    pub fn step(&mut self, now: Instant) -> TickReport {
        let elapsed_ms = now.saturating_duration_since(self.last_step).as_secs_f32() * 1000.0;
        self.last_step = now;

        match self.phase {
            MatchPhase::InPlay => {}
            MatchPhase::ResetDelay {
                serve_toward,
                resume_at,
            } => {
                if now >= resume_at {
                    self.serve(serve_toward);
                    self.phase = MatchPhase::InPlay;
                }
                return TickReport::default();
            }
            MatchPhase::GoalPending { .. } | MatchPhase::MatchOver { .. } => {
                return TickReport::default();
            }
        }

        let mut report = tick(&mut self.state, &self.arena, clamp_dt(elapsed_ms));
        if let Some(scorer) = report.goal {
            self.phase = MatchPhase::GoalPending { scorer };
            let events = self.settle_goal(scorer, now);
            report.events.extend(events);
        }
        report
    }

    /// Award a goal and decide between a re-serve and the end of the match
    fn settle_goal(&mut self, scorer: Side, now: Instant) -> Vec<SimEvent> {
        let mut events = Vec::with_capacity(2);
        self.state.score.award(scorer);
        events.push(SimEvent::GoalScored(scorer));

        if let Some(winner) = self.state.score.winner(self.rules.winning_score) {
            log::info!(
                "Match over: {:?} wins {}-{}",
                winner,
                self.state.score.player,
                self.state.score.opponent
            );
            self.phase = MatchPhase::MatchOver { winner };
            events.push(SimEvent::MatchOver {
                winner,
                score: self.state.score,
            });
        } else {
            self.phase = MatchPhase::ResetDelay {
                serve_toward: scorer.opposite(),
                resume_at: now + self.rules.goal_reset_delay,
            };
        }
        events
    }

    /// Recenter the puck and send it toward `side` at a random angle
    /// within ±45° of that side's axis
    pub fn serve(&mut self, side: Side) {
        let axis = match side {
            Side::Player => 1.0,
            Side::Opponent => -1.0,
        };
        let offset = self.rng.random_range(-SERVE_SPREAD..=SERVE_SPREAD);
        let dir = Vec2::new(offset.sin(), offset.cos() * axis);

        let puck = &mut self.state.puck;
        puck.body.pos = self.arena.center();
        puck.body.vel = dir * SERVE_SPEED;
        puck.clear_trail();
    }

    /// Overwrite puck and score with an already-mirrored host snapshot (guest only).
    ///
    /// Score changes are turned into the same events the host raised.
    pub fn apply_remote(&mut self, pos: Vec2, vel: Vec2, score: Score) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if self.is_over() {
            return events;
        }

        let puck = &mut self.state.puck;
        puck.record_trail();
        puck.body.pos = pos;
        puck.body.vel = vel;

        for side in [Side::Player, Side::Opponent] {
            if score.get(side) > self.state.score.get(side) {
                events.push(SimEvent::GoalScored(side));
            }
        }
        self.state.score = score;

        if let Some(winner) = score.winner(self.rules.winning_score) {
            self.phase = MatchPhase::MatchOver { winner };
            events.push(SimEvent::MatchOver { winner, score });
        }
        events
    }

    /// Place the remote player's paddle (position already mirrored)
    pub fn set_opponent_paddle(&mut self, pos: Vec2) {
        self.state.paddle_mut(Side::Opponent).move_to(pos);
    }

    /// Adopt a new geometry; bodies go back to the starting layout
    pub fn resize(&mut self, arena: ArenaGeometry) {
        self.arena = arena;
        self.state.relayout(&arena);
    }
}

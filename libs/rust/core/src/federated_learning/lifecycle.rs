//! Round finite state machine.
//!
//! Phases:
//! - Collecting
//! - Aggregating
//! - Broadcasting
//! - Complete
//!
//! `Aborted` is terminal and reachable from Collecting or Aggregating only.
//! Tracks how long each phase took.

use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase { Collecting, Aggregating, Broadcasting, Complete, Aborted }

impl RoundPhase {
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Complete | Self::Aborted) }
}

#[derive(Debug)]
pub struct RoundLifecycle {
    phase: RoundPhase,
    started_at: Instant,
    phase_started_at: Instant,
    phase_durations: Vec<(RoundPhase, Duration)>,
}

impl Default for RoundLifecycle { fn default() -> Self { Self::new() } }

impl RoundLifecycle {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { phase: RoundPhase::Collecting, started_at: now, phase_started_at: now, phase_durations: Vec::new() }
    }

    pub fn phase(&self) -> RoundPhase { self.phase }

    /// Moves to the next phase; terminal phases stay put.
    pub fn advance(&mut self) -> RoundPhase {
        let next = match self.phase {
            RoundPhase::Collecting => RoundPhase::Aggregating,
            RoundPhase::Aggregating => RoundPhase::Broadcasting,
            RoundPhase::Broadcasting => RoundPhase::Complete,
            terminal => terminal,
        };
        self.transition(next);
        self.phase
    }

    /// Returns false when the round is already past the point where it can be abandoned.
    pub fn abort(&mut self) -> bool {
        match self.phase {
            RoundPhase::Collecting | RoundPhase::Aggregating => { self.transition(RoundPhase::Aborted); true }
            _ => false,
        }
    }

    pub fn elapsed(&self) -> Duration { self.started_at.elapsed() }
    pub fn durations(&self) -> &[(RoundPhase, Duration)] { &self.phase_durations }

    fn transition(&mut self, next: RoundPhase) {
        if next == self.phase { return; }
        let now = Instant::now();
        self.phase_durations.push((self.phase, now - self.phase_started_at));
        self.phase = next;
        self.phase_started_at = now;
    }
}

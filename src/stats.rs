use std::fmt;

use crate::direction::Direction;
use crate::policy::{PhaseState, SignalMode};

/// Running counters for one controller session.
#[derive(Debug, Clone, Default)]
pub struct IntersectionStats {
    pub ticks: u64,
    pub observations: u64,
    pub stale_ticks: u64,
    pub phases_started: [u32; 4],
    /// Green seconds granted at the start of each rotation phase.
    pub green_seconds: [u64; 4],
    pub emergency_preemptions: u32,
    pub override_ticks: u64,
    pub longest_phase: u32,
}

impl IntersectionStats {
    /// Records the transition `prior -> next` for one tick.
    pub fn record_tick(&mut self, prior: &PhaseState, next: &PhaseState, stale: bool) {
        self.ticks += 1;
        if stale {
            self.stale_ticks += 1;
        }

        match next.mode() {
            SignalMode::Overridden => self.override_ticks += 1,
            SignalMode::Emergency if !prior.is_emergency => self.emergency_preemptions += 1,
            SignalMode::Rotating if is_fresh_phase(prior) => {
                let i = next.active_direction.index();
                self.phases_started[i] += 1;
                self.green_seconds[i] += u64::from(next.time_remaining);
                self.longest_phase = self.longest_phase.max(next.time_remaining);
            }
            _ => {}
        }
    }

    pub fn record_observation(&mut self) {
        self.observations += 1;
    }

    pub fn total_phases(&self) -> u32 {
        self.phases_started.iter().sum()
    }

    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IntersectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Signal Statistics")?;
        writeln!(f)?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Observations ingested: {}", self.observations)?;
        writeln!(f, "Stale ticks: {}", self.stale_ticks)?;
        writeln!(f, "Rotation phases: {}", self.total_phases())?;
        for direction in Direction::ALL {
            let i = direction.index();
            let avg = if self.phases_started[i] > 0 {
                self.green_seconds[i] as f64 / f64::from(self.phases_started[i])
            } else {
                0.0
            };
            writeln!(
                f,
                "  {}: {} phases, {} s green (avg {:.1} s)",
                direction, self.phases_started[i], self.green_seconds[i], avg
            )?;
        }
        writeln!(f, "Longest phase: {} s", self.longest_phase)?;
        writeln!(f, "Emergency preemptions: {}", self.emergency_preemptions)?;
        write!(f, "Override ticks: {}", self.override_ticks)
    }
}

/// A rotation phase just began: the prior phase ran out, or was an
/// override or emergency that has ended.
fn is_fresh_phase(prior: &PhaseState) -> bool {
    prior.time_remaining == 0 || prior.is_overridden || prior.is_emergency
}

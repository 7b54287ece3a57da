//! Four-way signal phase selection.
//!
//! [`SignalPolicy::select_phase`] is called once per tick with the latest
//! counts and returns the next [`PhaseState`]. Precedence is operator
//! override, then emergency preemption, then normal rotation.

use serde::Serialize;

use crate::config::SignalConfig;
use crate::counts::DirectionCount;
use crate::density::{density_percentage, green_time};
use crate::direction::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalMode {
    Rotating,
    Emergency,
    Overridden,
}

/// Emergency vehicle report for the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum EmergencyFlag {
    #[default]
    Clear,
    /// Raised, with the road the vehicle was seen on when known.
    Raised(Option<Direction>),
}

impl EmergencyFlag {
    pub fn is_raised(self) -> bool {
        matches!(self, EmergencyFlag::Raised(_))
    }
}

/// Which road is green and for how much longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseState {
    pub active_direction: Direction,
    /// Seconds left in this phase.
    pub time_remaining: u32,
    pub is_emergency: bool,
    pub is_overridden: bool,
}

impl PhaseState {
    /// Zero remaining time, so the first tick computes a real phase.
    pub fn new(initial_direction: Direction) -> Self {
        Self {
            active_direction: initial_direction,
            time_remaining: 0,
            is_emergency: false,
            is_overridden: false,
        }
    }

    pub fn mode(&self) -> SignalMode {
        if self.is_overridden {
            SignalMode::Overridden
        } else if self.is_emergency {
            SignalMode::Emergency
        } else {
            SignalMode::Rotating
        }
    }
}

pub struct SignalPolicy {
    config: SignalConfig,
}

impl SignalPolicy {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn initial_state(&self) -> PhaseState {
        PhaseState::new(self.config.initial_direction)
    }

    /// Density of `count` vehicles against the configured road capacity.
    pub fn density(&self, count: u32) -> f64 {
        density_percentage(count, self.config.max_capacity_per_road)
    }

    /// Green time granted to a road carrying `count` vehicles.
    pub fn green_time_for(&self, count: u32) -> u32 {
        green_time(
            self.density(count),
            self.config.min_green_time,
            self.config.max_green_time,
        )
    }

    /// Fresh rotation phase for the busiest road.
    pub fn next_phase(&self, counts: &DirectionCount) -> PhaseState {
        let (direction, count) = counts.busiest();
        PhaseState {
            active_direction: direction,
            time_remaining: self.green_time_for(count),
            is_emergency: false,
            is_overridden: false,
        }
    }

    pub fn select_phase(
        &self,
        counts: &DirectionCount,
        emergency: EmergencyFlag,
        override_direction: Option<Direction>,
        prior: &PhaseState,
    ) -> PhaseState {
        if let Some(direction) = override_direction {
            return PhaseState {
                active_direction: direction,
                time_remaining: self.config.override_hold,
                is_emergency: false,
                is_overridden: true,
            };
        }

        if let EmergencyFlag::Raised(seen_on) = emergency {
            if !prior.is_emergency {
                return PhaseState {
                    active_direction: seen_on.unwrap_or(self.config.emergency_direction),
                    time_remaining: self.config.emergency_duration,
                    is_emergency: true,
                    is_overridden: false,
                };
            }
        }

        // A cleared override drops straight back into rotation.
        if prior.is_overridden || prior.time_remaining == 0 {
            return self.next_phase(counts);
        }

        PhaseState {
            time_remaining: prior.time_remaining - 1,
            ..*prior
        }
    }
}

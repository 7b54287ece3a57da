use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::detection::Observation;
use crate::direction::Direction;
use crate::policy::{EmergencyFlag, PhaseState, SignalMode, SignalPolicy};
use crate::stats::IntersectionStats;

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub state: PhaseState,
    /// The snapshot used was older than the stale limit, or missing.
    pub stale: bool,
    /// The active road or mode differs from the previous tick.
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionStatus {
    pub state: PhaseState,
    pub override_direction: Option<Direction>,
    pub latest: Option<Observation>,
}

struct Snapshot {
    observation: Observation,
    received_at: Instant,
}

struct Inner {
    state: PhaseState,
    override_direction: Option<Direction>,
    latest: Option<Snapshot>,
    /// The last ingested observation had its emergency flag raised.
    emergency_latched: bool,
    /// Rising edge of the detector flag, held until the next tick even if
    /// later observations replace the snapshot.
    detected_emergency: Option<EmergencyFlag>,
    /// Operator-raised emergency waiting for the next tick.
    pending_emergency: Option<EmergencyFlag>,
    /// Inside a stale episode; suppresses repeat warnings.
    reported_stale: bool,
    stats: IntersectionStats,
}

/// Single owner of the signal state for one intersection.
///
/// All mutation goes through one mutex, so the tick loop and an operator
/// console can share it behind an `Arc`.
pub struct SmartIntersection {
    policy: SignalPolicy,
    stale_after: Duration,
    inner: Mutex<Inner>,
}

impl SmartIntersection {
    pub fn new(policy: SignalPolicy, stale_after: Duration) -> Self {
        let state = policy.initial_state();
        Self {
            policy,
            stale_after,
            inner: Mutex::new(Inner {
                state,
                override_direction: None,
                latest: None,
                emergency_latched: false,
                detected_emergency: None,
                pending_emergency: None,
                reported_stale: false,
                stats: IntersectionStats::default(),
            }),
        }
    }

    pub fn policy(&self) -> &SignalPolicy {
        &self.policy
    }

    /// Replaces the counts snapshot used by the following ticks.
    ///
    /// A newly raised emergency flag is remembered for the next tick, so
    /// several observations can be ingested between ticks without losing it.
    pub fn ingest(&self, observation: Observation) {
        self.ingest_at(observation, Instant::now());
    }

    pub fn ingest_at(&self, observation: Observation, now: Instant) {
        let mut inner = self.inner.lock();
        if inner.reported_stale {
            info!("detector feed recovered");
            inner.reported_stale = false;
        }
        debug!(
            total = observation.counts.total(),
            emergency = observation.emergency.is_raised(),
            "observation ingested"
        );
        let raised = observation.emergency.is_raised();
        if raised && !inner.emergency_latched && inner.detected_emergency.is_none() {
            inner.detected_emergency = Some(observation.emergency);
        }
        inner.emergency_latched = raised;
        inner.latest = Some(Snapshot {
            observation,
            received_at: now,
        });
        inner.stats.record_observation();
    }

    /// Holds `direction` green until [`SmartIntersection::reset`].
    pub fn force(&self, direction: Direction) {
        let mut inner = self.inner.lock();
        inner.override_direction = Some(direction);
        info!(%direction, "operator override set");
    }

    /// Clears the override and emergency latch; the next tick starts a
    /// fresh rotation phase.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.override_direction = None;
        inner.emergency_latched = false;
        inner.detected_emergency = None;
        inner.pending_emergency = None;
        inner.state = PhaseState {
            time_remaining: 0,
            is_emergency: false,
            is_overridden: false,
            ..inner.state
        };
        info!("operator reset");
    }

    /// Operator-triggered emergency, applied on the next tick.
    pub fn raise_emergency(&self, direction: Option<Direction>) {
        let mut inner = self.inner.lock();
        inner.pending_emergency = Some(EmergencyFlag::Raised(direction));
        warn!(?direction, "operator raised emergency");
    }

    pub fn tick(&self) -> TickReport {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&self, now: Instant) -> TickReport {
        let mut inner = self.inner.lock();

        let (observation, stale) = match &inner.latest {
            Some(snapshot) => (
                snapshot.observation,
                now.saturating_duration_since(snapshot.received_at) > self.stale_after,
            ),
            None => (Observation::default(), true),
        };

        if stale && !inner.reported_stale {
            warn!(
                stale_after_secs = self.stale_after.as_secs(),
                "no fresh detector output, reusing last counts"
            );
            inner.reported_stale = true;
        }

        let operator = inner.pending_emergency.take();
        let detected = inner.detected_emergency.take();
        let emergency = operator.or(detected).unwrap_or(EmergencyFlag::Clear);

        let prior = inner.state;
        if prior.is_emergency {
            if operator.is_some() {
                warn!(
                    direction = %prior.active_direction,
                    remaining = prior.time_remaining,
                    "emergency already running, operator request ignored"
                );
            } else if detected.is_some() {
                debug!(
                    direction = %prior.active_direction,
                    "emergency already running, detector flag ignored"
                );
            }
        }
        let next = self.policy.select_phase(
            &observation.counts,
            emergency,
            inner.override_direction,
            &prior,
        );
        inner.state = next;
        inner.stats.record_tick(&prior, &next, stale);

        let changed =
            next.active_direction != prior.active_direction || next.mode() != prior.mode();
        if changed {
            match next.mode() {
                SignalMode::Emergency => warn!(
                    direction = %next.active_direction,
                    seconds = next.time_remaining,
                    "emergency preemption"
                ),
                SignalMode::Overridden => {
                    info!(direction = %next.active_direction, "override active")
                }
                SignalMode::Rotating => info!(
                    direction = %next.active_direction,
                    seconds = next.time_remaining,
                    "phase change"
                ),
            }
        }

        TickReport {
            state: next,
            stale,
            changed,
        }
    }

    pub fn status(&self) -> IntersectionStatus {
        let inner = self.inner.lock();
        IntersectionStatus {
            state: inner.state,
            override_direction: inner.override_direction,
            latest: inner.latest.as_ref().map(|s| s.observation),
        }
    }

    pub fn stats(&self) -> IntersectionStats {
        self.inner.lock().stats.clone()
    }
}

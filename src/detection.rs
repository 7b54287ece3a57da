//! Per-road tallies built from detector output.
//!
//! The frame is split into four equal vertical strips, one per road, left
//! to right in canonical direction order. Each box is assigned to the strip
//! holding its horizontal center.

use serde::{Deserialize, Serialize};

use crate::counts::DirectionCount;
use crate::density::{DensityLevel, DensityThresholds};
use crate::direction::Direction;
use crate::policy::EmergencyFlag;

pub const NUM_ROADS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Ambulance,
}

/// One box reported by the external detector, `[x_min, y_min, x_max, y_max]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class: VehicleClass,
    pub bbox: [f32; 4],
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn center_x(&self) -> f32 {
        (self.bbox[0] + self.bbox[2]) / 2.0
    }
}

/// What one detector cycle says about the intersection.
///
/// `counts` drive the signal policy and hold cars only; `totals` include
/// ambulances and feed the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Observation {
    pub counts: DirectionCount,
    pub totals: DirectionCount,
    pub emergency: EmergencyFlag,
    pub ambulances: u32,
}

impl Observation {
    pub fn from_counts(counts: DirectionCount) -> Self {
        Self {
            counts,
            totals: counts,
            ..Self::default()
        }
    }

    pub fn with_emergency(mut self, emergency: EmergencyFlag, ambulances: u32) -> Self {
        self.emergency = emergency;
        self.ambulances = ambulances;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoadTally {
    pub cars: u32,
    pub ambulances: u32,
    pub total: u32,
    pub level: DensityLevel,
}

impl Default for RoadTally {
    fn default() -> Self {
        Self {
            cars: 0,
            ambulances: 0,
            total: 0,
            level: DensityLevel::Low,
        }
    }
}

pub struct RoadSplitter {
    frame_width: u32,
}

impl RoadSplitter {
    pub fn new(frame_width: u32) -> Self {
        Self { frame_width }
    }

    /// Road index for a box centered at `center_x`. Boxes past the right
    /// edge land on the last road.
    pub fn road_for(&self, center_x: f32) -> usize {
        let strip = (self.frame_width / NUM_ROADS as u32).max(1) as f32;
        let road = (center_x.max(0.0) / strip) as usize;
        road.min(NUM_ROADS - 1)
    }

    /// Column span `[x_min, x_max)` of a road. The last road absorbs the
    /// remainder of an uneven split.
    pub fn road_span(&self, road: usize) -> (u32, u32) {
        let strip = self.frame_width / NUM_ROADS as u32;
        let x_min = road as u32 * strip;
        let x_max = if road < NUM_ROADS - 1 {
            (road as u32 + 1) * strip
        } else {
            self.frame_width
        };
        (x_min, x_max)
    }

    pub fn tally(
        &self,
        detections: &[Detection],
        min_confidence: f32,
        thresholds: &DensityThresholds,
    ) -> [RoadTally; NUM_ROADS] {
        let mut roads = [RoadTally::default(); NUM_ROADS];
        for detection in detections {
            if detection.confidence < min_confidence {
                continue;
            }
            let road = &mut roads[self.road_for(detection.center_x())];
            match detection.class {
                VehicleClass::Car => road.cars += 1,
                VehicleClass::Ambulance => road.ambulances += 1,
            }
            road.total += 1;
        }
        for road in roads.iter_mut() {
            road.level = thresholds.classify(road.total);
        }
        roads
    }
}

/// Collapses road tallies into an observation. Only cars count toward
/// density; the first road carrying an ambulance raises the emergency.
pub fn observation_from_tallies(tallies: &[RoadTally; NUM_ROADS]) -> Observation {
    let mut counts = DirectionCount::default();
    let mut totals = DirectionCount::default();
    let mut emergency = EmergencyFlag::Clear;
    let mut ambulances = 0;
    for (direction, tally) in Direction::ALL.into_iter().zip(tallies) {
        counts.set(direction, tally.cars);
        totals.set(direction, tally.total);
        ambulances += tally.ambulances;
        if tally.ambulances > 0 && !emergency.is_raised() {
            emergency = EmergencyFlag::Raised(Some(direction));
        }
    }
    Observation {
        counts,
        totals,
        emergency,
        ambulances,
    }
}

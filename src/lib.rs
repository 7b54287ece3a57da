//! Density-driven signal control for a four-way intersection.
//!
//! An external detector reports how many vehicles wait on each road.
//! [`SmartIntersection`] turns those snapshots into a phase schedule:
//! the busiest road gets green for a time proportional to its density,
//! emergency vehicles preempt the rotation, and an operator can force any
//! road green until reset.

pub mod config;
pub mod counts;
pub mod density;
pub mod detection;
pub mod direction;
pub mod error;
pub mod feed;
pub mod intersection;
pub mod policy;
pub mod stats;
pub mod telemetry;

pub use counts::DirectionCount;
pub use density::{density_percentage, green_time};
pub use detection::Observation;
pub use direction::Direction;
pub use error::{SignalError, SignalResult};
pub use intersection::{SmartIntersection, TickReport};
pub use policy::{EmergencyFlag, PhaseState, SignalMode, SignalPolicy};

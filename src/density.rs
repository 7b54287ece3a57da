//! Road occupancy and green-time conversion.
//!
//! Density is the share of a road's configured capacity that is occupied,
//! capped at 100%. Green time scales linearly between the configured
//! minimum and maximum with density.

use serde::{Deserialize, Serialize};

/// Occupancy of a road as a percentage of `capacity`, in `[0, 100]`.
///
/// A zero capacity is treated as already saturated.
pub fn density_percentage(count: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return if count > 0 { 100.0 } else { 0.0 };
    }
    (100.0 * f64::from(count) / f64::from(capacity)).min(100.0)
}

/// Green duration in seconds for a road at `density` percent, truncated.
pub fn green_time(density: f64, min_time: u32, max_time: u32) -> u32 {
    let density = if density.is_nan() {
        0.0
    } else {
        density.clamp(0.0, 100.0)
    };
    let span = f64::from(max_time.saturating_sub(min_time));
    let added = (density / 100.0) * span;
    min_time + added as u32
}

/// Coarse density bucket for a road's vehicle total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DensityLevel {
    Low,
    Medium,
    High,
}

impl DensityLevel {
    /// Numeric form forwarded to telemetry.
    pub fn code(self) -> u8 {
        match self {
            DensityLevel::Low => 1,
            DensityLevel::Medium => 2,
            DensityLevel::High => 3,
        }
    }
}

/// Vehicle totals separating LOW / MEDIUM / HIGH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityThresholds {
    /// Totals below this are LOW.
    pub low_below: u32,
    /// Totals below this (and not LOW) are MEDIUM; the rest HIGH.
    pub medium_below: u32,
}

impl Default for DensityThresholds {
    fn default() -> Self {
        Self {
            low_below: 3,
            medium_below: 8,
        }
    }
}

impl DensityThresholds {
    pub fn classify(&self, total: u32) -> DensityLevel {
        if total < self.low_below {
            DensityLevel::Low
        } else if total < self.medium_below {
            DensityLevel::Medium
        } else {
            DensityLevel::High
        }
    }

    /// Worst level across all roads; LOW when there are none.
    pub fn overall<I>(&self, totals: I) -> DensityLevel
    where
        I: IntoIterator<Item = u32>,
    {
        totals
            .into_iter()
            .map(|t| self.classify(t))
            .max()
            .unwrap_or(DensityLevel::Low)
    }
}

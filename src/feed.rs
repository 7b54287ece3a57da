//! Observation sources for the control loop.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::counts::DirectionCount;
use crate::density::DensityThresholds;
use crate::detection::{Detection, Observation, RoadSplitter, observation_from_tallies};
use crate::direction::Direction;
use crate::error::{SignalError, SignalResult};
use crate::policy::EmergencyFlag;

/// Anything that produces detector snapshots.
pub trait CountSource: Send {
    fn name(&self) -> &str;

    /// Every observation that arrived since the last poll, oldest first.
    /// Empty when nothing new arrived.
    fn poll(&mut self) -> SignalResult<Vec<Observation>>;
}

/// Synthetic load: each road follows a slow sine wave around half
/// capacity, with a little noise and a rare emergency.
pub struct SimulatedSource {
    capacity: u32,
    started: Instant,
    rng: StdRng,
    emergency_probability: f64,
}

/// Phase offsets per road, in canonical direction order.
const ROAD_PHASES: [f64; 4] = [0.0, 2.0, 4.0, 5.0];

impl SimulatedSource {
    pub fn new(capacity: u32) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    pub fn seeded(capacity: u32, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: u32, rng: StdRng) -> Self {
        Self {
            capacity,
            started: Instant::now(),
            rng,
            emergency_probability: 0.02,
        }
    }

    /// Snapshot at `t` seconds into the simulation.
    pub fn sample_at(&mut self, t: f64) -> Observation {
        let half = f64::from(self.capacity) / 2.0;
        let swing = 0.8 * half;
        let mut counts = DirectionCount::default();
        for (direction, phase) in Direction::ALL.into_iter().zip(ROAD_PHASES) {
            let base = half + swing * (t / 5.0 + phase).sin();
            let noise: f64 = self.rng.random_range(-1.0..=1.0);
            counts.set(direction, (base + noise).round().max(0.0) as u32);
        }

        let observation = Observation::from_counts(counts);
        if !self.rng.random_bool(self.emergency_probability) {
            return observation;
        }

        let road = Direction::ALL[self.rng.random_range(0..Direction::ALL.len())];
        let mut observation = observation.with_emergency(EmergencyFlag::Raised(Some(road)), 1);
        observation
            .totals
            .set(road, observation.totals.get(road).saturating_add(1));
        observation
    }
}

impl CountSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn poll(&mut self) -> SignalResult<Vec<Observation>> {
        let t = self.started.elapsed().as_secs_f64();
        Ok(vec![self.sample_at(t)])
    }
}

/// Emergency field of a counts report: a direction label, or a bare flag.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReportedEmergency {
    Flag(bool),
    Label(String),
}

impl ReportedEmergency {
    /// An unknown label still raises the emergency, without a direction.
    fn to_flag(&self, path: &Path) -> EmergencyFlag {
        match self {
            ReportedEmergency::Flag(false) => EmergencyFlag::Clear,
            ReportedEmergency::Flag(true) => EmergencyFlag::Raised(None),
            ReportedEmergency::Label(label) => match label.parse::<Direction>() {
                Ok(direction) => EmergencyFlag::Raised(Some(direction)),
                Err(e) => {
                    warn!(file = %path.display(), "{e}; emergency kept without a direction");
                    EmergencyFlag::Raised(None)
                }
            },
        }
    }
}

/// One detector report file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DetectorReport {
    Boxes {
        frame_width: u32,
        detections: Vec<Detection>,
    },
    Counts {
        counts: HashMap<String, i64>,
        #[serde(default)]
        emergency: Option<ReportedEmergency>,
        #[serde(default)]
        ambulances: u32,
    },
}

/// Polls a folder for detector reports (`*.json`), each processed once in
/// file-name order.
pub struct DirectorySource {
    dir: PathBuf,
    processed: HashSet<PathBuf>,
    min_confidence: f32,
    thresholds: DensityThresholds,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, min_confidence: f32, thresholds: DensityThresholds) -> Self {
        let dir = dir.into();
        info!("monitoring folder {}", dir.display());
        Self {
            dir,
            processed: HashSet::new(),
            min_confidence,
            thresholds,
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    fn pending_files(&self) -> SignalResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| SignalError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                    && !self.processed.contains(path)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_report(&self, path: &Path) -> SignalResult<Observation> {
        let contents = fs::read_to_string(path).map_err(|source| SignalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let report: DetectorReport =
            serde_json::from_str(&contents).map_err(|e| SignalError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let observation = match report {
            DetectorReport::Boxes {
                frame_width,
                detections,
            } => {
                let splitter = RoadSplitter::new(frame_width);
                let tallies = splitter.tally(&detections, self.min_confidence, &self.thresholds);
                for (direction, tally) in Direction::ALL.into_iter().zip(&tallies) {
                    let (x_min, x_max) = splitter.road_span(direction.index());
                    debug!(
                        road = %direction,
                        x_min,
                        x_max,
                        cars = tally.cars,
                        ambulances = tally.ambulances,
                        level = ?tally.level,
                        "road tally"
                    );
                }
                observation_from_tallies(&tallies)
            }
            DetectorReport::Counts {
                counts,
                emergency,
                ambulances,
            } => {
                let (counts, problems) = DirectionCount::from_raw_lenient(&counts);
                for problem in problems {
                    warn!(file = %path.display(), "{problem}; using zero");
                }
                let emergency = emergency
                    .as_ref()
                    .map_or(EmergencyFlag::Clear, |e| e.to_flag(path));
                Observation::from_counts(counts).with_emergency(emergency, ambulances)
            }
        };
        Ok(observation)
    }
}

impl CountSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    /// Returns one observation per new report, in file-name order.
    fn poll(&mut self) -> SignalResult<Vec<Observation>> {
        let mut observations = Vec::new();
        for path in self.pending_files()? {
            match self.read_report(&path) {
                Ok(observation) => {
                    info!(
                        file = %path.display(),
                        total = observation.counts.total(),
                        emergency = observation.emergency.is_raised(),
                        "processed detector report"
                    );
                    observations.push(observation);
                }
                Err(e) => error!("skipping report: {e}"),
            }
            self.processed.insert(path);
        }
        Ok(observations)
    }
}

//! Forwarding of intersection state to a dashboard.
//!
//! ThingSpeak channels take up to eight numeric fields per update:
//!
//! | field | value                                   |
//! |-------|-----------------------------------------|
//! | 1-4   | vehicles incl. ambulances, North / East / South / West |
//! | 5     | total cars                              |
//! | 6     | ambulances seen                         |
//! | 7     | overall density (1 low, 2 medium, 3 high) |
//! | 8     | priority alert (1 when an emergency is raised) |

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ThingSpeakConfig;
use crate::counts::DirectionCount;
use crate::density::DensityThresholds;
use crate::detection::Observation;
use crate::direction::Direction;
use crate::error::{SignalError, SignalResult};
use crate::policy::PhaseState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub road_totals: DirectionCount,
    pub total_cars: u32,
    pub ambulances: u32,
    pub density_code: u8,
    pub priority_alert: bool,
    pub phase: PhaseState,
}

impl TelemetryRecord {
    pub fn new(observation: &Observation, phase: PhaseState, thresholds: &DensityThresholds) -> Self {
        let road_totals = observation.totals;
        let level = thresholds.overall(road_totals.iter().map(|(_, total)| total));
        Self {
            road_totals,
            total_cars: observation.counts.total(),
            ambulances: observation.ambulances,
            density_code: level.code(),
            priority_alert: observation.emergency.is_raised() || observation.ambulances > 0,
            phase,
        }
    }

    /// ThingSpeak `field1`..`field8` pairs.
    pub fn thingspeak_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields: Vec<(&'static str, String)> = ["field1", "field2", "field3", "field4"]
            .into_iter()
            .zip(self.road_totals.iter())
            .map(|(name, (_, count))| (name, count.to_string()))
            .collect();
        fields.push(("field5", self.total_cars.to_string()));
        fields.push(("field6", self.ambulances.to_string()));
        fields.push(("field7", self.density_code.to_string()));
        fields.push(("field8", u8::from(self.priority_alert).to_string()));
        fields
    }
}

pub trait TelemetrySink: Send {
    fn publish(&mut self, record: &TelemetryRecord) -> SignalResult<()>;
}

/// Writes each record to the log.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&mut self, record: &TelemetryRecord) -> SignalResult<()> {
        info!(
            n = record.road_totals.get(Direction::North),
            e = record.road_totals.get(Direction::East),
            s = record.road_totals.get(Direction::South),
            w = record.road_totals.get(Direction::West),
            ambulances = record.ambulances,
            density = record.density_code,
            alert = record.priority_alert,
            active = %record.phase.active_direction,
            remaining = record.phase.time_remaining,
            "telemetry"
        );
        Ok(())
    }
}

pub struct ThingSpeakClient {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl ThingSpeakClient {
    pub fn new(config: &ThingSpeakConfig) -> SignalResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SignalError::Telemetry(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }

    fn post(&self, fields: &[(&str, String)]) -> SignalResult<()> {
        let mut params: Vec<(&str, &str)> = vec![("api_key", self.api_key.as_str())];
        params.extend(fields.iter().map(|(k, v)| (*k, v.as_str())));

        let response = self
            .http
            .post(&self.base_url)
            .query(&params)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SignalError::Telemetry("request timeout".to_string())
                } else {
                    SignalError::Telemetry(e.to_string())
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SignalError::Telemetry(format!(
                "update rejected with status {status}"
            )));
        }
        Ok(())
    }

    /// Sends a single zero reading to check the key and endpoint.
    pub fn verify_connection(&self) -> SignalResult<()> {
        self.post(&[("field1", "0".to_string())])?;
        info!("thingspeak connection verified");
        Ok(())
    }
}

impl TelemetrySink for ThingSpeakClient {
    fn publish(&mut self, record: &TelemetryRecord) -> SignalResult<()> {
        self.post(&record.thingspeak_fields())?;
        debug!(
            total = record.road_totals.total(),
            "thingspeak update sent"
        );
        Ok(())
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::direction::Direction;

/// Errors raised by the signal controller and its collaborators.
#[derive(Error, Debug)]
pub enum SignalError {
    /// A detector reported a negative vehicle count for a road.
    #[error("negative vehicle count {value} for {direction}")]
    NegativeCount { direction: Direction, value: i64 },

    /// A detector snapshot did not include one of the four roads.
    #[error("no vehicle count reported for {0}")]
    MissingDirection(Direction),

    #[error("unknown direction label '{0}'")]
    UnknownDirection(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Forwarding to the telemetry sink failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

pub type SignalResult<T> = Result<T, SignalError>;

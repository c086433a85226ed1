//! Error types for the simulation core.
//!
//! Configuration, raster and schema problems are fatal and surface before the
//! simulation loop starts; scheduling and per-event problems are logged and
//! recovered from.

use thiserror::Error;

/// Main error type for simulation operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Missing/inconsistent configuration sections or values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raster header mismatch, NODATA mismatch or pixel count mismatch
    #[error("Raster error: {0}")]
    Raster(String),

    /// Event time outside [current_time, end_time]
    #[error("Cannot schedule {event} at {time}: current time {current_time}, end time {end_time}")]
    ScheduleOutOfRange {
        event: String,
        time: i32,
        current_time: i32,
        end_time: i32,
    },

    /// Invalid amino-acid sequence length or character
    #[error("Genotype error: {0}")]
    Genotype(String),

    /// Negative rate, probability outside [0,1], and similar
    #[error("Domain error: {0}")]
    Domain(String),

    /// File system errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    #[must_use]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    #[must_use]
    pub fn raster<S: Into<String>>(msg: S) -> Self {
        Self::Raster(msg.into())
    }

    #[must_use]
    pub fn genotype<S: Into<String>>(msg: S) -> Self {
        Self::Genotype(msg.into())
    }

    #[must_use]
    pub fn domain<S: Into<String>>(msg: S) -> Self {
        Self::Domain(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::config("missing section");
        assert_eq!(err.to_string(), "Configuration error: missing section");
    }

    #[test]
    fn test_schedule_error_display() {
        let err = SimError::ScheduleOutOfRange {
            event: "birthday".to_string(),
            time: -1,
            current_time: 0,
            end_time: 100,
        };
        assert!(err.to_string().contains("birthday"));
        assert!(err.to_string().contains("-1"));
    }
}

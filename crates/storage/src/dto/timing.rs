use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::{Uuid, Version};
use validator::{Validate, ValidationError};

use crate::models::{ClockTime, TimingPoint};

/// Timing event reported by a timing point.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TimingRequest {
    #[validate(custom(function = "validate_chip_id"))]
    #[schema(example = "d42ebbc6-5b2b-4ff9-83a6-7df87cc20c17")]
    pub chip_id: String,

    pub timing_point_id: TimingPoint,

    #[validate(custom(function = "validate_clock_time"))]
    #[schema(example = "00:01:10.123")]
    pub clock_time: String,
}

/// A validated [`TimingRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingUpdate {
    pub chip_id: Uuid,
    pub timing_point: TimingPoint,
    pub clock_time: ClockTime,
}

impl TimingRequest {
    pub fn into_update(self) -> Result<TimingUpdate, String> {
        let chip_id = Uuid::parse_str(&self.chip_id).map_err(|e| format!("chip_id: {e}"))?;
        let clock_time = ClockTime::parse(&self.clock_time).map_err(|e| e.to_string())?;

        Ok(TimingUpdate {
            chip_id,
            timing_point: self.timing_point_id,
            clock_time,
        })
    }
}

fn validate_chip_id(chip_id: &str) -> Result<(), ValidationError> {
    match Uuid::parse_str(chip_id) {
        Ok(uuid) if uuid.get_version() == Some(Version::Random) => Ok(()),
        _ => Err(validation_error(
            "invalid_chip_id",
            "chip_id must be a version 4 UUID",
        )),
    }
}

fn validate_clock_time(clock_time: &str) -> Result<(), ValidationError> {
    ClockTime::parse(clock_time).map(|_| ()).map_err(|_| {
        validation_error(
            "invalid_clock_time",
            "clock_time must look like HH:MM:SS[.fff]",
        )
    })
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

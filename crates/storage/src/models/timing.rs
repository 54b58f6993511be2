use std::fmt;
use std::str::FromStr;

use chrono::format::ParseErrorKind;
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::ClockTimeError;

/// Place along the course where a chip reader reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimingPoint {
    FinishCorridor,
    FinishLine,
}

impl TimingPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingPoint::FinishCorridor => "finish_corridor",
            TimingPoint::FinishLine => "finish_line",
        }
    }
}

impl fmt::Display for TimingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const CLOCK_TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Time of day with millisecond resolution, as reported by timing points.
///
/// Parsed as `HH:MM:SS` with up to three fractional digits; single digit
/// fields are accepted. Displayed as `HH:MM:SS` followed by the fraction with
/// trailing zeros trimmed, so `00:01:10.120` becomes `00:01:10.12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn from_hms_milli(hour: u32, min: u32, sec: u32, milli: u32) -> Option<Self> {
        // chrono encodes leap seconds as milli >= 1000
        if sec > 59 || milli > 999 {
            return None;
        }
        NaiveTime::from_hms_milli_opt(hour, min, sec, milli).map(Self)
    }

    pub fn parse(value: &str) -> Result<Self, ClockTimeError> {
        if value
            .split_once('.')
            .is_some_and(|(_, fraction)| fraction.len() > 3)
        {
            return Err(ClockTimeError::Format(value.to_string()));
        }

        let time = NaiveTime::parse_from_str(value, CLOCK_TIME_FORMAT).map_err(|e| {
            match e.kind() {
                ParseErrorKind::OutOfRange => ClockTimeError::OutOfRange(value.to_string()),
                _ => ClockTimeError::Format(value.to_string()),
            }
        })?;

        // chrono accepts a leap second as second 60
        if time.nanosecond() >= 1_000_000_000 {
            return Err(ClockTimeError::OutOfRange(value.to_string()));
        }

        Ok(Self(time))
    }

    fn millis(&self) -> u32 {
        self.0.nanosecond() / 1_000_000
    }
}

impl FromStr for ClockTime {
    type Err = ClockTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )?;

        let millis = self.millis();
        if millis > 0 {
            let fraction = format!("{millis:03}");
            write!(f, ".{}", fraction.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Times recorded for one competitor. Unset times go over the wire as `""`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Timings {
    #[serde(with = "optional_clock_time")]
    #[schema(value_type = String, example = "00:01:10.123")]
    pub finish_corridor: Option<ClockTime>,

    #[serde(with = "optional_clock_time")]
    #[schema(value_type = String, example = "")]
    pub finish_line: Option<ClockTime>,
}

impl Timings {
    pub fn get(&self, point: TimingPoint) -> Option<ClockTime> {
        match point {
            TimingPoint::FinishCorridor => self.finish_corridor,
            TimingPoint::FinishLine => self.finish_line,
        }
    }

    pub fn set(&mut self, point: TimingPoint, clock_time: ClockTime) {
        match point {
            TimingPoint::FinishCorridor => self.finish_corridor = Some(clock_time),
            TimingPoint::FinishLine => self.finish_line = Some(clock_time),
        }
    }
}

mod optional_clock_time {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ClockTime;

    pub fn serialize<S: Serializer>(
        value: &Option<ClockTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(clock_time) => serializer.collect_str(clock_time),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ClockTime>, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value.is_empty() {
            return Ok(None);
        }
        ClockTime::parse(&value)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

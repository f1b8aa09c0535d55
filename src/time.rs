use std::{fmt, str::FromStr};

use chrono::{NaiveTime, Timelike};

use crate::error::AlarmError;

pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// a wall clock time of day (24 hour) that an alarm should go off at.
/// only ever holds in range values, so comparing it against the clock can't fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TargetTime {
    hour: u8,
    minute: u8,
    second: u8,
}

impl TargetTime {
    /// # Errors
    /// if any field is out of range for a 24 hour clock
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self, AlarmError> {
        check_range("hour", hour, 23)?;
        check_range("minute", minute, 59)?;
        check_range("second", second, 59)?;
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        })
    }

    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    #[must_use]
    pub const fn second(self) -> u8 {
        self.second
    }

    #[must_use]
    pub fn seconds_from_midnight(self) -> u32 {
        u32::from(self.hour) * 3600 + u32::from(self.minute) * 60 + u32::from(self.second)
    }

    /// wraps around midnight
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_seconds_from_midnight(seconds: u32) -> Self {
        let seconds = seconds % SECONDS_PER_DAY;
        Self {
            hour: (seconds / 3600) as u8,
            minute: (seconds / 60 % 60) as u8,
            second: (seconds % 60) as u8,
        }
    }

    /// shift by `offset` using time of day arithmetic, so 23:58:30 + 5m is 00:03:30
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn offset_by(self, offset: chrono::Duration) -> Self {
        // rem_euclid keeps it in 0..SECONDS_PER_DAY
        let shifted = (i64::from(self.seconds_from_midnight()) + offset.num_seconds())
            .rem_euclid(i64::from(SECONDS_PER_DAY));
        Self::from_seconds_from_midnight(shifted as u32)
    }

    /// exact match at one second resolution
    #[must_use]
    pub fn matches(self, now: NaiveTime) -> bool {
        Self::from(now) == self
    }
}

fn check_range(field: &'static str, value: u32, max: u32) -> Result<(), AlarmError> {
    if value > max {
        return Err(AlarmError::InvalidInput { field, value, max });
    }
    Ok(())
}

impl From<NaiveTime> for TargetTime {
    fn from(time: NaiveTime) -> Self {
        // drops the sub second part
        Self::from_seconds_from_midnight(time.num_seconds_from_midnight())
    }
}

impl From<TargetTime> for NaiveTime {
    fn from(target: TargetTime) -> Self {
        Self::from_num_seconds_from_midnight_opt(target.seconds_from_midnight(), 0)
            .unwrap_or_default()
    }
}

impl fmt::Display for TargetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl FromStr for TargetTime {
    type Err = AlarmError;

    /// accepts `HH:MM:SS` or `HH:MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || AlarmError::Parse(s.to_string());
        let fields = s
            .trim()
            .split(':')
            .map(|field| field.parse::<u32>().map_err(|_| parse_error()))
            .collect::<Result<Vec<_>, _>>()?;
        match fields[..] {
            [hour, minute] => Self::new(hour, minute, 0),
            [hour, minute, second] => Self::new(hour, minute, second),
            _ => Err(parse_error()),
        }
    }
}

/// where "now" comes from, so the scheduler can be driven by a fake clock
pub trait TimeSource: Send + Sync {
    fn now(&self) -> NaiveTime;
}

/// the local system wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> NaiveTime {
        chrono::Local::now().naive_local().time()
    }
}

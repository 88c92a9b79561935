use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Deserializer};

use super::format::format_hm_12h;
use crate::error::Error;

/// A wall-clock time of day at the venue, stored as minutes past midnight.
///
/// The feed sends these as `HH:MM` or `HH:MM:SS`. Seconds are dropped and
/// `24:00` is read as midnight.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTime {
    minutes: u16,
}

fn time_regex() -> &'static Regex {
    static TIME_REGEX: OnceLock<Regex> = OnceLock::new();
    TIME_REGEX.get_or_init(|| Regex::new(r"^\s*(\d{1,2}):(\d{2})(?::(\d{2}))?\s*$").unwrap())
}

impl LocalTime {
    pub const MIDNIGHT: LocalTime = LocalTime { minutes: 0 };

    /// For literals only. Panics on an out-of-range hour or minute.
    pub const fn from_hm(hour: u16, minute: u16) -> Self {
        assert!(hour < 24 && minute < 60, "time out of range");
        Self {
            minutes: hour * 60 + minute,
        }
    }

    pub fn new(hour: u32, minute: u32) -> Result<Self, Error> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidTime(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(Self {
            minutes: (hour * 60 + minute) as u16,
        })
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            minutes: (time.hour() * 60 + time.minute()) as u16,
        }
    }

    pub fn hour(&self) -> u32 {
        self.minutes as u32 / 60
    }

    pub fn minute(&self) -> u32 {
        self.minutes as u32 % 60
    }

    pub fn minutes_from_midnight(&self) -> u32 {
        self.minutes as u32
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// "4pm", "1:30pm"
    pub fn to_12_hour(&self) -> String {
        format_hm_12h(self.hour(), self.minute())
    }
}

impl FromStr for LocalTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = time_regex()
            .captures(s)
            .ok_or_else(|| Error::InvalidTime(s.to_string()))?;
        // The regex guarantees digits in both groups
        let hour: u32 = captures[1]
            .parse()
            .map_err(|_| Error::InvalidTime(s.to_string()))?;
        let minute: u32 = captures[2]
            .parse()
            .map_err(|_| Error::InvalidTime(s.to_string()))?;
        if hour == 24 && minute == 0 {
            return Ok(Self::MIDNIGHT);
        }
        Self::new(hour, minute).map_err(|_| Error::InvalidTime(s.to_string()))
    }
}

impl Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl<'de> Deserialize<'de> for LocalTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

//! Calendar instants and user-entered countdown targets
//!
//! An `Instant` is a zoned point in time that may be invalid. Invalid instants
//! never compare equal, less or greater than anything, so a countdown against
//! one simply never reaches its end.

use jiff::civil::{Date, DateTime, Time};
use jiff::tz::TimeZone;
use jiff::{Timestamp, ToSpan, Zoned};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Calendar arithmetic error types
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Instant is not a valid point in time")]
    Invalid,
    #[error("Year {0} is outside the supported calendar range")]
    YearOutOfRange(i64),
    #[error("Calendar arithmetic out of range: {0}")]
    OutOfRange(#[from] jiff::Error),
}

/// A point in time with calendar components, or the invalid instant
#[derive(Debug, Clone, Default)]
pub struct Instant {
    zoned: Option<Zoned>,
}

impl Instant {
    /// Sample the host clock in the host time zone
    pub fn now() -> Self {
        Zoned::now().into()
    }

    /// The instant produced by text that could not be parsed
    pub fn invalid() -> Self {
        Self { zoned: None }
    }

    /// Parse user-entered text, interpreting local date-times in `tz`
    ///
    /// Accepts RFC 9557 zoned strings, RFC 3339 timestamps, local date-times
    /// (`2026-04-27T06:00`) and bare dates, which are midnight UTC. Anything
    /// else is the invalid instant.
    pub fn parse(text: &str, tz: &TimeZone) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::invalid();
        }

        if let Ok(zoned) = text.parse::<Zoned>() {
            return zoned.into();
        }

        if let Ok(timestamp) = text.parse::<Timestamp>() {
            return timestamp.to_zoned(tz.clone()).into();
        }

        // ISO date-only forms name UTC midnight, date-times are local
        let placed = if text.contains(['T', 't', ' ']) {
            text.parse::<DateTime>()
                .and_then(|dt| dt.to_zoned(tz.clone()))
        } else {
            text.parse::<Date>()
                .and_then(|date| date.to_zoned(TimeZone::UTC))
        };

        match placed {
            Ok(zoned) => zoned.into(),
            Err(e) => {
                log::debug!("Could not parse {:?} as a date: {}", text, e);
                Self::invalid()
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.zoned.is_some()
    }

    /// Borrow the underlying zoned datetime, failing for the invalid instant
    pub fn as_zoned(&self) -> Result<&Zoned, CalendarError> {
        self.zoned.as_ref().ok_or(CalendarError::Invalid)
    }

    /// Milliseconds since the Unix epoch
    pub fn epoch_ms(&self) -> Option<i64> {
        self.zoned
            .as_ref()
            .map(|zoned| zoned.timestamp().as_millisecond())
    }

    pub fn year(&self) -> Option<i16> {
        self.zoned.as_ref().map(Zoned::year)
    }

    /// Month of the year, 1 through 12
    pub fn month(&self) -> Option<i8> {
        self.zoned.as_ref().map(Zoned::month)
    }

    pub fn day(&self) -> Option<i8> {
        self.zoned.as_ref().map(Zoned::day)
    }

    pub fn hour(&self) -> Option<i8> {
        self.zoned.as_ref().map(Zoned::hour)
    }

    pub fn minute(&self) -> Option<i8> {
        self.zoned.as_ref().map(Zoned::minute)
    }

    pub fn second(&self) -> Option<i8> {
        self.zoned.as_ref().map(Zoned::second)
    }

    /// Advance by `months` calendar months, keeping the time of day
    ///
    /// Sub-second precision is dropped. A day of month that does not exist in
    /// the destination month rolls forward into the next one, so Jan 31 plus
    /// one month is Mar 3 in a common year rather than Feb 28.
    pub fn add_months(&self, months: i64) -> Result<Self, CalendarError> {
        let zoned = self.as_zoned()?;

        let index = i64::from(zoned.year()) * 12 + i64::from(zoned.month() - 1) + months;
        let year = index.div_euclid(12);
        let year = i16::try_from(year).map_err(|_| CalendarError::YearOutOfRange(year))?;
        let month = (index.rem_euclid(12) + 1) as i8;

        let date = Date::new(year, month, 1)?.checked_add(i64::from(zoned.day() - 1).days())?;
        let time = Time::new(zoned.hour(), zoned.minute(), zoned.second(), 0)?;
        let shifted = date.to_datetime(time).to_zoned(zoned.time_zone().clone())?;

        Ok(shifted.into())
    }
}

impl From<Zoned> for Instant {
    fn from(zoned: Zoned) -> Self {
        Self { zoned: Some(zoned) }
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let this = self.zoned.as_ref()?.timestamp();
        let that = other.zoned.as_ref()?.timestamp();
        Some(this.cmp(&that))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.zoned {
            Some(zoned) => write!(f, "{}", zoned.strftime("%Y-%m-%d %H:%M:%S %Z")),
            None => f.write_str("Invalid Date"),
        }
    }
}

/// The countdown endpoint as the user entered it
#[derive(Debug, Clone)]
pub struct TargetSpec {
    text: String,
    instant: Instant,
}

impl TargetSpec {
    pub fn parse(text: impl Into<String>, tz: &TimeZone) -> Self {
        let text = text.into();
        let instant = Instant::parse(&text, tz);
        Self { text, instant }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn instant(&self) -> &Instant {
        &self.instant
    }

    pub fn is_valid(&self) -> bool {
        self.instant.is_valid()
    }
}

#[cfg(test)]
pub(crate) fn utc(year: i16, month: i8, day: i8, hour: i8, minute: i8, second: i8) -> Instant {
    jiff::civil::date(year, month, day)
        .at(hour, minute, second, 0)
        .to_zoned(TimeZone::UTC)
        .unwrap()
        .into()
}

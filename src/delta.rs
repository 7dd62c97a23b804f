//! Calendar-aware decomposition of the time left until a target

use crate::instant::{CalendarError, Instant};
use serde::{Deserialize, Serialize};

pub const MS_PER_SECOND: i64 = 1000;
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Time remaining until a target, as whole calendar months plus a fixed-width rest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingDuration {
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl RemainingDuration {
    /// Labelled fields in display order
    pub fn fields(&self) -> [(&'static str, i64); 5] {
        [
            ("Months", self.months),
            ("Days", self.days),
            ("Hours", self.hours),
            ("Minutes", self.minutes),
            ("Seconds", self.seconds),
        ]
    }

    /// Milliseconds covered by the fixed-width part (days and below)
    #[cfg(test)]
    pub fn fixed_ms(&self) -> i64 {
        self.days * MS_PER_DAY
            + self.hours * MS_PER_HOUR
            + self.minutes * MS_PER_MINUTE
            + self.seconds * MS_PER_SECOND
    }
}

/// Decompose the time from `now` until `target`
///
/// Whole months are counted on the calendar and then backed off by one when
/// the target's day of month is earlier than now's. This does not look at
/// month lengths, so near the end of a month the remainder can come out
/// negative; floor division keeps the lower fields in range in that case and
/// the negative part lands in `days`.
///
/// Callers route `now >= target` to the ended state before calling this.
pub fn compute(target: &Instant, now: &Instant) -> Result<RemainingDuration, CalendarError> {
    let target_zoned = target.as_zoned()?;
    let now_zoned = now.as_zoned()?;

    let mut months = (i64::from(target_zoned.year()) - i64::from(now_zoned.year())) * 12
        + (i64::from(target_zoned.month()) - i64::from(now_zoned.month()));
    if target_zoned.day() < now_zoned.day() {
        months -= 1;
    }

    let month_start = now.add_months(months)?;
    let mut diff_ms =
        target_zoned.timestamp().as_millisecond() - month_start.as_zoned()?.timestamp().as_millisecond();

    let days = diff_ms.div_euclid(MS_PER_DAY);
    diff_ms -= days * MS_PER_DAY;

    let hours = diff_ms.div_euclid(MS_PER_HOUR);
    diff_ms -= hours * MS_PER_HOUR;

    let minutes = diff_ms.div_euclid(MS_PER_MINUTE);
    diff_ms -= minutes * MS_PER_MINUTE;

    let seconds = diff_ms.div_euclid(MS_PER_SECOND);

    Ok(RemainingDuration {
        months,
        days,
        hours,
        minutes,
        seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instant::utc;
    use jiff::tz::TimeZone;

    fn remaining(months: i64, days: i64, hours: i64, minutes: i64, seconds: i64) -> RemainingDuration {
        RemainingDuration {
            months,
            days,
            hours,
            minutes,
            seconds,
        }
    }

    fn assert_reconstructs(target: &Instant, now: &Instant) {
        let parts = compute(target, now).unwrap();
        let month_start = now.add_months(parts.months).unwrap();
        let rebuilt = month_start.epoch_ms().unwrap() + parts.fixed_ms();
        let drift = target.epoch_ms().unwrap() - rebuilt;
        assert!(
            (0..MS_PER_SECOND).contains(&drift),
            "{} -> {}: {:?} drifts by {}ms",
            now,
            target,
            parts,
            drift
        );
    }

    #[test]
    fn test_months_then_borrowed_hours() {
        let now = utc(2025, 1, 15, 10, 0, 0);
        let target = utc(2025, 3, 20, 8, 0, 0);
        assert_eq!(compute(&target, &now).unwrap(), remaining(2, 4, 22, 0, 0));
    }

    #[test]
    fn test_same_day_seconds() {
        let now = utc(2025, 1, 15, 10, 0, 0);
        let target = utc(2025, 1, 15, 10, 0, 5);
        assert_eq!(compute(&target, &now).unwrap(), remaining(0, 0, 0, 0, 5));
    }

    #[test]
    fn test_year_boundary() {
        let now = utc(2024, 11, 20, 0, 0, 0);
        let target = utc(2025, 2, 25, 12, 30, 15);
        assert_eq!(compute(&target, &now).unwrap(), remaining(3, 5, 12, 30, 15));
    }

    #[test]
    fn test_earlier_day_of_month_backs_off_one_month() {
        let now = utc(2025, 1, 20, 8, 0, 0);
        let target = utc(2025, 3, 10, 8, 0, 0);
        // Feb 20 to Mar 10 in a common year
        assert_eq!(compute(&target, &now).unwrap(), remaining(1, 18, 0, 0, 0));
    }

    #[test]
    fn test_day_heuristic_can_go_negative_at_month_end() {
        let now = utc(2025, 1, 31, 10, 0, 0);
        let target = utc(2025, 3, 1, 9, 0, 0);
        // Jan 31 + 1 month rolls to Mar 3, two days past the target
        let parts = compute(&target, &now).unwrap();
        assert_eq!(parts, remaining(1, -3, 23, 0, 0));
        assert_reconstructs(&target, &now);
    }

    #[test]
    fn test_subsecond_now_is_truncated_at_month_start() {
        let now: Instant = jiff::civil::date(2025, 1, 15)
            .at(10, 0, 0, 750_000_000)
            .to_zoned(TimeZone::UTC)
            .unwrap()
            .into();
        let target = utc(2025, 1, 15, 10, 0, 10);
        assert_eq!(compute(&target, &now).unwrap(), remaining(0, 0, 0, 0, 10));
    }

    #[test]
    fn test_fields_stay_in_range_and_reconstruct() {
        let cases = [
            (utc(2025, 1, 15, 10, 0, 0), utc(2025, 3, 20, 8, 0, 0)),
            (utc(2024, 2, 29, 23, 59, 59), utc(2025, 2, 28, 0, 0, 1)),
            (utc(2024, 12, 31, 23, 0, 0), utc(2025, 1, 1, 1, 0, 0)),
            (utc(2025, 6, 1, 0, 0, 0), utc(2027, 6, 1, 0, 0, 0)),
            (utc(2025, 4, 30, 12, 34, 56), utc(2025, 5, 31, 8, 0, 0)),
            (utc(2023, 7, 4, 18, 15, 0), utc(2026, 4, 27, 6, 0, 0)),
        ];

        for (now, target) in &cases {
            let parts = compute(target, now).unwrap();
            assert!(parts.months >= 0, "{:?}", parts);
            assert!((0..31).contains(&parts.days), "{:?}", parts);
            assert!((0..24).contains(&parts.hours), "{:?}", parts);
            assert!((0..60).contains(&parts.minutes), "{:?}", parts);
            assert!((0..60).contains(&parts.seconds), "{:?}", parts);
            assert_reconstructs(target, now);
        }
    }

    #[test]
    fn test_invalid_instant_is_an_error() {
        let now = utc(2025, 1, 15, 10, 0, 0);
        assert!(matches!(
            compute(&Instant::invalid(), &now),
            Err(CalendarError::Invalid)
        ));
    }

    #[test]
    fn test_fields_order() {
        let labels: Vec<_> = remaining(1, 2, 3, 4, 5)
            .fields()
            .iter()
            .map(|(label, value)| format!("{label}={value}"))
            .collect();
        assert_eq!(labels, ["Months=1", "Days=2", "Hours=3", "Minutes=4", "Seconds=5"]);
    }
}

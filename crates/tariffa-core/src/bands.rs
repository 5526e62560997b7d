// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Tariffa.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Tariff band classification.
//!
//! The band layout of the Italian day-ahead market convention:
//! - F1 = Mon-Fri 8-19
//! - F2 = Mon-Fri 7-8, Mon-Fri 19-23, Sat 7-23
//! - F3 = Mon-Sat 0-7, Mon-Sat 23-24, Sundays, public holidays

use crate::calendar::HolidayCalendar;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;
use tariffa_types::Band;

/// Market data is published for the Italian bidding zones; all tariff
/// arithmetic happens in this timezone regardless of where the host runs.
pub const MARKET_TZ: Tz = chrono_tz::Europe::Rome;

/// Band for a given calendar date, holiday flag and hour of day (0-23).
pub fn band_for_hour(date: NaiveDate, holiday: bool, hour: u32) -> Band {
    // Holidays and Sundays
    if holiday || date.weekday() == Weekday::Sun {
        return Band::F3;
    }

    // Saturday
    if date.weekday() == Weekday::Sat {
        if (7..23).contains(&hour) {
            return Band::F2;
        }
        return Band::F3;
    }

    // Working weekdays
    if hour == 7 || (19..23).contains(&hour) {
        return Band::F2;
    }
    if (8..19).contains(&hour) {
        return Band::F1;
    }
    Band::F3
}

/// Band in force at `now` plus the exact instant of the next band change.
///
/// Applying this a second time, seeded with the returned instant, yields the
/// following band and its start, giving two transitions of lookahead.
pub fn current_band(now: DateTime<Tz>, calendar: &HolidayCalendar) -> (Band, DateTime<Tz>) {
    let today = now.date_naive();

    // Holidays behave like Sundays: F3 all day, next change at 07:00 of the
    // next working day.
    if calendar.is_holiday(today) {
        return (Band::F3, next_occurrence(now, 7, 0, 1, true, calendar));
    }

    match today.weekday() {
        Weekday::Sun => (Band::F3, next_occurrence(now, 7, 0, 1, true, calendar)),
        Weekday::Sat => {
            if (7..23).contains(&now.hour()) {
                // Saturday 7-23
                (Band::F2, next_occurrence(now, 23, 0, 0, false, calendar))
            } else if now.hour() < 7 {
                // Saturday before 7: F2 starts the same morning
                (Band::F3, next_occurrence(now, 7, 0, 0, false, calendar))
            } else {
                // Saturday after 23
                (Band::F3, next_occurrence(now, 7, 0, 1, true, calendar))
            }
        }
        Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu | Weekday::Fri => {
            let hour = now.hour();
            if hour == 7 {
                (Band::F2, next_occurrence(now, 8, 0, 0, false, calendar))
            } else if (19..23).contains(&hour) {
                (Band::F2, next_occurrence(now, 23, 0, 0, false, calendar))
            } else if (8..19).contains(&hour) {
                (Band::F1, next_occurrence(now, 19, 0, 0, false, calendar))
            } else if hour < 7 {
                // After midnight, before the morning shoulder
                (Band::F3, next_occurrence(now, 7, 0, 0, false, calendar))
            } else {
                // 23-24: F3 runs until 07:00 of the next working day
                (Band::F3, next_occurrence(now, 7, 0, 1, true, calendar))
            }
        }
    }
}

/// The instant at `hour:minute` on `from + offset_days`, in the market
/// timezone. With `working_day_only` the date advances one day at a time
/// until it is neither a holiday nor a Sunday; holiday runs are short, so
/// the loop terminates after a handful of steps at most.
pub fn next_occurrence(
    from: DateTime<Tz>,
    hour: u32,
    minute: u32,
    offset_days: i64,
    working_day_only: bool,
    calendar: &HolidayCalendar,
) -> DateTime<Tz> {
    let mut date = from.date_naive() + Duration::days(offset_days);

    if working_day_only {
        while calendar.is_holiday(date) || date.weekday() == Weekday::Sun {
            date += Duration::days(1);
        }
    }

    at_local(date, hour, minute, from.timezone())
}

/// Resolve a wall-clock time in `tz`, stepping forward through DST gaps and
/// taking the earlier of ambiguous instants.
fn at_local(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> DateTime<Tz> {
    let mut naive = date
        .and_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));

    loop {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => {
                return instant;
            }
            LocalResult::None => {
                // Inside a spring-forward gap; the band boundary effectively
                // moves to the first representable instant after it.
                naive += Duration::minutes(30);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rome(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        MARKET_TZ
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap()
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_weekday_partition_is_11_6_7() {
        // 2025-03-05 is a plain Wednesday
        let day = date(2025, 3, 5);
        let mut f1 = 0;
        let mut f2 = 0;
        let mut f3 = 0;
        for hour in 0..24 {
            match band_for_hour(day, false, hour) {
                Band::F1 => f1 += 1,
                Band::F2 => f2 += 1,
                Band::F3 => f3 += 1,
                other => panic!("classifier returned non-source band {other}"),
            }
        }
        assert_eq!((f1, f2, f3), (11, 6, 7));
    }

    #[test]
    fn test_saturday_bands() {
        // 2025-03-08 is a Saturday
        let day = date(2025, 3, 8);
        assert_eq!(band_for_hour(day, false, 6), Band::F3);
        assert_eq!(band_for_hour(day, false, 7), Band::F2);
        assert_eq!(band_for_hour(day, false, 12), Band::F2);
        assert_eq!(band_for_hour(day, false, 22), Band::F2);
        assert_eq!(band_for_hour(day, false, 23), Band::F3);
    }

    #[test]
    fn test_sunday_and_holiday_are_f3() {
        let sunday = date(2025, 3, 9);
        for hour in 0..24 {
            assert_eq!(band_for_hour(sunday, false, hour), Band::F3);
        }
        // Christmas 2025 falls on a Thursday
        let christmas = date(2025, 12, 25);
        for hour in 0..24 {
            assert_eq!(band_for_hour(christmas, true, hour), Band::F3);
        }
    }

    #[test]
    fn test_christmas_classifies_f3_any_weekday() {
        let calendar = HolidayCalendar::for_years(2020, 2030);
        for year in 2020..=2030 {
            let christmas = date(year, 12, 25);
            assert!(calendar.is_holiday(christmas));
            for hour in [0, 7, 12, 20, 23] {
                assert_eq!(
                    band_for_hour(christmas, calendar.is_holiday(christmas), hour),
                    Band::F3
                );
            }
        }
    }

    #[test]
    fn test_weekday_transitions() {
        let calendar = HolidayCalendar::covering(2025);

        // Wednesday 10:00 -> F1 until 19:00
        let (band, next) = current_band(rome(2025, 3, 5, 10, 0), &calendar);
        assert_eq!(band, Band::F1);
        assert_eq!(next, rome(2025, 3, 5, 19, 0));

        // Wednesday 07:30 -> F2 until 08:00
        let (band, next) = current_band(rome(2025, 3, 5, 7, 30), &calendar);
        assert_eq!(band, Band::F2);
        assert_eq!(next, rome(2025, 3, 5, 8, 0));

        // Wednesday 20:00 -> F2 until 23:00
        let (band, next) = current_band(rome(2025, 3, 5, 20, 0), &calendar);
        assert_eq!(band, Band::F2);
        assert_eq!(next, rome(2025, 3, 5, 23, 0));

        // Wednesday 23:30 -> F3 until Thursday 07:00
        let (band, next) = current_band(rome(2025, 3, 5, 23, 30), &calendar);
        assert_eq!(band, Band::F3);
        assert_eq!(next, rome(2025, 3, 6, 7, 0));

        // Wednesday 03:00 -> F3 until 07:00 the same day
        let (band, next) = current_band(rome(2025, 3, 5, 3, 0), &calendar);
        assert_eq!(band, Band::F3);
        assert_eq!(next, rome(2025, 3, 5, 7, 0));
    }

    #[test]
    fn test_saturday_transitions() {
        let calendar = HolidayCalendar::covering(2025);

        // Saturday 12:00 -> F2 until 23:00
        let (band, next) = current_band(rome(2025, 3, 8, 12, 0), &calendar);
        assert_eq!(band, Band::F2);
        assert_eq!(next, rome(2025, 3, 8, 23, 0));

        // Saturday 23:30 -> F3, Sunday skipped, Monday 07:00
        let (band, next) = current_band(rome(2025, 3, 8, 23, 30), &calendar);
        assert_eq!(band, Band::F3);
        assert_eq!(next, rome(2025, 3, 10, 7, 0));
    }

    #[test]
    fn test_holiday_skips_to_working_day() {
        let calendar = HolidayCalendar::covering(2025);

        // Christmas 2025 (Thursday): next change is St. Stephen's day + one
        // more step, landing on Saturday 07:00.
        let (band, next) = current_band(rome(2025, 12, 25, 12, 0), &calendar);
        assert_eq!(band, Band::F3);
        assert_eq!(next, rome(2025, 12, 27, 7, 0));
    }

    #[test]
    fn test_two_lookahead_strictly_increases() {
        let calendar = HolidayCalendar::covering(2025);
        let starts = [
            rome(2025, 3, 5, 0, 0),
            rome(2025, 3, 5, 7, 15),
            rome(2025, 3, 8, 22, 59),
            rome(2025, 12, 25, 12, 0),
            rome(2025, 4, 20, 9, 0), // Easter Sunday
        ];
        for start in starts {
            let (_, first) = current_band(start, &calendar);
            let (_, second) = current_band(first, &calendar);
            assert!(first > start, "no progress from {start}");
            assert!(second > first, "no progress from {first}");
        }
    }

    #[test]
    fn test_band_differs_across_transition() {
        let calendar = HolidayCalendar::covering(2025);
        let (band, next) = current_band(rome(2025, 3, 5, 10, 0), &calendar);
        let (next_band, _) = current_band(next, &calendar);
        assert_eq!(band, Band::F1);
        assert_eq!(next_band, Band::F2);
    }

    #[test]
    fn test_next_occurrence_working_day_skips_holiday_run() {
        let calendar = HolidayCalendar::covering(2025);
        // From Dec 24 2025 (Wed): Dec 25 and 26 are holidays, Dec 27 is a
        // Saturday and eligible.
        let from = rome(2025, 12, 24, 23, 30);
        let next = next_occurrence(from, 7, 0, 1, true, &calendar);
        assert_eq!(next, rome(2025, 12, 27, 7, 0));
    }
}

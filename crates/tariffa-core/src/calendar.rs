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

//! Italian national-holiday calendar.
//!
//! The tariff rules treat public holidays like Sundays, so both the band
//! classifier and the archive extractor need to answer "is this date a
//! holiday" for dates around the current year. The calendar is an explicit
//! value passed to them; [`shared`] keeps one process-wide instance that is
//! rebuilt only when the calendar year changes.

use chrono::{Datelike, Duration, NaiveDate};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// Precomputed holiday dates for a contiguous range of years.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    first_year: i32,
    last_year: i32,
    days: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    /// Build a calendar covering `first_year..=last_year` inclusive.
    pub fn for_years(first_year: i32, last_year: i32) -> Self {
        let mut days = HashSet::new();
        for year in first_year..=last_year {
            days.extend(holiday_dates(year));
        }
        Self {
            first_year,
            last_year,
            days,
        }
    }

    /// Calendar for the year surrounding `year`, one year of slack on each
    /// side so lookups across New Year never miss.
    pub fn covering(year: i32) -> Self {
        Self::for_years(year - 1, year + 1)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        if (self.first_year..=self.last_year).contains(&date.year()) {
            self.days.contains(&date)
        } else {
            // Out-of-range lookup: compute directly instead of answering
            // from an incomplete set.
            holiday_dates(date.year()).contains(&date)
        }
    }

    pub fn covers(&self, year: i32) -> bool {
        // Requires slack on both sides so classifier lookahead stays inside.
        (self.first_year < year) && (year < self.last_year)
    }
}

/// Italian national holidays for one year: the fixed feasts plus Easter
/// Sunday and Easter Monday.
pub fn holiday_dates(year: i32) -> Vec<NaiveDate> {
    let fixed = [
        (1, 1),   // Capodanno
        (1, 6),   // Epifania
        (4, 25),  // Liberazione
        (5, 1),   // Festa dei Lavoratori
        (6, 2),   // Festa della Repubblica
        (8, 15),  // Ferragosto
        (11, 1),  // Ognissanti
        (12, 8),  // Immacolata Concezione
        (12, 25), // Natale
        (12, 26), // Santo Stefano
    ];

    let mut days: Vec<NaiveDate> = fixed
        .iter()
        .filter_map(|&(month, day)| NaiveDate::from_ymd_opt(year, month, day))
        .collect();

    let easter = easter_sunday(year);
    days.push(easter);
    days.push(easter + Duration::days(1)); // Lunedì dell'Angelo

    days
}

/// Gregorian Easter Sunday (anonymous computus).
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 4, 1).expect("April 1st always exists"))
}

static SHARED: OnceLock<Mutex<Arc<HolidayCalendar>>> = OnceLock::new();

/// Process-wide calendar instance. Rebuilt lazily when `year` drifts outside
/// the cached range (i.e. once per calendar-year rollover).
pub fn shared(year: i32) -> Arc<HolidayCalendar> {
    let cell = SHARED.get_or_init(|| Mutex::new(Arc::new(HolidayCalendar::covering(year))));
    let mut guard = cell.lock();
    if !guard.covers(year) {
        *guard = Arc::new(HolidayCalendar::covering(year));
    }
    Arc::clone(&guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_easter_known_years() {
        assert_eq!(easter_sunday(2024), date(2024, 3, 31));
        assert_eq!(easter_sunday(2025), date(2025, 4, 20));
        assert_eq!(easter_sunday(2026), date(2026, 4, 5));
        assert_eq!(easter_sunday(2000), date(2000, 4, 23));
    }

    #[test]
    fn test_fixed_holidays() {
        let calendar = HolidayCalendar::covering(2025);
        assert!(calendar.is_holiday(date(2025, 12, 25)));
        assert!(calendar.is_holiday(date(2025, 1, 6)));
        assert!(calendar.is_holiday(date(2025, 8, 15)));
        assert!(!calendar.is_holiday(date(2025, 3, 3)));
    }

    #[test]
    fn test_easter_monday_is_holiday() {
        let calendar = HolidayCalendar::covering(2025);
        assert!(calendar.is_holiday(date(2025, 4, 21)));
    }

    #[test]
    fn test_out_of_range_lookup_still_answers() {
        let calendar = HolidayCalendar::covering(2025);
        assert!(calendar.is_holiday(date(1999, 12, 25)));
        assert!(!calendar.is_holiday(date(1999, 12, 27)));
    }

    #[test]
    fn test_covering_has_slack() {
        let calendar = HolidayCalendar::covering(2025);
        assert!(calendar.covers(2025));
        assert!(!calendar.covers(2024));
        assert!(!calendar.covers(2026));
    }
}

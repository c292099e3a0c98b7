// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of SwitchION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Hour alignment between local civil time and the feed's reporting grid.
//!
//! The feed publishes on a DST-naive Eastern standard-time grid using the
//! Hour-Ending convention (the price for HE N covers the 60 minutes ending
//! at N:00). Local civil time is Central, so while DST is in effect the two
//! zones share a UTC offset and only the HE shift applies; under standard
//! time the civil day is one hour behind the reporting day on top of that.
//!
//! This arithmetic is the safety-critical heart of the system. Do not touch
//! it without extending the exhaustive boundary tests below.

use chrono::{DateTime, Duration, NaiveDate, Timelike};
use chrono_tz::Tz;

use crate::clock::is_dst;

/// Map a local civil hour (0-23) to the feed's table index.
///
/// DST in effect: `H - 1` (Hour-Ending removes one).
/// Standard time: `H - 2`, except civil hour 23 which maps to the synthetic
/// `-1` slot of the *following* reporting day's table.
pub fn align(civil_hour: u32, dst: bool) -> i8 {
    debug_assert!(civil_hour <= 23);
    if dst {
        civil_hour as i8 - 1
    } else if civil_hour == 23 {
        -1
    } else {
        civil_hour as i8 - 2
    }
}

/// The calendar date whose price table covers `now`.
///
/// Tomorrow's date iff DST is off and the civil hour is 23 (that hour lives
/// in the next reporting day's table, index -1); today's date otherwise.
/// Must agree with [`align`] so that index -1 resolves in the fetched table.
pub fn effective_date(now: DateTime<Tz>) -> NaiveDate {
    if !is_dst(now) && now.hour() == 23 {
        (now + Duration::days(1)).date_naive()
    } else {
        now.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Chicago;

    #[test]
    fn test_align_dst_all_hours() {
        for hour in 0..=23u32 {
            assert_eq!(align(hour, true), hour as i8 - 1, "civil hour {hour}");
        }
    }

    #[test]
    fn test_align_standard_all_hours() {
        for hour in 0..=22u32 {
            assert_eq!(align(hour, false), hour as i8 - 2, "civil hour {hour}");
        }
        assert_eq!(align(23, false), -1);
    }

    #[test]
    fn test_align_boundaries() {
        // Top and bottom of both regimes, spelled out.
        assert_eq!(align(0, true), -1);
        assert_eq!(align(23, true), 22);
        assert_eq!(align(0, false), -2);
        assert_eq!(align(22, false), 20);
        assert_eq!(align(23, false), -1);
    }

    #[test]
    fn test_effective_date_standard_hour_23_is_tomorrow() {
        let now = Chicago.with_ymd_and_hms(2024, 1, 15, 23, 5, 0).unwrap();
        assert_eq!(
            effective_date(now),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
    }

    #[test]
    fn test_effective_date_standard_other_hours_are_today() {
        for hour in 0..=22u32 {
            let now = Chicago.with_ymd_and_hms(2024, 1, 15, hour, 30, 0).unwrap();
            assert_eq!(
                effective_date(now),
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                "civil hour {hour}"
            );
        }
    }

    #[test]
    fn test_effective_date_dst_hour_23_stays_today() {
        let now = Chicago.with_ymd_and_hms(2024, 7, 15, 23, 59, 0).unwrap();
        assert_eq!(
            effective_date(now),
            NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
        );
    }

    #[test]
    fn test_effective_date_year_rollover() {
        let now = Chicago.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(
            effective_date(now),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }
}

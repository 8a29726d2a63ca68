/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Calendar date/time and its conversion to and from [`UnixTime`].
//!
//! The conversions use the canonical days-from-civil / civil-from-days
//! algorithm (Howard Hinnant's `chrono`-compatible arithmetic) rather than a
//! month-offset table, so the round trip `to_date_time(to_unix_time(dt)) ==
//! dt` holds for every valid date in the representable range.

use serde::{Deserialize, Serialize};

use crate::UnixTime;

const SECONDS_IN_A_DAY: u32 = 86_400;
const SECONDS_IN_AN_HOUR: u32 = 3_600;
const SECONDS_IN_A_MINUTE: u32 = 60;

/// Date and time.
///
/// The fields describe the time and date passed since January 1st, 1970:
/// `year` counts years since 1970 (1 is 1971, 2 is 1972, ...). `weekday` runs
/// 1-7 for Sunday-Saturday.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct DateTime {
    /// Seconds. 0-59.
    pub second: u8,
    /// Minutes. 0-59.
    pub minute: u8,
    /// Hour. 0-23.
    pub hour: u8,
    /// Day. 1-31.
    pub day: u8,
    /// Weekday. 1-7 (Sun-Sat).
    pub weekday: u8,
    /// Month. 1-12.
    pub month: u8,
    /// Years since 1970.
    pub year: u16,
}

impl Default for DateTime {
    /// Unix time 0: Thursday, January 1st 1970, 00:00:00.
    fn default() -> Self {
        Self {
            second: 0,
            minute: 0,
            hour: 0,
            day: 1,
            weekday: 5,
            month: 1,
            year: 0,
        }
    }
}

/// Time of day subset of [`DateTime`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct Time {
    /// Seconds. 0-59.
    pub second: u8,
    /// Minutes. 0-59.
    pub minute: u8,
    /// Hour. 0-23.
    pub hour: u8,
}

/// Calendar date subset of [`DateTime`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct Date {
    /// Day. 1-31.
    pub day: u8,
    /// Weekday. 1-7 (Sun-Sat).
    pub weekday: u8,
    /// Month. 1-12.
    pub month: u8,
    /// Years since 1970.
    pub year: u16,
}

mod ordering {
    use super::*;

    impl PartialOrd for DateTime {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for DateTime {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            (self.year, self.month, self.day, self.hour, self.minute, self.second)
                .cmp(&(
                    other.year,
                    other.month,
                    other.day,
                    other.hour,
                    other.minute,
                    other.second,
                ))
        }
    }

    impl std::ops::Add for DateTime {
        type Output = DateTime;

        fn add(self, other: DateTime) -> DateTime {
            to_date_time(to_unix_time(&self).wrapping_add(to_unix_time(&other)))
        }
    }
}

impl std::fmt::Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{} {}:{}:{}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Days since 1970-01-01 for a civil date. `year` is the civil year (e.g.
/// 2025), months run 1-12, days 1-31. Negative results are valid for dates
/// before the epoch, though callers in this crate never produce them.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let month_shifted = i64::from(if month > 2 { month - 3 } else { month + 9 });
    let day_of_year = (153 * month_shifted + 2) / 5 + i64::from(day) - 1;
    let day_of_era =
        year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

/// Civil `(year, month, day)` for a count of days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let days = days + 719_468;
    let era = if days >= 0 { days } else { days - 146_096 } / 146_097;
    let day_of_era = days - era * 146_097;
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524
        - day_of_era / 146_096)
        / 365;
    let year = year_of_era + era * 400;
    let day_of_year =
        day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_shifted = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * month_shifted + 2) / 5 + 1) as u32;
    let month = (if month_shifted < 10 {
        month_shifted + 3
    } else {
        month_shifted - 9
    }) as u32;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

/// Convert a [`DateTime`] to seconds since the epoch.
///
/// The `weekday` field does not participate; it is derived state.
#[must_use]
pub fn to_unix_time(date_time: &DateTime) -> UnixTime {
    let days = days_from_civil(
        1970 + i64::from(date_time.year),
        u32::from(date_time.month),
        u32::from(date_time.day),
    );
    let seconds_of_day = u32::from(date_time.hour) * SECONDS_IN_AN_HOUR
        + u32::from(date_time.minute) * SECONDS_IN_A_MINUTE
        + u32::from(date_time.second);
    (days * i64::from(SECONDS_IN_A_DAY) + i64::from(seconds_of_day)) as UnixTime
}

/// Convert seconds since the epoch to a [`DateTime`], including the weekday
/// (1970-01-01 was a Thursday).
#[must_use]
pub fn to_date_time(seconds: UnixTime) -> DateTime {
    let days = i64::from(seconds / SECONDS_IN_A_DAY);
    let mut seconds_of_day = seconds % SECONDS_IN_A_DAY;

    let (year, month, day) = civil_from_days(days);

    let hour = (seconds_of_day / SECONDS_IN_AN_HOUR) as u8;
    seconds_of_day %= SECONDS_IN_AN_HOUR;
    let minute = (seconds_of_day / SECONDS_IN_A_MINUTE) as u8;
    let second = (seconds_of_day % SECONDS_IN_A_MINUTE) as u8;

    DateTime {
        second,
        minute,
        hour,
        day: day as u8,
        weekday: ((days + 4) % 7 + 1) as u8,
        month: month as u8,
        year: (year - 1970) as u16,
    }
}

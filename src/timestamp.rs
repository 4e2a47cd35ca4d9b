//! Entry modification times.
//!
//! ZIP stores a DOS date/time (two-second resolution, no time zone, years
//! 1980 to 2107); TAR stores whole Unix seconds. [`Timestamp`] keeps whole
//! seconds since the Unix epoch and converts to and from both. DOS values
//! are interpreted as UTC so a rewrite never shifts a time.
//!
//! # Example
//!
//! ```rust
//! use zipup::Timestamp;
//!
//! let ts = Timestamp::from_civil(2024, 3, 9, 14, 5, 0).unwrap();
//! assert_eq!(ts.to_string(), "2024-03-09 14:05:00");
//! assert_eq!(Timestamp::from_unix_secs(ts.as_unix_secs()), ts);
//! ```

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SECS_PER_DAY: i64 = 86_400;

/// A modification time with one-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    unix_secs: i64,
}

/// Broken-down UTC calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    /// Full year, e.g. 2024.
    pub year: i64,
    /// Month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Hour, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Second, 0-59.
    pub second: u8,
}

impl Timestamp {
    /// Creates a timestamp from Unix seconds.
    #[inline]
    pub const fn from_unix_secs(unix_secs: i64) -> Self {
        Self { unix_secs }
    }

    /// Returns seconds since the Unix epoch.
    #[inline]
    pub const fn as_unix_secs(&self) -> i64 {
        self.unix_secs
    }

    /// Returns the current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Creates a timestamp from a `SystemTime`, dropping sub-second precision.
    pub fn from_system_time(time: SystemTime) -> Self {
        let unix_secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        };
        Self { unix_secs }
    }

    /// Converts to a `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        if self.unix_secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.unix_secs as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.unix_secs.unsigned_abs())
        }
    }

    /// Creates a timestamp from UTC calendar fields.
    ///
    /// Returns `None` if any field is out of range.
    pub fn from_civil(year: i64, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        if !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        let days = days_from_civil(year, month, day);
        let secs = days * SECS_PER_DAY + hour as i64 * 3600 + minute as i64 * 60 + second as i64;
        Some(Self::from_unix_secs(secs))
    }

    /// Breaks the timestamp into UTC calendar fields.
    pub fn to_civil(&self) -> CivilTime {
        let days = self.unix_secs.div_euclid(SECS_PER_DAY);
        let rem = self.unix_secs.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        CivilTime {
            year,
            month,
            day,
            hour: (rem / 3600) as u8,
            minute: (rem % 3600 / 60) as u8,
            second: (rem % 60) as u8,
        }
    }

    /// Converts a ZIP DOS date/time.
    pub(crate) fn from_zip(dt: zip::DateTime) -> Option<Self> {
        Self::from_civil(
            dt.year() as i64,
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
        )
    }

    /// Converts to a ZIP DOS date/time, clamping to the representable range.
    pub(crate) fn to_zip(self) -> zip::DateTime {
        let c = self.to_civil();
        if c.year < 1980 {
            return zip::DateTime::default();
        }
        let year = c.year.min(2107) as u16;
        // DOS seconds are stored halved
        let second = c.second - c.second % 2;
        zip::DateTime::from_date_and_time(year, c.month, c.day, c.hour, c.minute, second)
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.to_civil();
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            c.year, c.month, c.day, c.hour, c.minute, c.second
        )
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        ts.as_system_time()
    }
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

// Days since 1970-01-01 in the proleptic Gregorian calendar.
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

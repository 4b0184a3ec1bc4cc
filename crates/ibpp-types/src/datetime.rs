//! Calendar types and their wire encodings.
//!
//! Dates are stored as a day number where `1` is 1 January 1900, covering
//! 0001-01-01 ([`MIN_DATE`]) to 9999-12-31 ([`MAX_DATE`]) on the proleptic
//! Gregorian calendar. Times are stored in ten-thousandths of a second since
//! midnight, the resolution the server uses.
//!
//! On the wire a date is the number of days since 17 November 1858 and a
//! time is the same tick count, both as little-endian 32-bit words. A
//! timestamp is a date word followed by a time word.
//!
//! ## Example
//!
//! ```rust
//! use ibpp_types::{Date, dtoi, itod};
//!
//! assert_eq!(dtoi(1900, 1, 1), Some(1));
//! assert_eq!(itod(1), Some((1900, 1, 1)));
//!
//! let d = Date::new(2024, 2, 28).unwrap().add_days(1).unwrap();
//! assert_eq!(d.to_string(), "2024-02-29");
//! ```

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::TypeError;

/// Day number of 0001-01-01.
pub const MIN_DATE: i32 = -693_594;

/// Day number of 9999-12-31.
pub const MAX_DATE: i32 = 2_958_464;

/// Time ticks per second.
pub const TICKS_PER_SECOND: i32 = 10_000;

/// Time ticks per day.
pub const TICKS_PER_DAY: i32 = 86_400 * TICKS_PER_SECOND;

/// Days from 0001-01-01 (day 1 of the common era) to 1899-12-31.
const DEC31_1899: i32 = 693_595;

/// Offset between the day numbering used here and the wire's.
const WIRE_DATE_SHIFT: i32 = 15_019;

const NANOS_PER_TICK: u32 = 100_000;

/// Day number for a calendar date, or `None` when the date does not exist
/// or lies outside year 1..=9999.
#[must_use]
pub fn dtoi(year: i32, month: u32, day: u32) -> Option<i32> {
    if !(1..=9999).contains(&year) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.num_days_from_ce() - DEC31_1899)
}

/// Calendar date for a day number, or `None` outside the supported range.
#[must_use]
pub fn itod(date: i32) -> Option<(i32, u32, u32)> {
    if !(MIN_DATE..=MAX_DATE).contains(&date) {
        return None;
    }
    let d = NaiveDate::from_num_days_from_ce_opt(date + DEC31_1899)?;
    Some((d.year(), d.month(), d.day()))
}

/// Tick count for a time of day.
#[must_use]
pub fn ttoi(hour: u32, minute: u32, second: u32, ticks: u32) -> Option<i32> {
    if hour > 23 || minute > 59 || second > 59 || ticks >= TICKS_PER_SECOND as u32 {
        return None;
    }
    let total = ((hour * 60 + minute) * 60 + second) * TICKS_PER_SECOND as u32 + ticks;
    i32::try_from(total).ok()
}

/// Time of day `(hour, minute, second, ticks)` for a tick count.
#[must_use]
pub fn itot(time: i32) -> Option<(u32, u32, u32, u32)> {
    if !(0..TICKS_PER_DAY).contains(&time) {
        return None;
    }
    let time = time as u32;
    let tps = TICKS_PER_SECOND as u32;
    let ticks = time % tps;
    let secs = time / tps;
    Some((secs / 3600, (secs / 60) % 60, secs % 60, ticks))
}

/// A calendar date without time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(i32);

impl Date {
    /// Build from year, month and day.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, TypeError> {
        dtoi(year, month, day)
            .map(Self)
            .ok_or_else(|| TypeError::InvalidDateTime(format!("{year:04}-{month:02}-{day:02}")))
    }

    /// Build from a day number (`1` is 1 January 1900).
    pub fn from_days(days: i32) -> Result<Self, TypeError> {
        if (MIN_DATE..=MAX_DATE).contains(&days) {
            Ok(Self(days))
        } else {
            Err(TypeError::InvalidDateTime(format!("day number {days}")))
        }
    }

    /// Day number.
    #[must_use]
    pub const fn days(self) -> i32 {
        self.0
    }

    /// `(year, month, day)`.
    #[must_use]
    pub fn ymd(self) -> (i32, u32, u32) {
        let d = self.naive();
        (d.year(), d.month(), d.day())
    }

    /// Year.
    #[must_use]
    pub fn year(self) -> i32 {
        self.naive().year()
    }

    /// Month, 1..=12.
    #[must_use]
    pub fn month(self) -> u32 {
        self.naive().month()
    }

    /// Day of month, 1..=31.
    #[must_use]
    pub fn day(self) -> u32 {
        self.naive().day()
    }

    /// Shift by a number of days.
    pub fn add_days(self, days: i32) -> Result<Self, TypeError> {
        let shifted = self
            .0
            .checked_add(days)
            .ok_or_else(|| TypeError::InvalidDateTime(format!("{self} + {days} days")))?;
        Self::from_days(shifted)
    }

    /// First day of this date's month.
    #[must_use]
    pub fn start_of_month(self) -> Self {
        Self(self.0 - self.day() as i32 + 1)
    }

    /// Last day of this date's month.
    #[must_use]
    pub fn end_of_month(self) -> Self {
        let (year, month, _) = self.ymd();
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        match NaiveDate::from_ymd_opt(next_year, next_month, 1) {
            Some(first) => Self(first.num_days_from_ce() - DEC31_1899 - 1),
            // December 9999
            None => Self(MAX_DATE),
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn to_wire(self) -> i32 {
        self.0 + WIRE_DATE_SHIFT
    }

    /// Decode the wire representation.
    pub fn from_wire(wire: i32) -> Result<Self, TypeError> {
        wire.checked_sub(WIRE_DATE_SHIFT)
            .and_then(|days| Self::from_days(days).ok())
            .ok_or_else(|| TypeError::InvalidDateTime(format!("wire date {wire}")))
    }

    fn naive(self) -> NaiveDate {
        // Construction guarantees the day number is in range.
        NaiveDate::from_num_days_from_ce_opt(self.0 + DEC31_1899).unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (y, m, d) = self.ymd();
        write!(f, "{y:04}-{m:02}-{d:02}")
    }
}

impl From<Date> for NaiveDate {
    fn from(date: Date) -> Self {
        date.naive()
    }
}

impl TryFrom<NaiveDate> for Date {
    type Error = TypeError;

    fn try_from(value: NaiveDate) -> Result<Self, Self::Error> {
        Self::new(value.year(), value.month(), value.day())
    }
}

/// A time of day with ten-thousandth of a second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i32);

impl Time {
    /// Midnight.
    pub const MIDNIGHT: Self = Self(0);

    /// Build from hour, minute, second and ten-thousandths.
    pub fn new(hour: u32, minute: u32, second: u32, ticks: u32) -> Result<Self, TypeError> {
        ttoi(hour, minute, second, ticks).map(Self).ok_or_else(|| {
            TypeError::InvalidDateTime(format!("{hour:02}:{minute:02}:{second:02}.{ticks:04}"))
        })
    }

    /// Build from a tick count since midnight.
    pub fn from_ticks(ticks: i32) -> Result<Self, TypeError> {
        if (0..TICKS_PER_DAY).contains(&ticks) {
            Ok(Self(ticks))
        } else {
            Err(TypeError::InvalidDateTime(format!("tick count {ticks}")))
        }
    }

    /// Ticks since midnight.
    #[must_use]
    pub const fn ticks(self) -> i32 {
        self.0
    }

    /// `(hour, minute, second, ticks)`.
    #[must_use]
    pub fn hms(self) -> (u32, u32, u32, u32) {
        itot(self.0).unwrap_or((0, 0, 0, 0))
    }

    /// Hour, 0..=23.
    #[must_use]
    pub fn hours(self) -> u32 {
        self.hms().0
    }

    /// Minute, 0..=59.
    #[must_use]
    pub fn minutes(self) -> u32 {
        self.hms().1
    }

    /// Second, 0..=59.
    #[must_use]
    pub fn seconds(self) -> u32 {
        self.hms().2
    }

    /// Ten-thousandths of a second, 0..=9999.
    #[must_use]
    pub fn sub_seconds(self) -> u32 {
        self.hms().3
    }

    /// Wire representation.
    #[must_use]
    pub const fn to_wire(self) -> u32 {
        self.0 as u32
    }

    /// Decode the wire representation.
    pub fn from_wire(wire: u32) -> Result<Self, TypeError> {
        let ticks = i32::try_from(wire)
            .map_err(|_| TypeError::InvalidDateTime(format!("tick count {wire}")))?;
        Self::from_ticks(ticks)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s, t) = self.hms();
        write!(f, "{h:02}:{m:02}:{s:02}.{t:04}")
    }
}

impl From<Time> for NaiveTime {
    fn from(time: Time) -> Self {
        let secs = (time.0 / TICKS_PER_SECOND) as u32;
        let nanos = (time.0 % TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).unwrap_or(NaiveTime::MIN)
    }
}

impl From<NaiveTime> for Time {
    /// Sub-tick precision is truncated. A leap second folds into the
    /// preceding second.
    fn from(value: NaiveTime) -> Self {
        let secs = value.num_seconds_from_midnight() as i32;
        let ticks = ((value.nanosecond() % 1_000_000_000) / NANOS_PER_TICK) as i32;
        Self(secs * TICKS_PER_SECOND + ticks)
    }
}

/// A date and a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    date: Date,
    time: Time,
}

impl Timestamp {
    /// Combine a date and a time.
    #[must_use]
    pub const fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    /// Build from calendar and clock components.
    pub fn from_parts(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        ticks: u32,
    ) -> Result<Self, TypeError> {
        Ok(Self {
            date: Date::new(year, month, day)?,
            time: Time::new(hour, minute, second, ticks)?,
        })
    }

    /// Date part.
    #[must_use]
    pub const fn date(self) -> Date {
        self.date
    }

    /// Time part.
    #[must_use]
    pub const fn time(self) -> Time {
        self.time
    }

    /// Wire representation: date word, then time word.
    #[must_use]
    pub const fn to_wire(self) -> (i32, u32) {
        (self.date.to_wire(), self.time.to_wire())
    }

    /// Decode the wire representation.
    pub fn from_wire(date: i32, time: u32) -> Result<Self, TypeError> {
        Ok(Self {
            date: Date::from_wire(date)?,
            time: Time::from_wire(time)?,
        })
    }
}

impl From<Date> for Timestamp {
    fn from(date: Date) -> Self {
        Self::new(date, Time::MIDNIGHT)
    }
}

impl From<Timestamp> for Date {
    fn from(ts: Timestamp) -> Self {
        ts.date
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

impl From<Timestamp> for NaiveDateTime {
    fn from(ts: Timestamp) -> Self {
        NaiveDateTime::new(ts.date.into(), ts.time.into())
    }
}

impl TryFrom<NaiveDateTime> for Timestamp {
    type Error = TypeError;

    fn try_from(value: NaiveDateTime) -> Result<Self, Self::Error> {
        Ok(Self::new(value.date().try_into()?, value.time().into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_day_numbering_anchors() {
        assert_eq!(dtoi(1900, 1, 1), Some(1));
        assert_eq!(dtoi(1899, 12, 31), Some(0));
        assert_eq!(dtoi(1, 1, 1), Some(MIN_DATE));
        assert_eq!(dtoi(9999, 12, 31), Some(MAX_DATE));
        assert_eq!(itod(MIN_DATE), Some((1, 1, 1)));
        assert_eq!(itod(MAX_DATE), Some((9999, 12, 31)));
    }

    #[test]
    fn test_invalid_dates_rejected() {
        assert_eq!(dtoi(2023, 2, 29), None);
        assert_eq!(dtoi(0, 12, 31), None);
        assert_eq!(dtoi(10000, 1, 1), None);
        assert_eq!(itod(MAX_DATE + 1), None);
        assert!(Date::new(2021, 13, 1).is_err());
    }

    #[test]
    fn test_wire_date_epoch() {
        // 17 November 1858 is wire day zero.
        let epoch = Date::new(1858, 11, 17).unwrap();
        assert_eq!(epoch.to_wire(), 0);
        assert_eq!(Date::from_wire(0).unwrap(), epoch);
        assert_eq!(Date::new(1900, 1, 1).unwrap().to_wire(), 15_020);
    }

    #[test]
    fn test_wire_date_out_of_range_reports_wire_value() {
        for wire in [i32::MIN, i32::MIN + 1, i32::MAX, -700_000] {
            let expected = format!("wire date {wire}");
            assert!(
                matches!(Date::from_wire(wire), Err(TypeError::InvalidDateTime(ref m)) if *m == expected),
                "wire {wire}"
            );
        }
        assert!(matches!(
            Timestamp::from_wire(i32::MIN, 0),
            Err(TypeError::InvalidDateTime(ref m)) if m == "wire date -2147483648"
        ));
    }

    #[test]
    fn test_time_components() {
        let t = Time::new(13, 45, 30, 1234).unwrap();
        assert_eq!(t.hms(), (13, 45, 30, 1234));
        assert_eq!(t.to_string(), "13:45:30.1234");
        assert!(Time::new(24, 0, 0, 0).is_err());
        assert!(Time::new(0, 0, 0, 10_000).is_err());
        assert!(Time::from_ticks(TICKS_PER_DAY).is_err());
    }

    #[test]
    fn test_month_boundaries() {
        let d = Date::new(2024, 2, 10).unwrap();
        assert_eq!(d.start_of_month(), Date::new(2024, 2, 1).unwrap());
        assert_eq!(d.end_of_month(), Date::new(2024, 2, 29).unwrap());
        let dec = Date::new(9999, 12, 5).unwrap();
        assert_eq!(dec.end_of_month().days(), MAX_DATE);
    }

    #[test]
    fn test_chrono_conversions() {
        let ts = Timestamp::from_parts(2001, 9, 9, 1, 46, 40, 5).unwrap();
        let naive: NaiveDateTime = ts.into();
        assert_eq!(naive.to_string(), "2001-09-09 01:46:40.000500");
        assert_eq!(Timestamp::try_from(naive).unwrap(), ts);
    }

    #[test]
    fn test_timestamp_from_date_is_midnight() {
        let ts = Timestamp::from(Date::new(2000, 1, 1).unwrap());
        assert_eq!(ts.time(), Time::MIDNIGHT);
        assert_eq!(Date::from(ts), Date::new(2000, 1, 1).unwrap());
    }
}

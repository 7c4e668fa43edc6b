//! Day-offset conversions for SAS-encoded dates and date-dimension parts.
//!
//! SAS stores dates as a count of days since 1960-01-01. Arrow's `Date32`
//! counts days since 1970-01-01. Both conversions live here so the epoch
//! arithmetic is in one place.
//!
//! Offsets are handled permissively: a null or NaN offset yields a null
//! date, a fractional offset is floored to the start of its day, and an
//! offset that lands outside chrono's calendar range yields a null date
//! instead of an error.

use chrono::{Datelike, Days, NaiveDate};

pub const SAS_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1960, 1, 1) {
    Some(date) => date,
    None => panic!("invalid SAS epoch"),
};

pub const UNIX_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(date) => date,
    None => panic!("invalid unix epoch"),
};

/// Converts a SAS day offset into a calendar date.
pub fn sas_date(offset: Option<f64>) -> Option<NaiveDate> {
    let offset = offset?;
    if !offset.is_finite() {
        return None;
    }
    // `as` saturates; anything that large is rejected by the checked add.
    add_days(SAS_EPOCH, offset.floor() as i64)
}

pub fn sas_offset(date: NaiveDate) -> i64 {
    date.signed_duration_since(SAS_EPOCH).num_days()
}

pub fn to_unix_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(UNIX_EPOCH).num_days() as i32
}

pub fn from_unix_days(days: i32) -> Option<NaiveDate> {
    add_days(UNIX_EPOCH, i64::from(days))
}

fn add_days(base: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        base.checked_add_days(Days::new(days as u64))
    } else {
        base.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub date: NaiveDate,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// 1 = Sunday through 7 = Saturday.
    pub weekday: u32,
}

impl DateParts {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            date,
            day: date.day(),
            week: date.iso_week().week(),
            month: date.month(),
            year: date.year(),
            weekday: date.weekday().number_from_sunday(),
        }
    }
}

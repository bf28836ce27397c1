// Calendar arithmetic used by the search engine.
//
// Weekdays are numbered from Monday at `0` through Sunday at `6`, and
// "weeks of the month" start on Monday, with week `0` being the (possibly
// partial) week containing the first day of the month. None of the routines
// here know anything about schedules.
//
// Callers must pass a year in jiff's supported range and a month in
// `1..=12`. Candidate sets are validated against their natural domains
// before they ever reach these functions, so that holds for every value the
// engine produces.

use jiff::civil::{self, Date};

/// Returns the number of days in the given month, taking leap years into
/// account.
pub fn days_in_month(year: i16, month: i8) -> i8 {
    civil::date(year, month, 1).days_in_month()
}

/// Returns the weekday (Monday is `0`) of the first day of the given month.
pub fn first_weekday(year: i16, month: i8) -> i8 {
    civil::date(year, month, 1).weekday().to_monday_zero_offset()
}

/// Returns how many times the weekday of `date` occurred in its month before
/// `date`. So the first Tuesday of a month is `0`, the second is `1` and so
/// on.
pub fn ordinal_occurrence_of_weekday(date: Date) -> i8 {
    (date.day() - 1) / 7
}

/// Returns the zero-based, Monday-aligned week of the month that `date`
/// falls in.
pub fn week_of_month(date: Date) -> i8 {
    let offset = first_weekday(date.year(), date.month());
    (date.day() + offset - 1) / 7
}

/// Returns the week of the month containing the last day of the month.
pub fn max_week_of_month(year: i16, month: i8) -> i8 {
    let last = civil::date(year, month, days_in_month(year, month));
    week_of_month(last)
}

/// Returns the day of the month of the `ordinal`-th (zero-based) occurrence
/// of `weekday` in the given month.
///
/// The day returned may be past the end of the month, e.g., there is no
/// fifth Monday in most months. Callers need to check that themselves.
pub fn day_from_weekday_ordinal(
    year: i16,
    month: i8,
    ordinal: i8,
    weekday: i8,
) -> i8 {
    let offset = (weekday - first_weekday(year, month)).rem_euclid(7);
    1 + offset + ordinal * 7
}

/// Returns the day of the month for `weekday` in the given Monday-aligned
/// `week` of the month.
///
/// This returns `None` when the weekday falls before the first day of the
/// month, which can only happen in week `0`. The day returned may also be
/// past the end of the month. That case is left to the caller.
pub fn day_from_weekday_week(
    year: i16,
    month: i8,
    week: i8,
    weekday: i8,
) -> Option<i8> {
    let day = week * 7 + weekday - first_weekday(year, month) + 1;
    if day < 1 { None } else { Some(day) }
}

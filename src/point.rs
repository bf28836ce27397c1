use std::cmp::Ordering;

use jiff::civil::{self, DateTime};

use crate::calendar;

/// The most fields any strategy uses.
const MAX_LEVELS: usize = 6;

/// A single schedule field.
///
/// Every field has a natural domain of values, and a schedule gives each
/// field it uses a set of candidates drawn from that domain.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Field {
    Year,
    Month,
    Day,
    Week,
    Ordinal,
    Weekday,
    Hour,
    Minute,
}

impl Field {
    pub const ALL: &'static [Field] = &[
        Field::Year,
        Field::Month,
        Field::Day,
        Field::Week,
        Field::Ordinal,
        Field::Weekday,
        Field::Hour,
        Field::Minute,
    ];

    /// Returns the lowercase name of this field, as used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Field::Year => "year",
            Field::Month => "month",
            Field::Day => "day",
            Field::Week => "week",
            Field::Ordinal => "ordinal",
            Field::Weekday => "weekday",
            Field::Hour => "hour",
            Field::Minute => "minute",
        }
    }

    /// Returns the smallest value this field may take.
    pub fn min(self) -> i16 {
        match self {
            Field::Year => 0,
            Field::Month | Field::Day => 1,
            Field::Week
            | Field::Ordinal
            | Field::Weekday
            | Field::Hour
            | Field::Minute => 0,
        }
    }

    /// Returns the biggest value this field may take.
    pub fn max(self) -> i16 {
        match self {
            Field::Year => 9999,
            Field::Month => 12,
            Field::Day => 31,
            Field::Week => 5,
            Field::Ordinal => 4,
            Field::Weekday => 6,
            Field::Hour => 23,
            Field::Minute => 59,
        }
    }

    /// Returns the position of this field in `Field::ALL`.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the date part of a schedule is addressed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Strategy {
    /// Year, month and day of the month.
    DayOfMonth,
    /// Year, month, Monday-aligned week of the month and weekday.
    WeekdayInWeek,
    /// Year, month, the nth occurrence of a weekday in the month and the
    /// weekday itself.
    WeekdayOrdinal,
}

impl Strategy {
    /// Returns the fields this strategy searches over, coarsest first.
    pub fn fields(self) -> &'static [Field] {
        use self::Field::*;

        match self {
            Strategy::DayOfMonth => &[Year, Month, Day, Hour, Minute],
            Strategy::WeekdayInWeek => {
                &[Year, Month, Week, Weekday, Hour, Minute]
            }
            Strategy::WeekdayOrdinal => {
                &[Year, Month, Ordinal, Weekday, Hour, Minute]
            }
        }
    }

    /// Returns true when this strategy searches over the given field.
    pub fn uses(self, field: Field) -> bool {
        self.fields().contains(&field)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match *self {
            Strategy::DayOfMonth => "day-of-month",
            Strategy::WeekdayInWeek => "weekday-in-week",
            Strategy::WeekdayOrdinal => "weekday-ordinal",
        };
        f.write_str(name)
    }
}

/// A tentative datetime expressed as one value per field of a strategy.
///
/// Values are stored by level, where level `0` is the year and the last
/// level is the minute. A point need not be a real datetime. For example,
/// February 31 is a perfectly fine point. Use `Point::is_valid_at` to find
/// out whether a prefix of the point describes something that exists.
///
/// Each level also has a "key," which is what the search orders candidates
/// by. It's the value itself everywhere except for the weekday under the
/// weekday-ordinal strategy. There, the key is the number of days from the
/// first of the month to the first occurrence of that weekday, since that
/// is the order in which the weekdays actually happen within one ordinal.
/// Comparing two points key by key is then the same as comparing them in
/// time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Point {
    strategy: Strategy,
    values: [i16; MAX_LEVELS],
}

impl Point {
    /// Splits a datetime into the fields of the given strategy.
    ///
    /// Seconds and anything smaller are dropped.
    pub fn from_datetime(strategy: Strategy, dt: DateTime) -> Point {
        let date = dt.date();
        let weekday = i16::from(date.weekday().to_monday_zero_offset());
        let (first, second) = match strategy {
            Strategy::DayOfMonth => (i16::from(date.day()), 0),
            Strategy::WeekdayInWeek => {
                (i16::from(calendar::week_of_month(date)), weekday)
            }
            Strategy::WeekdayOrdinal => (
                i16::from(calendar::ordinal_occurrence_of_weekday(date)),
                weekday,
            ),
        };
        let (year, month) = (date.year(), i16::from(date.month()));
        let (hour, minute) = (i16::from(dt.hour()), i16::from(dt.minute()));
        let values = match strategy {
            Strategy::DayOfMonth => [year, month, first, hour, minute, 0],
            _ => [year, month, first, second, hour, minute],
        };
        Point { strategy, values }
    }

    /// Returns the strategy this point was split by.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns the number of levels in this point.
    pub fn len(&self) -> usize {
        self.strategy.fields().len()
    }

    /// Returns the field at the given level.
    pub fn field(&self, level: usize) -> Field {
        self.strategy.fields()[level]
    }

    /// Returns the raw value at the given level.
    pub fn get(&self, level: usize) -> i16 {
        self.values[level]
    }

    /// Returns true when the given level is ordered by occurrence within the
    /// month instead of by value.
    pub fn orders_by_occurrence(&self, level: usize) -> bool {
        self.strategy == Strategy::WeekdayOrdinal
            && self.field(level) == Field::Weekday
    }

    /// Returns the search key at the given level.
    pub fn key(&self, level: usize) -> i16 {
        let value = self.values[level];
        if !self.orders_by_occurrence(level) {
            return value;
        }
        match self.first_weekday() {
            Some(first) => (value - first).rem_euclid(7),
            None => value,
        }
    }

    /// Returns the value that corresponds to `key` at the given level.
    ///
    /// This is the inverse of `Point::key`, and only depends on the levels
    /// before `level`.
    pub fn value_for_key(&self, level: usize, key: i16) -> i16 {
        if !self.orders_by_occurrence(level) {
            return key;
        }
        match self.first_weekday() {
            Some(first) => (key + first).rem_euclid(7),
            None => key,
        }
    }

    /// Sets the value at the given level from its search key.
    pub fn set_key(&mut self, level: usize, key: i16) {
        self.values[level] = self.value_for_key(level, key);
    }

    /// Compares the keys of this point with the keys of `other` at every
    /// level up to and including `level`.
    ///
    /// Both points must use the same strategy.
    pub fn cmp_through(&self, other: &Point, level: usize) -> Ordering {
        debug_assert_eq!(self.strategy(), other.strategy());
        for i in 0..=level {
            match self.key(i).cmp(&other.key(i)) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }

    /// Returns true when the value at `level` is meaningful given the values
    /// at every coarser level.
    ///
    /// This assumes every coarser level is itself valid. In particular, the
    /// year and month are assumed to exist by the time any finer level is
    /// checked.
    pub fn is_valid_at(&self, level: usize) -> bool {
        let field = self.field(level);
        let value = self.values[level];
        if value < field.min() {
            return false;
        }
        match (self.strategy, field) {
            (Strategy::DayOfMonth, Field::Day) => self.day().is_some(),
            (Strategy::WeekdayInWeek, Field::Week) => {
                self.year_month().is_some_and(|(year, month)| {
                    let max = calendar::max_week_of_month(year, month);
                    value <= i16::from(max)
                })
            }
            (Strategy::WeekdayOrdinal, Field::Ordinal) => {
                // The first occurrence of any weekday is at most on the 7th,
                // so this is whether some weekday has this many occurrences.
                self.days_in_month().is_some_and(|days| 7 * value + 1 <= days)
            }
            (_, Field::Weekday) => self.day().is_some(),
            (_, Field::Month) => value <= 12,
            _ => true,
        }
    }

    /// Returns the day of the month this point refers to, if it refers to a
    /// day that exists.
    pub fn day(&self) -> Option<i8> {
        let (year, month) = self.year_month()?;
        let days = calendar::days_in_month(year, month);
        let day = match self.strategy {
            Strategy::DayOfMonth => i8::try_from(self.values[2]).ok()?,
            Strategy::WeekdayInWeek => {
                let week = i8::try_from(self.values[2]).ok()?;
                let weekday = self.weekday()?;
                calendar::day_from_weekday_week(year, month, week, weekday)?
            }
            Strategy::WeekdayOrdinal => {
                let ordinal = i8::try_from(self.values[2]).ok()?;
                let weekday = self.weekday()?;
                calendar::day_from_weekday_ordinal(
                    year, month, ordinal, weekday,
                )
            }
        };
        if (1..=days).contains(&day) { Some(day) } else { None }
    }

    /// Converts this point to a civil datetime, if it describes one.
    pub fn datetime(&self) -> Option<DateTime> {
        let (year, month) = self.year_month()?;
        let day = self.day()?;
        let n = self.len();
        let hour = i8::try_from(self.values[n - 2]).ok()?;
        let minute = i8::try_from(self.values[n - 1]).ok()?;
        DateTime::new(year, month, day, hour, minute, 0, 0).ok()
    }

    fn year_month(&self) -> Option<(i16, i8)> {
        let year = self.values[0];
        let month = i8::try_from(self.values[1]).ok()?;
        // Only proceed when jiff can represent the first of the month.
        civil::Date::new(year, month, 1).ok()?;
        Some((year, month))
    }

    fn days_in_month(&self) -> Option<i16> {
        let (year, month) = self.year_month()?;
        Some(i16::from(calendar::days_in_month(year, month)))
    }

    fn first_weekday(&self) -> Option<i16> {
        let (year, month) = self.year_month()?;
        Some(i16::from(calendar::first_weekday(year, month)))
    }

    fn weekday(&self) -> Option<i8> {
        let weekday = i8::try_from(self.values[3]).ok()?;
        if (0..=6).contains(&weekday) { Some(weekday) } else { None }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (level, field) in self.strategy.fields().iter().enumerate() {
            if level > 0 {
                write!(f, " ")?;
            }
            write!(f, "{field}={}", self.values[level])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    fn point(strategy: Strategy, values: &[i16]) -> Point {
        let mut p = Point { strategy, values: [0; MAX_LEVELS] };
        p.values[..values.len()].copy_from_slice(values);
        p
    }

    #[test]
    fn split_datetime() {
        let dt = date(2016, 11, 17).at(23, 45, 59, 0);
        insta::assert_snapshot!(
            Point::from_datetime(Strategy::DayOfMonth, dt),
            @"year=2016 month=11 day=17 hour=23 minute=45",
        );
        insta::assert_snapshot!(
            Point::from_datetime(Strategy::WeekdayInWeek, dt),
            @"year=2016 month=11 week=2 weekday=3 hour=23 minute=45",
        );
        insta::assert_snapshot!(
            Point::from_datetime(Strategy::WeekdayOrdinal, dt),
            @"year=2016 month=11 ordinal=2 weekday=3 hour=23 minute=45",
        );
    }

    #[test]
    fn round_trip_through_datetime() {
        let strategies = [
            Strategy::DayOfMonth,
            Strategy::WeekdayInWeek,
            Strategy::WeekdayOrdinal,
        ];
        let mut d = date(2016, 1, 1);
        while d < date(2017, 3, 1) {
            let dt = d.at(7, 30, 0, 0);
            for strategy in strategies {
                let p = Point::from_datetime(strategy, dt);
                assert_eq!(p.datetime(), Some(dt), "{strategy} for {dt}");
                for level in 0..p.len() {
                    assert!(p.is_valid_at(level), "{p} at level {level}");
                }
            }
            d = d.tomorrow().unwrap();
        }
    }

    #[test]
    fn occurrence_keys() {
        // November 2016 starts on a Tuesday.
        let mut p = point(Strategy::WeekdayOrdinal, &[2016, 11, 0, 1, 0, 0]);
        assert!(p.orders_by_occurrence(3));
        assert_eq!(p.key(3), 0);
        p.set_key(3, 6);
        // Monday is the last weekday to show up in the first seven days.
        assert_eq!(p.get(3), 0);
        assert_eq!(p.key(3), 6);

        let p = point(Strategy::WeekdayInWeek, &[2016, 11, 0, 1, 0, 0]);
        assert!(!p.orders_by_occurrence(3));
        assert_eq!(p.key(3), 1);
    }

    /// Key order and chronological order agree, even for ordinals where the
    /// weekday values are out of order.
    #[test]
    fn keys_are_chronological() {
        let strategy = Strategy::WeekdayOrdinal;
        let mut d = date(2016, 11, 1);
        let mut prev = Point::from_datetime(strategy, d.at(0, 0, 0, 0));
        while d < date(2017, 2, 1) {
            d = d.tomorrow().unwrap();
            let p = Point::from_datetime(strategy, d.at(0, 0, 0, 0));
            assert_eq!(p.cmp_through(&prev, 5), Ordering::Greater, "{d}");
            prev = p;
        }
    }

    #[test]
    fn validity() {
        let p = point(Strategy::DayOfMonth, &[2015, 2, 29, 0, 0]);
        assert!(p.is_valid_at(1));
        assert!(!p.is_valid_at(2));
        assert_eq!(p.datetime(), None);

        let p = point(Strategy::DayOfMonth, &[2016, 2, 29, 0, 0]);
        assert!(p.is_valid_at(2));

        let p = point(Strategy::DayOfMonth, &[2016, 0, 1, 0, 0]);
        assert!(!p.is_valid_at(1));

        // There's no Monday in the first week of November 2016.
        let p = point(Strategy::WeekdayInWeek, &[2016, 11, 0, 0, 0, 0]);
        assert!(p.is_valid_at(2));
        assert!(!p.is_valid_at(3));
        // Nor is there a sixth week.
        let p = point(Strategy::WeekdayInWeek, &[2016, 11, 5, 0, 0, 0]);
        assert!(!p.is_valid_at(2));
        // Thursday of week 4 would be November 31.
        let p = point(Strategy::WeekdayInWeek, &[2016, 11, 4, 3, 0, 0]);
        assert!(p.is_valid_at(2));
        assert!(!p.is_valid_at(3));

        // A fifth Wednesday exists in November 2016, a fifth Thursday
        // doesn't.
        let p = point(Strategy::WeekdayOrdinal, &[2016, 11, 4, 2, 0, 0]);
        assert!(p.is_valid_at(2));
        assert!(p.is_valid_at(3));
        let p = point(Strategy::WeekdayOrdinal, &[2016, 11, 4, 3, 0, 0]);
        assert!(!p.is_valid_at(3));
        // No weekday occurs five times in a 28 day February.
        let p = point(Strategy::WeekdayOrdinal, &[2015, 2, 4, 0, 0, 0]);
        assert!(!p.is_valid_at(2));
    }

    #[test]
    fn compare_prefixes() {
        let a = point(Strategy::DayOfMonth, &[2016, 11, 10, 23, 0]);
        let b = point(Strategy::DayOfMonth, &[2016, 11, 12, 3, 0]);
        assert_eq!(a.cmp_through(&b, 1), Ordering::Equal);
        assert_eq!(a.cmp_through(&b, 2), Ordering::Less);
        assert_eq!(b.cmp_through(&a, 4), Ordering::Greater);
    }
}

use {
    anyhow::Context,
    bstr::ByteSlice,
    jiff::{civil, fmt},
};

use crate::{
    args::Usage,
    candidates::Candidates,
    parse::FromBytes,
    point::Field,
};

/// Provides parsing for the set of formats occurrences can be printed in.
#[derive(Clone, Debug, Default)]
pub enum Format {
    /// Formats as an ISO 8601 civil datetime, e.g., `2016-11-10T23:00:00`.
    #[default]
    Iso,
    /// Formats via the `strftime` function.
    Strtime(Box<str>),
}

impl Format {
    pub const USAGE: Usage = Usage::flag(
        "-f, --format <kind>",
        "Print occurrences in this format.",
        r#"
Print occurrences in this format.

The legal values for this flag are `iso` (default) or a `strftime`-style
string.

The `iso` format prints a civil datetime, e.g., `2016-11-10T23:00:00`.
Occurrences never have a time zone, since schedules are evaluated in civil
time.

Otherwise, an `strftime`-style format string may be given. For example, the
format string `%A, %B %-d at %H:%M` would print `Thursday, November 10 at
23:00`. Directives that need a time zone or offset, like `%Z` or `%z`, result
in an error.
"#,
    );

    /// Formats the given occurrence according to this format.
    pub fn format(&self, dt: civil::DateTime) -> anyhow::Result<String> {
        match *self {
            Format::Iso => Ok(dt.to_string()),
            Format::Strtime(ref fmt) => fmt::strtime::format(&**fmt, dt)
                .with_context(|| {
                    format!("failed to format `{dt}` with `{fmt}`")
                }),
        }
    }
}

impl std::str::FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Format> {
        Ok(match s {
            "iso" => Format::Iso,
            unk => {
                if unk.contains('%') {
                    Format::Strtime(unk.into())
                } else {
                    anyhow::bail!("unrecognized format `{}`", unk)
                }
            }
        })
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Format::Iso => write!(f, "iso"),
            Format::Strtime(ref fmt) => write!(f, "`{fmt}`"),
        }
    }
}

/// Provides parsing for the English name of a month.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Month(i8);

impl Month {
    /// Return the parsed month as an integer in the range `1..=12`.
    pub fn get(&self) -> i8 {
        self.0
    }
}

impl From<Month> for i16 {
    fn from(month: Month) -> i16 {
        i16::from(month.get())
    }
}

impl std::str::FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Month> {
        if s.chars().all(|c| c.is_ascii_digit()) {
            let month = s.parse::<i8>().with_context(|| {
                format!("failed to parse `{s}` as an integer month")
            })?;
            anyhow::ensure!(
                1 <= month && month <= 12,
                "parsed `{month}` as an integer month, but it's not \
                 in the required range of `1..=12`",
            );
            return Ok(Month(month));
        }
        let month = match &*s.to_lowercase() {
            "january" | "jan" => 1,
            "february" | "feb" => 2,
            "march" | "mar" => 3,
            "april" | "apr" => 4,
            "may" => 5,
            "june" | "jun" => 6,
            "july" | "jul" => 7,
            "august" | "aug" => 8,
            "september" | "sept" | "sep" => 9,
            "october" | "oct" => 10,
            "november" | "nov" => 11,
            "december" | "dec" => 12,
            unk => anyhow::bail!("unrecognized month name/number: `{unk}`"),
        };
        Ok(Month(month))
    }
}

/// Provides parsing for Jiff's civil `Weekday` type.
///
/// Weekdays may be given by name, or as an integer where Monday is `0` and
/// Sunday is `6`.
#[derive(Clone, Copy, Debug)]
pub struct Weekday {
    weekday: civil::Weekday,
}

impl Weekday {
    /// Return the parsed weekday.
    pub fn get(&self) -> civil::Weekday {
        self.weekday
    }
}

impl From<Weekday> for i16 {
    fn from(weekday: Weekday) -> i16 {
        i16::from(weekday.get().to_monday_zero_offset())
    }
}

impl std::str::FromStr for Weekday {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Weekday> {
        Weekday::from_bytes(s.as_bytes())
    }
}

impl FromBytes for Weekday {
    type Err = anyhow::Error;

    fn from_bytes(s: &[u8]) -> anyhow::Result<Weekday> {
        use jiff::civil::Weekday::*;

        if !s.is_empty() && s.iter().all(|b| b.is_ascii_digit()) {
            let n = s.to_str()?.parse::<i8>().with_context(|| {
                format!(
                    "failed to parse `{s}` as an integer weekday",
                    s = s.as_bstr(),
                )
            })?;
            let weekday =
                civil::Weekday::from_monday_zero_offset(n).map_err(|_| {
                    anyhow::anyhow!(
                        "parsed `{n}` as an integer weekday, but it's not \
                         in the required range of `0..=6` (Monday is `0`)",
                    )
                })?;
            return Ok(Weekday { weekday });
        }
        let weekday = match &*s.to_ascii_lowercase() {
            b"sunday" | b"sun" | b"su" => Sunday,
            b"monday" | b"mon" | b"mo" => Monday,
            b"tuesday" | b"tues" | b"tue" | b"tu" => Tuesday,
            b"wednesday" | b"wed" | b"we" => Wednesday,
            b"thursday" | b"thurs" | b"thu" | b"th" => Thursday,
            b"friday" | b"fri" | b"fr" => Friday,
            b"saturday" | b"sat" | b"sa" => Saturday,
            unk => anyhow::bail!(
                "unrecognized weekday: `{unk}`",
                unk = unk.as_bstr()
            ),
        };
        Ok(Weekday { weekday })
    }
}

/// A scrappy comma delimited sequence of values.
///
/// This type doesn't have any requirements on `T` other than that it can be
/// parsed. It also requires that `,` cannot appear within the parse format of
/// `T` (since this will try to split the sequence on `,`). That is, there's no
/// support for quoting or escaping the commas.
///
/// This does not impose any requirements on the order of the sequence. It does
/// require that the sequence is not empty though.
#[derive(Clone, Debug)]
pub struct CommaSequence<T>(Vec<T>);

impl<T> CommaSequence<T> {
    /// Returns an iterator over every item in this sequence.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T, E> std::str::FromStr for CommaSequence<T>
where
    T: std::str::FromStr<Err = E>,
    E: std::fmt::Display,
{
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<CommaSequence<T>> {
        let mut seq = vec![];
        for item in s.split(",") {
            seq.push(item.parse::<T>().map_err(|err| {
                anyhow::Error::msg(format!(
                    "failed to parse `{item}` \
                     within sequence `{s}`: {err:#}",
                ))
            })?);
        }
        anyhow::ensure!(!seq.is_empty(), "empty sequences are not allowed");
        Ok(CommaSequence(seq))
    }
}

/// An inclusive range of field values with an optional step.
///
/// The format is `start[..end][/step]` or `*[/step]`, where `start` and
/// `end` are parsed as `T`. A `*` stands for the entire domain of whichever
/// field the range is used for. A step requires a range, so `5/2` is an
/// error.
///
/// `T` is anything that can be converted to a field value. For example,
/// integers, months or weekdays. It's required that `..` and `/` cannot
/// appear within the parse format of `T`.
///
/// If `start > end`, then the parser will return an error.
#[derive(Clone, Copy, Debug)]
pub struct ValueRange<T> {
    /// The inclusive bounds of this range, or `None` for `*`.
    bounds: Option<(T, T)>,
    /// Always greater than or equal to `1`.
    step: i16,
    /// True when this was written as a single value.
    single: bool,
}

impl<T: Copy + Into<i16>> ValueRange<T> {
    /// Returns this range as a progression over the given field.
    pub fn progression(&self, field: Field) -> Candidates {
        let (start, end) = match self.bounds {
            None => (field.min(), field.max()),
            Some((start, end)) => (start.into(), end.into()),
        };
        Candidates::progression(start, end.saturating_add(1), self.step)
    }

    /// Returns true when this range was written as a single value.
    pub fn is_single(&self) -> bool {
        self.single
    }
}

/// Converts every range given for a field into its candidate set.
///
/// Exactly one range (or `*`) becomes an arithmetic progression. Anything
/// else is expanded into an explicit set. When there are no ranges at all,
/// `None` is returned.
pub fn to_candidates<'a, T: Copy + Into<i16> + 'a>(
    field: Field,
    ranges: impl IntoIterator<Item = &'a ValueRange<T>>,
) -> Option<Candidates> {
    let ranges: Vec<&ValueRange<T>> = ranges.into_iter().collect();
    match *ranges.as_slice() {
        [] => None,
        [range] if !range.is_single() => Some(range.progression(field)),
        _ => Some(Candidates::explicit(ranges.iter().flat_map(|range| {
            range.progression(field).iter().collect::<Vec<i16>>()
        }))),
    }
}

impl<T, E> std::str::FromStr for ValueRange<T>
where
    T: std::str::FromStr<Err = E> + Copy + Into<i16>,
    Result<T, E>: Context<T, E>,
{
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<ValueRange<T>> {
        let (range, step) = match s.split_once('/') {
            None => (s, None),
            Some((range, step)) => {
                let step = step.parse::<i16>().with_context(|| {
                    format!("failed to parse step `{step}` within `{s}`")
                })?;
                anyhow::ensure!(
                    step >= 1,
                    "step `{step}` in `{s}` must be \
                     greater than or equal to 1",
                );
                (range, Some(step))
            }
        };
        if range == "*" {
            let step = step.unwrap_or(1);
            return Ok(ValueRange { bounds: None, step, single: false });
        }
        let Some((start, end)) = range.split_once("..") else {
            anyhow::ensure!(
                step.is_none(),
                "a step requires a range, but `{range}` is a single value",
            );
            let value = range.parse::<T>().with_context(|| {
                format!("failed to parse `{range}` as a single value")
            })?;
            let bounds = Some((value, value));
            return Ok(ValueRange { bounds, step: 1, single: true });
        };
        let start = start.parse::<T>().with_context(|| {
            format!("failed to parse `{start}` within the range `{s}`")
        })?;
        let end = end.parse::<T>().with_context(|| {
            format!("failed to parse `{end}` within the range `{s}`")
        })?;
        anyhow::ensure!(
            start.into() <= end.into(),
            "parsed ranges must have start <= end, but \
             `{s}` has start > end",
        );
        let step = step.unwrap_or(1);
        Ok(ValueRange { bounds: Some((start, end)), step, single: false })
    }
}

use {
    anyhow::Context,
    bstr::{BStr, ByteSlice},
    jiff::{Span, Zoned, civil, fmt, tz},
};

use crate::{
    NOW,
    args::Usage,
    parse::{BytesExt, FromBytes},
};

static TEMPORAL_PARSER: fmt::temporal::DateTimeParser =
    fmt::temporal::DateTimeParser::new();
static RFC2822_PARSER: fmt::rfc2822::DateTimeParser =
    fmt::rfc2822::DateTimeParser::new();
static FRIENDLY_SPAN_PARSER: fmt::friendly::SpanParser =
    fmt::friendly::SpanParser::new();
static TEMPORAL_SPAN_PARSER: fmt::temporal::SpanParser =
    fmt::temporal::SpanParser::new();

/// The datetime that a search for an occurrence starts from.
///
/// Schedules are civil, so a reference is too. Anything that refers to an
/// instant, like an RFC 3339 timestamp, is first converted to local time in
/// the system's configured time zone (which may be overridden by the `TZ`
/// environment variable).
///
/// A reference is always truncated to the minute.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Reference {
    dt: civil::DateTime,
}

impl Reference {
    pub const ARG: Usage = Usage::arg(
        "<datetime>",
        "A reference datetime, e.g., `now`, `-1d` or `2016-11-08T23:00`.",
        r#"
A reference datetime to search from.

Any number of references may be given. Each one is searched independently and
its occurrences are printed in the order the references were given. When no
references are given, the current time is used. When `-` is given, references
are read from stdin, one per line.

A reference is a civil datetime. Seconds and anything smaller are always
dropped. The following formats are accepted:

A subset of ISO 8601, e.g., `2016-11-08T23:00`, `2016-11-08 23:00:45` or just
`2016-11-08`. When a time is missing, midnight is used.

RFC 3339 or RFC 2822, e.g., `2016-11-08T23:00:00-05:00`. The instant is
converted to local time in your system's configured time zone (which may be
overridden by the `TZ` environment variable).

RFC 9557, e.g., `2016-11-08T23:00:00-05:00[America/New_York]`. The civil
datetime is used as written.

A clock time, e.g., `17:30` or `5pm`, which refers to that time on the current
day.

A duration from the current time, e.g., `1 day`, `1d`, `-3h`, `1 week ago` or
`P1D`.

`now` refers to the current time. The current time is computed once when
Cadence starts, or if the `CADENCE_NOW` environment variable is set, that time
is used instead.

`today`, `yesterday` and `tomorrow` refer to midnight on the corresponding day.
"#,
    );

    /// Returns the current time as a reference.
    pub fn now() -> Reference {
        Reference::from(NOW.datetime())
    }

    /// Returns the civil datetime of this reference.
    pub fn get(&self) -> civil::DateTime {
        self.dt
    }

    /// Parses a reference, resolving anything relative (like `now` or
    /// `-1d`) against the zoned datetime given.
    ///
    /// Instants are converted to civil time in `relative`'s time zone.
    pub fn parse_relative(
        relative: &Zoned,
        s: &[u8],
    ) -> anyhow::Result<Reference> {
        // We keep this error around in case we later find a time zone
        // annotation, which means the failure was for an interesting
        // reason, like an invalid time zone name.
        let temporal_parse_err = match TEMPORAL_PARSER.parse_zoned(s) {
            Err(err) => err,
            Ok(zdt) => return Ok(Reference::from(zdt.datetime())),
        };
        if let Ok(pieces) = fmt::temporal::Pieces::parse(s) {
            if pieces.time_zone_annotation().is_some() {
                return Err(temporal_parse_err.into());
            }
            let date = pieces.date();
            let time = pieces.time().unwrap_or(civil::Time::midnight());
            let dt = date.to_datetime(time);
            let tz = match pieces.offset() {
                None => return Ok(Reference::from(dt)),
                Some(fmt::temporal::PiecesOffset::Zulu) => tz::TimeZone::UTC,
                Some(fmt::temporal::PiecesOffset::Numeric(ref off)) => {
                    tz::TimeZone::fixed(off.offset())
                }
                Some(unk) => {
                    anyhow::bail!("unrecognized parsed offset: {unk:?}")
                }
            };
            let zdt = dt.to_zoned(tz)?;
            return Ok(Reference::localize(relative, &zdt));
        }
        // N.B. This also includes RFC 9110.
        if let Ok(zdt) = RFC2822_PARSER.parse_zoned(s) {
            return Ok(Reference::localize(relative, &zdt));
        }
        if let Some(dt) = parse_relative(relative, s.as_bstr())? {
            return Ok(Reference::from(dt));
        }
        anyhow::bail!("unrecognized datetime `{s}`", s = BStr::new(s))
    }

    /// Converts the instant of `zdt` to a civil reference in the time zone
    /// of `relative`.
    fn localize(relative: &Zoned, zdt: &Zoned) -> Reference {
        let local = zdt.with_time_zone(relative.time_zone().clone());
        Reference::from(local.datetime())
    }
}

impl From<civil::DateTime> for Reference {
    fn from(dt: civil::DateTime) -> Reference {
        let time = civil::time(dt.hour(), dt.minute(), 0, 0);
        Reference { dt: dt.date().to_datetime(time) }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.dt, f)
    }
}

impl std::str::FromStr for Reference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Reference> {
        s.as_bytes().parse()
    }
}

impl FromBytes for Reference {
    type Err = anyhow::Error;

    fn from_bytes(s: &[u8]) -> anyhow::Result<Reference> {
        Reference::parse_relative(&NOW, s)
    }
}

/// Tries to parse a datetime in `s` relative to the one given.
///
/// If one could not be found, then `None` is returned. If one is definitively
/// found, but it could not be computed (because it overflows, say), then an
/// error is returned.
fn parse_relative(
    relative: &Zoned,
    s: &BStr,
) -> anyhow::Result<Option<civil::DateTime>> {
    let date = relative.date();
    let midnight = |d: civil::Date| d.to_datetime(civil::Time::midnight());
    match &**s {
        b"now" => return Ok(Some(relative.datetime())),
        b"today" => return Ok(Some(midnight(date))),
        b"yesterday" => return Ok(Some(midnight(date.yesterday()?))),
        b"tomorrow" => return Ok(Some(midnight(date.tomorrow()?))),
        _ => {}
    }
    // `14:30:00` is also a valid friendly duration, so clock times need to
    // be tried first.
    if let Some(time) = parse_time(s) {
        return Ok(Some(date.to_datetime(time)));
    }
    let Some(span) = parse_span(s) else { return Ok(None) };
    let zdt = relative
        .checked_add(span)
        .with_context(|| format!("failed to add `{span:#}` to `{relative}`"))?;
    Ok(Some(zdt.datetime()))
}

/// Parses one of a variety of different clock times, including am/pm.
fn parse_time(s: &BStr) -> Option<civil::Time> {
    static FORMATS: &[&str] =
        &["%I:%M:%S%P", "%I:%M%P", "%I%P", "%H:%M:%S", "%H:%M"];

    FORMATS.iter().find_map(|fmt| civil::Time::strptime(fmt, s).ok())
}

/// Parses a duration in either the "friendly" format (`1 week ago`, `-3h`)
/// or the ISO 8601 format (`P1D`).
fn parse_span(s: &BStr) -> Option<Span> {
    if let Ok(span) = FRIENDLY_SPAN_PARSER.parse_span(s) {
        return Some(span);
    }
    TEMPORAL_SPAN_PARSER.parse_span(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative() -> Zoned {
        civil::date(2016, 11, 10)
            .at(12, 34, 56, 0)
            .in_tz("America/New_York")
            .unwrap()
    }

    fn parse(s: &str) -> String {
        Reference::parse_relative(&relative(), s.as_bytes())
            .unwrap()
            .to_string()
    }

    fn parse_err(s: &str) -> String {
        let err =
            Reference::parse_relative(&relative(), s.as_bytes()).unwrap_err();
        format!("{err:#}")
    }

    #[test]
    fn civil() {
        insta::assert_snapshot!(
            parse("2016-11-08T23:00"),
            @"2016-11-08T23:00:00",
        );
        insta::assert_snapshot!(
            parse("2016-11-08T23:00:45.5"),
            @"2016-11-08T23:00:00",
        );
        insta::assert_snapshot!(
            parse("2016-11-08 23:00"),
            @"2016-11-08T23:00:00",
        );
        insta::assert_snapshot!(parse("2016-11-08"), @"2016-11-08T00:00:00");
    }

    #[test]
    fn instants_are_localized() {
        insta::assert_snapshot!(
            parse("2016-11-08T23:00:00Z"),
            @"2016-11-08T18:00:00",
        );
        insta::assert_snapshot!(
            parse("2016-11-08T23:00:00+01:00"),
            @"2016-11-08T17:00:00",
        );
        insta::assert_snapshot!(
            parse("2016-11-08T23:00:00-00:00"),
            @"2016-11-08T18:00:00",
        );
        insta::assert_snapshot!(
            parse("Tue, 08 Nov 2016 23:00:00 +0000"),
            @"2016-11-08T18:00:00",
        );
        // The civil datetime of a zoned datetime is used as written.
        insta::assert_snapshot!(
            parse("2016-11-08T23:00:00+09:00[Asia/Tokyo]"),
            @"2016-11-08T23:00:00",
        );
    }

    #[test]
    fn relative_to_now() {
        insta::assert_snapshot!(parse("now"), @"2016-11-10T12:34:00");
        insta::assert_snapshot!(parse("today"), @"2016-11-10T00:00:00");
        insta::assert_snapshot!(parse("yesterday"), @"2016-11-09T00:00:00");
        insta::assert_snapshot!(parse("tomorrow"), @"2016-11-11T00:00:00");
        insta::assert_snapshot!(parse("17:30"), @"2016-11-10T17:30:00");
        insta::assert_snapshot!(parse("5pm"), @"2016-11-10T17:00:00");
        insta::assert_snapshot!(parse("1d"), @"2016-11-11T12:34:00");
        insta::assert_snapshot!(parse("-2h"), @"2016-11-10T10:34:00");
        insta::assert_snapshot!(parse("1 week ago"), @"2016-11-03T12:34:00");
        insta::assert_snapshot!(parse("P1D"), @"2016-11-11T12:34:00");
    }

    #[test]
    fn unrecognized() {
        insta::assert_snapshot!(
            parse_err("next full moon"),
            @"unrecognized datetime `next full moon`",
        );
        let err = parse_err("2016-11-08T23:00:00+09:00[Mars/Olympus_Mons]");
        assert!(err.contains("Mars/Olympus_Mons"), "{err}");
    }
}

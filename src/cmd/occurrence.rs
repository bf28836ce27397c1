use std::{io::Write, process::ExitCode};

use crate::{
    args::{
        self, Usage,
        flags::{self, CommaSequence, Month, ValueRange, Weekday},
        positional,
    },
    candidates::Candidates,
    datetime::Reference,
    point::Field,
    schedule::{Direction, Schedule},
    style::Theme,
};

const USAGE_NEXT: &'static str = r#"
Print the next occurrences of a recurring schedule.

A schedule is given as a set of candidate values for each of its fields, in
the style of cron. Any field that isn't given allows every value. This prints
the earliest occurrence at or after each reference datetime. References are
inclusive, so a reference that is itself an occurrence is printed.

This accepts zero or more reference datetimes as positional arguments. When
none are given, the current time is used. When `-` is given, references are
read from stdin, one per line.

If any reference has no occurrence at all, a notice is printed to stderr and
the exit code is 1. Errors result in an exit code of 2.

USAGE:
    cadence next [<flags>] [<datetime>...]
    cadence next [<flags>] - < line delimited <datetime>

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Print when the next 9:30am is:

        $ cadence next -H 9 -M 30
        2016-11-09T09:30:00

    %snip-start%

    Print the next five weekdays at 9am, starting from a particular datetime:

        $ cadence next -w mon..fri -H 9 -M 0 -c 5 2016-11-10T12:00
        2016-11-11T09:00:00
        2016-11-14T09:00:00
        2016-11-15T09:00:00
        2016-11-16T09:00:00
        2016-11-17T09:00:00

    Print noon on the next three Thanksgivings in the United States, that is,
    the fourth Thursday in November. Note that `-n/--nth` starts counting at
    zero:

        $ cadence next -w thu -n 3 -m nov -H 12 -M 0 -c 3 2016-01-01
        2016-11-24T12:00:00
        2017-11-23T12:00:00
        2018-11-22T12:00:00

    Print every sixth hour, on the hour, as JSON:

        $ cadence next -H '*/6' -M 0 -c 2 -j 2016-11-08T23:00
        {"reference":"2016-11-08T23:00:00","occurrences":["2016-11-09T00:00:00","2016-11-09T06:00:00"]}

    Schedules that can never occur on a real calendar, like February 31, are
    reported as an error once the search gives up:

        $ cadence next -m feb -d 31
        searching forward from 2016-11-08T23:17:00 did not converge within 100 iterations

    %snip-end%
REQUIRED ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

const USAGE_PREV: &'static str = r#"
Print the previous occurrences of a recurring schedule.

A schedule is given as a set of candidate values for each of its fields, in
the style of cron. Any field that isn't given allows every value. This prints
the latest occurrence at or before each reference datetime. References are
inclusive, so a reference that is itself an occurrence is printed.

When more than one occurrence is requested with `-c/--count`, they are printed
in reverse chronological order.

This accepts zero or more reference datetimes as positional arguments. When
none are given, the current time is used. When `-` is given, references are
read from stdin, one per line.

If any reference has no occurrence at all, a notice is printed to stderr and
the exit code is 1. Errors result in an exit code of 2.

USAGE:
    cadence prev [<flags>] [<datetime>...]
    cadence prev [<flags>] - < line delimited <datetime>

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Print when the last 9:30am was:

        $ cadence prev -H 9 -M 30
        2016-11-08T09:30:00

    %snip-start%

    Print 5pm on the last three first Fridays of the month:

        $ cadence prev -w fri -n 0 -H 17 -M 0 -c 3
        2016-11-04T17:00:00
        2016-10-07T17:00:00
        2016-09-02T17:00:00

    Print the most recent leap day:

        $ cadence prev -m feb -d 29 -H 12 -M 0 2019-01-01
        2016-02-29T12:00:00

    %snip-end%
REQUIRED ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

pub fn next(p: &mut lexopt::Parser) -> anyhow::Result<ExitCode> {
    run(p, USAGE_NEXT, Direction::Forward)
}

pub fn prev(p: &mut lexopt::Parser) -> anyhow::Result<ExitCode> {
    run(p, USAGE_PREV, Direction::Backward)
}

fn run(
    p: &mut lexopt::Parser,
    usage: &str,
    direction: Direction,
) -> anyhow::Result<ExitCode> {
    let mut schedule = ScheduleFlags::default();
    let mut output = Output::default();
    let mut references = positional::References::default();
    args::configure(
        p,
        usage,
        &mut [&mut schedule, &mut output, &mut references],
    )?;

    let schedule = schedule.build()?;
    log::debug!(
        "searching {direction} using the {strategy} strategy, with at most \
         {max} iterations per search",
        strategy = schedule.strategy(),
        max = schedule.max_iterations(),
    );
    let mut wtr = std::io::stdout().lock();
    let mut missing = 0;
    references.try_map(|reference| {
        let found = output.write(&mut wtr, &schedule, reference, direction)?;
        if found == 0 {
            missing += 1;
            let bound = match direction {
                Direction::Forward => "at or after",
                Direction::Backward => "at or before",
            };
            let mut stderr = std::io::stderr().lock();
            writeln!(
                stderr,
                "{}",
                Theme::stderr()
                    .notice(format!("no occurrence {bound} {reference}")),
            )?;
        }
        Ok(true)
    })?;
    if missing > 0 {
        log::debug!("{missing} reference(s) had no occurrence");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// The flags that describe a schedule.
///
/// Every flag may be given more than once, in which case, all of the values
/// are combined.
#[derive(Debug, Default)]
struct ScheduleFlags {
    minute: Vec<CommaSequence<ValueRange<i16>>>,
    hour: Vec<CommaSequence<ValueRange<i16>>>,
    day: Vec<CommaSequence<ValueRange<i16>>>,
    weekday: Vec<CommaSequence<ValueRange<Weekday>>>,
    nth: Vec<CommaSequence<ValueRange<i16>>>,
    week: Vec<CommaSequence<ValueRange<i16>>>,
    month: Vec<CommaSequence<ValueRange<Month>>>,
    year: Vec<CommaSequence<ValueRange<i16>>>,
    max_iterations: Option<usize>,
}

impl ScheduleFlags {
    /// Builds a schedule from the flags given.
    fn build(&self) -> anyhow::Result<Schedule> {
        let mut builder = Schedule::builder();
        if let Some(set) = candidates(Field::Year, &self.year) {
            builder.years(set);
        }
        if let Some(set) = candidates(Field::Month, &self.month) {
            builder.months(set);
        }
        if let Some(set) = candidates(Field::Day, &self.day) {
            builder.days(set);
        }
        if let Some(set) = candidates(Field::Week, &self.week) {
            builder.weeks(set);
        }
        if let Some(set) = candidates(Field::Ordinal, &self.nth) {
            builder.ordinals(set);
        }
        if let Some(set) = candidates(Field::Weekday, &self.weekday) {
            builder.weekdays(set);
        }
        if let Some(set) = candidates(Field::Hour, &self.hour) {
            builder.hours(set);
        }
        if let Some(set) = candidates(Field::Minute, &self.minute) {
            builder.minutes(set);
        }
        if let Some(max) = self.max_iterations {
            builder.max_iterations(max);
        }
        builder.build()
    }
}

impl args::Configurable for ScheduleFlags {
    fn configure(
        &mut self,
        p: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        use lexopt::Arg::*;

        match *arg {
            Short('M') | Long("minute") => {
                self.minute.push(args::parse(p, "-M/--minute")?);
            }
            Short('H') | Long("hour") => {
                self.hour.push(args::parse(p, "-H/--hour")?);
            }
            Short('d') | Long("day") => {
                self.day.push(args::parse(p, "-d/--day")?);
            }
            Short('w') | Long("weekday") => {
                self.weekday.push(args::parse(p, "-w/--weekday")?);
            }
            Short('n') | Long("nth") => {
                self.nth.push(args::parse(p, "-n/--nth")?);
            }
            Short('W') | Long("week") => {
                self.week.push(args::parse(p, "-W/--week")?);
            }
            Short('m') | Long("month") => {
                self.month.push(args::parse(p, "-m/--month")?);
            }
            Short('y') | Long("year") => {
                self.year.push(args::parse(p, "-y/--year")?);
            }
            Long("max-iterations") => {
                self.max_iterations =
                    Some(args::parse(p, "--max-iterations")?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const MINUTE: Usage = Usage::flag(
            "-M, --minute <minute>",
            "The minutes, from 0 to 59, of each occurrence.",
            r#"
The minutes, from 0 to 59, of each occurrence.

Like every schedule flag, this accepts a comma delimited sequence of items,
where each item is a single value like `30`, an inclusive range like `0..29`,
a range with a step like `0..59/15` or a wildcard for every value, optionally
with a step, like `*` or `*/15`. This flag may be given multiple times, which
is equivalent to joining all of its values with a comma.

A single range or wildcard is searched as an arithmetic progression. Anything
else is searched as an explicit set of values.
"#,
        );
        const HOUR: Usage = Usage::flag(
            "-H, --hour <hour>",
            "The hours, from 0 to 23, of each occurrence.",
            r#"
The hours, from 0 to 23, of each occurrence.

This uses the same syntax as `-M/--minute`, e.g., `9`, `9..17` or `*/6`.
"#,
        );
        const DAY: Usage = Usage::flag(
            "-d, --day <day>",
            "The days of the month, from 1 to 31, of each occurrence.",
            r#"
The days of the month, from 1 to 31, of each occurrence.

This uses the same syntax as `-M/--minute`. Days that don't exist in a
particular month, like February 30, are skipped.

This is ignored (with a warning) when `-w/--weekday` or `-W/--week` is given,
since days are then addressed by their weekday instead.
"#,
        );
        const WEEKDAY: Usage = Usage::flag(
            "-w, --weekday <weekday>",
            "The weekdays of each occurrence.",
            r#"
The weekdays of each occurrence.

This uses the same syntax as `-M/--minute`, but weekdays may also be given by
name. As integers, Monday is 0 and Sunday is 6. Names are case insensitive and
may be abbreviated: Monday, Mon or MO through Sunday, Sun or SU. For example,
`mon..fri` or `sat,sun`.

When given with `-n/--nth`, days are addressed as the nth occurrence of a
weekday in the month. Otherwise, days are addressed as a weekday within a
week of the month (see `-W/--week`).
"#,
        );
        const NTH: Usage = Usage::flag(
            "-n, --nth <ordinal>",
            "Which occurrences, from 0 to 4, of the weekday in the month.",
            r#"
Which occurrences, from 0 to 4, of the weekday in the month.

This uses the same syntax as `-M/--minute`. Counting starts at 0, so `-n 0`
refers to the first occurrence of each weekday in the month and `-n 4` to the
fifth. Months without a fifth occurrence of a weekday are skipped.

This is ignored (with a warning) unless `-w/--weekday` is also given.
"#,
        );
        const WEEK: Usage = Usage::flag(
            "-W, --week <week>",
            "The weeks of the month, from 0 to 5, of each occurrence.",
            r#"
The weeks of the month, from 0 to 5, of each occurrence.

This uses the same syntax as `-M/--minute`. Weeks start on Monday, and week 0
is the week containing the first day of the month. So week 0 may be a partial
week, and a weekday that falls before the first of the month doesn't exist in
it.

This is ignored (with a warning) when `-n/--nth` is also given.
"#,
        );
        const MONTH: Usage = Usage::flag(
            "-m, --month <month>",
            "The months, from 1 to 12, of each occurrence.",
            r#"
The months, from 1 to 12, of each occurrence.

This uses the same syntax as `-M/--minute`, but months may also be given by
name, e.g., `jan`, `February` or `mar..may`.
"#,
        );
        const YEAR: Usage = Usage::flag(
            "-y, --year <year>",
            "The years, from 0 to 9999, of each occurrence.",
            r#"
The years, from 0 to 9999, of each occurrence.

This uses the same syntax as `-M/--minute`, e.g., `2017`, `2016..2020/4`.
When the years given run out, there are no more occurrences.
"#,
        );
        const MAX_ITERATIONS: Usage = Usage::flag(
            "--max-iterations <number>",
            "The maximum number of iterations a single search may take.",
            r#"
The maximum number of iterations a single search may take.

A search that doesn't find an occurrence within this many iterations gives up
with an error. This happens for schedules that can never occur on a real
calendar, like February 31. It can also happen for schedules whose occurrences
are very far apart, in which case, increasing this limit may help. This
defaults to 100 and must be at least 1.
"#,
        );

        &[MINUTE, HOUR, DAY, WEEKDAY, NTH, WEEK, MONTH, YEAR, MAX_ITERATIONS]
    }
}

/// The flags that control how occurrences are printed.
#[derive(Debug)]
struct Output {
    count: usize,
    format: flags::Format,
    json: bool,
}

impl Output {
    /// Writes up to `count` occurrences of `schedule` for `reference`, and
    /// returns how many were found.
    fn write<W: Write>(
        &self,
        mut wtr: W,
        schedule: &Schedule,
        reference: Reference,
        direction: Direction,
    ) -> anyhow::Result<usize> {
        let occurrences =
            schedule.occurrences(reference.get(), direction).take(self.count);
        if !self.json {
            let mut found = 0;
            for dt in occurrences {
                writeln!(wtr, "{}", self.format.format(dt?)?)?;
                found += 1;
            }
            return Ok(found);
        }

        #[derive(serde::Serialize)]
        struct Record {
            reference: String,
            occurrences: Vec<String>,
        }

        let mut record =
            Record { reference: reference.to_string(), occurrences: vec![] };
        for dt in occurrences {
            record.occurrences.push(self.format.format(dt?)?);
        }
        serde_json::to_writer(&mut wtr, &record)?;
        writeln!(wtr)?;
        Ok(record.occurrences.len())
    }
}

impl Default for Output {
    fn default() -> Output {
        Output { count: 1, format: flags::Format::default(), json: false }
    }
}

impl args::Configurable for Output {
    fn configure(
        &mut self,
        p: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        use lexopt::Arg::*;

        match *arg {
            Short('c') | Long("count") => {
                let count: usize = args::parse(p, "-c/--count")?;
                anyhow::ensure!(
                    count >= 1,
                    "-c/--count must be greater than or equal to 1",
                );
                self.count = count;
            }
            Short('f') | Long("format") => {
                self.format = args::parse(p, "-f/--format")?;
            }
            Short('j') | Long("json") => {
                self.json = true;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const COUNT: Usage = Usage::flag(
            "-c, --count <number>",
            "Print this many occurrences for each reference.",
            r#"
Print this many occurrences for each reference.

Successive occurrences are found by searching again from one minute after (or
before) the previous occurrence. Fewer occurrences are printed when the
schedule runs out. This defaults to 1.
"#,
        );
        const JSON: Usage = Usage::flag(
            "-j, --json",
            "Print one JSON object per reference.",
            r#"
Print one JSON object per reference.

Each object has a `reference` key with the reference datetime searched from,
and an `occurrences` key with a list of the occurrences found, formatted
according to `-f/--format`. The list is empty when there are no occurrences.
"#,
        );

        &[COUNT, flags::Format::USAGE, JSON]
    }
}

/// Combines every value given for a field, across all uses of its flag, into
/// a single candidate set.
fn candidates<T: Copy + Into<i16>>(
    field: Field,
    seqs: &[CommaSequence<ValueRange<T>>],
) -> Option<Candidates> {
    flags::to_candidates(field, seqs.iter().flat_map(|seq| seq.iter()))
}

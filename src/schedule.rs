use std::sync::Arc;

use jiff::{ToSpan, civil::DateTime};

use crate::{
    candidates::Candidates,
    point::{Field, Point, Strategy},
};

/// The number of search iterations allowed when none is given explicitly.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// A recurring schedule made up of one candidate set per field.
///
/// A schedule is built with `Schedule::builder`. Once built, it never
/// changes, and it's cheap to clone and share between threads.
///
/// The main operations are `Schedule::next` and `Schedule::previous`, which
/// find the nearest occurrence at or after (or at or before) a reference
/// datetime. Both return `Ok(None)` when the schedule has no occurrences in
/// that direction at all, and an error when the search gives up before
/// deciding either way. In the latter case, the error can be downcast to a
/// `NonConvergent` value.
#[derive(Clone, Debug)]
pub struct Schedule {
    inner: Arc<ScheduleInner>,
}

#[derive(Debug)]
struct ScheduleInner {
    strategy: Strategy,
    /// One candidate set for each field of `strategy`, coarsest first.
    fields: Box<[(Field, Candidates)]>,
    max_iterations: usize,
}

impl Schedule {
    /// Returns a builder for constructing a `Schedule`.
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::new()
    }

    /// Returns the addressing strategy chosen when this schedule was built.
    pub fn strategy(&self) -> Strategy {
        self.inner.strategy
    }

    /// Returns the number of iterations a single search may take.
    pub fn max_iterations(&self) -> usize {
        self.inner.max_iterations
    }

    /// Returns the earliest occurrence at or after `reference`.
    ///
    /// Seconds and sub-seconds of `reference` are ignored. So if `reference`
    /// is `10:30:45` and the schedule matches `10:30`, then `10:30` is
    /// returned.
    pub fn next(
        &self,
        reference: DateTime,
    ) -> anyhow::Result<Option<DateTime>> {
        self.search(reference, Direction::Forward)
    }

    /// Returns the latest occurrence at or before `reference`.
    ///
    /// Seconds and sub-seconds of `reference` are ignored.
    pub fn previous(
        &self,
        reference: DateTime,
    ) -> anyhow::Result<Option<DateTime>> {
        self.search(reference, Direction::Backward)
    }

    /// Returns true when the given datetime, truncated to the minute, is an
    /// occurrence of this schedule.
    pub fn matches(&self, dt: DateTime) -> bool {
        let point = Point::from_datetime(self.inner.strategy, dt);
        self.inner.fields.iter().enumerate().all(|(level, (_, set))| {
            set.contains(point.get(level)) && point.is_valid_at(level)
        })
    }

    /// Returns an iterator over successive occurrences starting at
    /// `reference` and moving in the given direction.
    ///
    /// The iterator stops once there are no more occurrences. If a search
    /// fails to converge, the error is yielded and iteration stops.
    pub fn occurrences(
        &self,
        reference: DateTime,
        direction: Direction,
    ) -> Occurrences<'_> {
        Occurrences { schedule: self, direction, reference: Some(reference) }
    }

    /// Finds the nearest occurrence to `reference` in the given direction.
    ///
    /// This works like an odometer. Levels are visited from the coarsest
    /// (the year) to the finest (the minute). At each level, we pick the
    /// nearest candidate that keeps the result on the right side of the
    /// reference. When a level runs out of candidates, or the candidate
    /// picked doesn't exist on the calendar (February 30, say), we "carry"
    /// into the next candidate at the same level, or into the next coarser
    /// level when there are none left. Once every level has a value, the
    /// result is the answer.
    ///
    /// One iteration is spent per level assigned, so `max_iterations` bounds
    /// how many times the search descends, not how many candidates it tries.
    ///
    /// While the result agrees with the reference at every coarser level,
    /// the reference's own value bounds the pick. Once it diverges, the
    /// finer levels are free and the first (or last) candidate is taken.
    fn search(
        &self,
        reference: DateTime,
        direction: Direction,
    ) -> anyhow::Result<Option<DateTime>> {
        let inner = &*self.inner;
        let current = Point::from_datetime(inner.strategy, reference);
        let mut result = current.clone();
        let last = inner.fields.len() - 1;
        let mut level = 0;
        for iteration in 1..=inner.max_iterations {
            let mut bound = if level == 0
                || result.cmp_through(&current, level - 1).is_eq()
            {
                Some(current.key(level))
            } else {
                None
            };
            // Each iteration ends with one level assigned. Retries at the
            // same level and carries into coarser ones happen within it.
            loop {
                let field = inner.fields[level].0;
                let Some(key) = self.pick(&result, level, bound, direction)
                else {
                    if level == 0 {
                        log::debug!(
                            "no occurrence searching {direction} from \
                             {reference} (candidates exhausted after \
                             {iteration} iterations)",
                        );
                        return Ok(None);
                    }
                    level -= 1;
                    bound = Some(direction.advance(result.key(level)));
                    log::trace!(
                        "{field} exhausted, carrying into {coarser}",
                        coarser = inner.fields[level].0,
                    );
                    continue;
                };
                result.set_key(level, key);
                let ordering = result.cmp_through(&current, level);
                if result.is_valid_at(level) && direction.admits(ordering) {
                    log::trace!(
                        "assigned {field}={value}",
                        value = result.get(level),
                    );
                    break;
                }
                log::trace!(
                    "rejected {field}={value}, trying the next candidate",
                    value = result.get(level),
                );
                bound = Some(direction.advance(key));
            }
            if level < last {
                level += 1;
                continue;
            }
            let Some(found) = result.datetime() else {
                anyhow::bail!(
                    "search resolved every field to `{result}`, \
                     but it is not a valid datetime",
                );
            };
            debug_assert!(self.matches(found), "{found} is not an occurrence");
            log::debug!(
                "found {found} searching {direction} from {reference} \
                 after {iteration} iterations",
            );
            return Ok(Some(found));
        }
        log::debug!(
            "gave up searching {direction} from {reference} after \
             {max} iterations",
            max = inner.max_iterations,
        );
        Err(anyhow::Error::new(NonConvergent {
            direction,
            reference,
            max_iterations: inner.max_iterations,
        }))
    }

    /// Returns the key of the nearest candidate at `level` that is at or
    /// beyond `bound` in the given direction.
    ///
    /// When there is no bound, the first candidate in the given direction is
    /// returned.
    fn pick(
        &self,
        result: &Point,
        level: usize,
        bound: Option<i16>,
        direction: Direction,
    ) -> Option<i16> {
        let set = &self.inner.fields[level].1;
        if result.orders_by_occurrence(level) {
            // Keys here are the days from the first of the month to the
            // first occurrence of each weekday. So there are only seven of
            // them, and we can just try each one in order.
            let accept =
                |&key: &i16| set.contains(result.value_for_key(level, key));
            return match direction {
                Direction::Forward => {
                    (bound.unwrap_or(0).max(0)..=6).find(accept)
                }
                Direction::Backward => {
                    (0..=bound.unwrap_or(6).min(6)).rev().find(accept)
                }
            };
        }
        match (direction, bound) {
            (Direction::Forward, None) => set.first(),
            (Direction::Forward, Some(bound)) => set.smallest_at_least(bound),
            (Direction::Backward, None) => set.last(),
            (Direction::Backward, Some(bound)) => set.largest_at_most(bound),
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (i, (field, set)) in self.inner.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{field}={set}")?;
        }
        Ok(())
    }
}

/// The direction in which to search for an occurrence.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Moves `key` one step in this direction.
    fn advance(self, key: i16) -> i16 {
        match self {
            Direction::Forward => key.saturating_add(1),
            Direction::Backward => key.saturating_sub(1),
        }
    }

    /// Returns true when a candidate comparing to the reference with the
    /// given ordering is on the right side of it.
    fn admits(self, ordering: std::cmp::Ordering) -> bool {
        match self {
            Direction::Forward => ordering.is_ge(),
            Direction::Backward => ordering.is_le(),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// The error returned when a search exceeds its iteration bound.
///
/// This usually means the schedule's candidate sets never line up on a real
/// date, like February 31, but it can also mean the bound is too small for
/// a schedule whose occurrences are very far apart.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NonConvergent {
    direction: Direction,
    reference: DateTime,
    max_iterations: usize,
}

impl std::error::Error for NonConvergent {}

impl std::fmt::Display for NonConvergent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "searching {direction} from {reference} did not converge \
             within {max} iterations",
            direction = self.direction,
            reference = self.reference,
            max = self.max_iterations,
        )
    }
}

/// An iterator over successive occurrences of a schedule.
///
/// This is created by `Schedule::occurrences`.
#[derive(Clone, Debug)]
pub struct Occurrences<'s> {
    schedule: &'s Schedule,
    direction: Direction,
    /// The reference for the next search. When this is `None`, iteration
    /// has ceased.
    reference: Option<DateTime>,
}

impl<'s> Iterator for Occurrences<'s> {
    type Item = anyhow::Result<DateTime>;

    fn next(&mut self) -> Option<anyhow::Result<DateTime>> {
        let reference = self.reference.take()?;
        let search = match self.direction {
            Direction::Forward => self.schedule.next(reference),
            Direction::Backward => self.schedule.previous(reference),
        };
        let found = match search {
            Ok(None) => return None,
            Ok(Some(found)) => found,
            Err(err) => return Some(Err(err)),
        };
        let step = match self.direction {
            Direction::Forward => 1.minute(),
            Direction::Backward => -1.minute(),
        };
        // At the edge of jiff's supported range, there's nowhere left to go.
        self.reference = found.checked_add(step).ok();
        Some(Ok(found))
    }
}

impl<'s> std::iter::FusedIterator for Occurrences<'s> {}

/// A builder for constructing a valid schedule.
///
/// Any field not given a candidate set allows every value in its natural
/// domain. Which fields are searched at all depends on the strategy, which
/// is chosen from the fields that were given:
///
/// * When both weekdays and ordinals are given, days are addressed as the
/// nth occurrence of a weekday in the month.
/// * Otherwise, when either weekdays or weeks are given, days are addressed
/// as a weekday in a Monday-aligned week of the month.
/// * Otherwise, days are addressed by their day of the month.
///
/// Fields given but not used by the chosen strategy are ignored, with a
/// warning.
#[derive(Clone, Debug)]
pub struct ScheduleBuilder {
    /// Indexed by `Field::index`.
    candidates: [Option<Candidates>; Field::ALL.len()],
    max_iterations: usize,
}

impl ScheduleBuilder {
    fn new() -> ScheduleBuilder {
        ScheduleBuilder {
            candidates: Default::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn build(&self) -> anyhow::Result<Schedule> {
        anyhow::ensure!(
            self.max_iterations >= 1,
            "maximum iterations of `{}` is invalid \
             (must be greater than or equal to 1)",
            self.max_iterations,
        );
        for &field in Field::ALL {
            let Some(ref set) = self.candidates[field.index()] else {
                continue;
            };
            validate(field, set)?;
        }

        let given = |field: Field| self.candidates[field.index()].is_some();
        let strategy = if given(Field::Weekday) && given(Field::Ordinal) {
            Strategy::WeekdayOrdinal
        } else if given(Field::Weekday) || given(Field::Week) {
            Strategy::WeekdayInWeek
        } else {
            Strategy::DayOfMonth
        };
        for &field in Field::ALL {
            if given(field) && !strategy.uses(field) {
                log::warn!(
                    "{field} values are ignored when days are addressed \
                     with the {strategy} strategy",
                );
            }
        }

        let fields = strategy
            .fields()
            .iter()
            .map(|&field| {
                let set = match self.candidates[field.index()] {
                    Some(ref set) => set.clone(),
                    None => Candidates::from(field.min()..=field.max()),
                };
                (field, set)
            })
            .collect();
        let inner = Arc::new(ScheduleInner {
            strategy,
            fields,
            max_iterations: self.max_iterations,
        });
        let schedule = Schedule { inner };
        log::debug!("built {strategy} schedule: {schedule}");
        Ok(schedule)
    }

    /// Sets the candidate set for any field.
    pub fn field(
        &mut self,
        field: Field,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.candidates[field.index()] = Some(candidates.into());
        self
    }

    pub fn minutes(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Minute, candidates)
    }

    pub fn hours(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Hour, candidates)
    }

    /// Sets the days of the month, starting at `1`.
    pub fn days(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Day, candidates)
    }

    /// Sets the weekdays, where Monday is `0` and Sunday is `6`.
    pub fn weekdays(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Weekday, candidates)
    }

    /// Sets which occurrences of a weekday within the month are wanted,
    /// where `0` is the first occurrence.
    pub fn ordinals(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Ordinal, candidates)
    }

    /// Sets the Monday-aligned weeks of the month, where `0` is the week
    /// containing the first of the month.
    pub fn weeks(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Week, candidates)
    }

    pub fn months(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Month, candidates)
    }

    pub fn years(
        &mut self,
        candidates: impl Into<Candidates>,
    ) -> &mut ScheduleBuilder {
        self.field(Field::Year, candidates)
    }

    /// Sets the number of iterations a single search may take before it
    /// gives up with a `NonConvergent` error.
    pub fn max_iterations(&mut self, max: usize) -> &mut ScheduleBuilder {
        self.max_iterations = max;
        self
    }
}

/// Checks that every member of `set` is in the natural domain of `field`.
fn validate(field: Field, set: &Candidates) -> anyhow::Result<()> {
    let (min, max) = (field.min(), field.max());
    if let Candidates::Progression { start, stop, step } = *set {
        anyhow::ensure!(
            step >= 1,
            "{field} step of `{step}` is invalid \
             (step must be greater than or equal to 1)",
        );
        anyhow::ensure!(
            start < stop,
            "{field} range `{start}..{stop}` is empty",
        );
    }
    anyhow::ensure!(!set.is_empty(), "{field} values must not be empty");
    for v in [set.first(), set.last()].into_iter().flatten() {
        anyhow::ensure!(
            min <= v && v <= max,
            "invalid {field} value `{v}` \
             (values must be in range {min}..={max})",
        );
    }
    Ok(())
}

use std::ops::{Range, RangeInclusive};

/// The legal values for a single schedule field.
///
/// This is either an explicit set of integers or an arithmetic progression.
/// Both support the same queries, so the search engine never needs to know
/// which one it has.
///
/// Values are `i16` for every field, since that's big enough for years and
/// using a single integer type keeps composite points simple.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Candidates {
    /// A sorted set of distinct integers.
    ///
    /// Use `Candidates::explicit` to build one, which takes care of sorting
    /// and de-duplication.
    Explicit(Box<[i16]>),
    /// The integers `start, start + step, start + 2*step, ...` that are
    /// strictly less than `stop`.
    Progression { start: i16, stop: i16, step: i16 },
}

impl Candidates {
    /// Creates an explicit candidate set from any sequence of integers.
    pub fn explicit(values: impl IntoIterator<Item = i16>) -> Candidates {
        let mut vec: Vec<i16> = values.into_iter().collect();
        vec.sort();
        vec.dedup();
        Candidates::Explicit(vec.into_boxed_slice())
    }

    /// Creates an arithmetic progression from `start` (inclusive) to `stop`
    /// (exclusive).
    ///
    /// This does no validation. An empty progression, or one with a step
    /// less than `1`, is rejected when building a schedule.
    pub fn progression(start: i16, stop: i16, step: i16) -> Candidates {
        Candidates::Progression { start, stop, step }
    }

    /// Returns true when this set has no members.
    pub fn is_empty(&self) -> bool {
        match *self {
            Candidates::Explicit(ref set) => set.is_empty(),
            Candidates::Progression { start, stop, .. } => start >= stop,
        }
    }

    /// Returns the smallest member.
    pub fn first(&self) -> Option<i16> {
        match *self {
            Candidates::Explicit(ref set) => set.first().copied(),
            Candidates::Progression { start, stop, .. } => {
                if start < stop { Some(start) } else { None }
            }
        }
    }

    /// Returns the biggest member.
    pub fn last(&self) -> Option<i16> {
        match *self {
            Candidates::Explicit(ref set) => set.last().copied(),
            Candidates::Progression { start, stop, step } => {
                if start >= stop || step < 1 {
                    return None;
                }
                let (start, stop, step) = widen(start, stop, step);
                narrow(stop - 1 - (stop - 1 - start) % step)
            }
        }
    }

    /// Returns the smallest member that is greater than or equal to `value`.
    pub fn smallest_at_least(&self, value: i16) -> Option<i16> {
        match *self {
            Candidates::Explicit(ref set) => {
                let i = set.partition_point(|&v| v < value);
                set.get(i).copied()
            }
            Candidates::Progression { start, stop, step } => {
                if start >= stop || step < 1 || value >= stop {
                    return None;
                }
                if value <= start {
                    return Some(start);
                }
                let (start, stop, step) = widen(start, stop, step);
                let value = i32::from(value);
                let steps = (value - start + step - 1) / step;
                let found = start + steps * step;
                if found < stop { narrow(found) } else { None }
            }
        }
    }

    /// Returns the biggest member that is less than or equal to `value`.
    pub fn largest_at_most(&self, value: i16) -> Option<i16> {
        match *self {
            Candidates::Explicit(ref set) => {
                let i = set.partition_point(|&v| v <= value);
                i.checked_sub(1).map(|i| set[i])
            }
            Candidates::Progression { start, step, .. } => {
                let last = self.last()?;
                if value < start {
                    return None;
                }
                if value >= last {
                    return Some(last);
                }
                let (value, start) = (i32::from(value), i32::from(start));
                narrow(value - (value - start) % i32::from(step))
            }
        }
    }

    /// Returns true when `value` is a member of this set.
    pub fn contains(&self, value: i16) -> bool {
        self.smallest_at_least(value) == Some(value)
    }

    /// Returns an iterator over every member, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i16> + '_ {
        let mut next = self.first();
        std::iter::from_fn(move || {
            let cur = next?;
            next = cur.checked_add(1).and_then(|v| self.smallest_at_least(v));
            Some(cur)
        })
    }
}

impl std::fmt::Display for Candidates {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Candidates::Explicit(ref set) => {
                for (i, v) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            // Written the same way ranges are given on the command line, that
            // is, with an inclusive end.
            Candidates::Progression { start, step, .. } => {
                let Some(last) = self.last() else { return Ok(()) };
                write!(f, "{start}..{last}")?;
                if step != 1 {
                    write!(f, "/{step}")?;
                }
                Ok(())
            }
        }
    }
}

impl<const N: usize> From<[i16; N]> for Candidates {
    fn from(values: [i16; N]) -> Candidates {
        Candidates::explicit(values)
    }
}

impl From<Vec<i16>> for Candidates {
    fn from(values: Vec<i16>) -> Candidates {
        Candidates::explicit(values)
    }
}

impl From<&[i16]> for Candidates {
    fn from(values: &[i16]) -> Candidates {
        Candidates::explicit(values.iter().copied())
    }
}

impl From<Range<i16>> for Candidates {
    fn from(range: Range<i16>) -> Candidates {
        Candidates::progression(range.start, range.end, 1)
    }
}

impl From<RangeInclusive<i16>> for Candidates {
    fn from(range: RangeInclusive<i16>) -> Candidates {
        // Saturating is fine: no field has a domain anywhere near `i16::MAX`,
        // so such a range fails validation either way.
        let stop = range.end().saturating_add(1);
        Candidates::progression(*range.start(), stop, 1)
    }
}

/// Progression arithmetic is done in `i32` so that `value + step` and
/// friends can't overflow.
fn widen(start: i16, stop: i16, step: i16) -> (i32, i32, i32) {
    (i32::from(start), i32::from(stop), i32::from(step))
}

fn narrow(value: i32) -> Option<i16> {
    i16::try_from(value).ok()
}

use chrono::{Duration, NaiveDate};
use std::fmt::{self, Display};

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end);
        TimeSpan { start, end }
    }

    /// The length of the span.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /**
     * Check if two spans overlap, allowing a gap of up to `leniency` between them.
     *
     * The test is symmetric. A gap of exactly `leniency` still counts as an overlap. A leniency
     * that carries an end past the last representable date puts no limit on that side.
     */
    pub fn overlaps(&self, other: &TimeSpan, leniency: Duration) -> bool {
        fn reaches(earlier: &TimeSpan, later: &TimeSpan, leniency: Duration) -> bool {
            match earlier.end.checked_add_signed(leniency) {
                Some(limit) => later.start <= limit,
                None => true,
            }
        }

        reaches(self, other, leniency) && reaches(other, self, leniency)
    }

    /// The smallest span covering both spans.
    pub fn union(self, other: TimeSpan) -> TimeSpan {
        TimeSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} to {}", self.start, self.end)
    }
}

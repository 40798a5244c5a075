use std::fmt;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

/// Bucketing granularity for historical caches. Point-in-time queries whose
/// as-of timestamps fall into the same bucket share one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One bucket per calendar day.
    Daily,
    /// One bucket per ISO week, starting Monday.
    Weekly,
    /// One bucket per calendar month.
    Monthly,
    /// A single bucket spanning the whole representable range.
    AllHistory,
}

/// A half-open validity window `[start, end)` with midnight UTC boundaries.
///
/// For a fixed [`Granularity`], [`DateBucket::containing`] maps every
/// timestamp to exactly one bucket, and two buckets are either identical or
/// disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateBucket {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateBucket {
    /// The bucket `as_of` falls into for the given granularity.
    pub fn containing(as_of: DateTime<Utc>, granularity: Granularity) -> Self {
        let day = as_of.date_naive();
        match granularity {
            Granularity::Daily => Self::from_days(day, day.checked_add_days(Days::new(1))),
            Granularity::Weekly => {
                // The week of the minimum date can be partial: its start
                // clamps while the end stays on the Monday boundary.
                let offset = day.weekday().num_days_from_monday();
                let monday = day
                    .checked_sub_days(Days::new(u64::from(offset)))
                    .unwrap_or(NaiveDate::MIN);
                Self::from_days(monday, day.checked_add_days(Days::new(u64::from(7 - offset))))
            }
            Granularity::Monthly => {
                // Day 1 exists in every month.
                let first = day.with_day(1).unwrap_or(day);
                Self::from_days(first, first.checked_add_months(Months::new(1)))
            }
            Granularity::AllHistory => Self::all_history(),
        }
    }

    /// The single unbounded bucket used by all-history caches.
    pub fn all_history() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    fn from_days(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self {
            start: day_start(start),
            // Calendar overflow only at the far end of the representable
            // range; the bucket stays total by running to the maximum.
            end: end.map(day_start).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Inclusive lower bound.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `at` falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

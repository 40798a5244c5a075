use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::record::TemporalRecord;

/// Which effective records a lookup keeps once the date windows are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Every record effective at the as-of instant.
    #[default]
    AllEffective,
    /// Only the record with the greatest creation date; ties keep the record
    /// stored first.
    LatestCreated,
}

/// Per-entity filtering rules applied to a cached collection at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    pub selection: SelectionPolicy,
    /// When set, records flagged as inhibited are excluded even if their
    /// date windows match.
    pub skip_inhibited: bool,
}

impl FilterPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_skip_inhibited(mut self, skip: bool) -> Self {
        self.skip_inhibited = skip;
        self
    }

    pub(crate) fn admits<R: TemporalRecord>(&self, record: &R, as_of: DateTime<Utc>) -> bool {
        is_effective_at(record, as_of) && !(self.skip_inhibited && record.inhibited())
    }
}

/// True when `record` is effective at `as_of`: already created, already in
/// effect, and neither discontinued nor expired. End dates are inclusive, so
/// a record discontinued at `t` still matches a lookup at exactly `t`.
pub fn is_effective_at<R: TemporalRecord>(record: &R, as_of: DateTime<Utc>) -> bool {
    record.create_date() <= as_of
        && record.effective_from() <= as_of
        && record.discontinue_date().map_or(true, |date| as_of <= date)
        && record.expire_date().map_or(true, |date| as_of <= date)
}

/// Applies `policy` to a stored collection, returning the admitted records in
/// storage order. For [`SelectionPolicy::LatestCreated`] the scan replaces the
/// winner only on a strictly greater creation date, so records sharing one
/// keep their stored order's first entry.
pub(crate) fn select<R: TemporalRecord>(
    records: &[Arc<R>],
    policy: FilterPolicy,
    as_of: DateTime<Utc>,
) -> Vec<Arc<R>> {
    match policy.selection {
        SelectionPolicy::AllEffective => records
            .iter()
            .filter(|record| policy.admits(record.as_ref(), as_of))
            .cloned()
            .collect(),
        SelectionPolicy::LatestCreated => {
            let mut winner: Option<&Arc<R>> = None;
            for record in records {
                if !policy.admits(record.as_ref(), as_of) {
                    continue;
                }
                match winner {
                    Some(current) if record.create_date() <= current.create_date() => {}
                    _ => winner = Some(record),
                }
            }
            winner.cloned().into_iter().collect()
        }
    }
}

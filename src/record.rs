use std::fmt::Debug;

use chrono::{DateTime, Utc};

/// Trait for records carrying the temporal columns shared by every cached
/// reference table.
///
/// A record is effective at a timestamp `t` when it was already created
/// (`create_date <= t`), its window has started (`effective_from <= t`), and
/// neither end date has passed. Both end dates are inclusive, matching the
/// backing columns.
pub trait TemporalRecord: Debug + Send + Sync + 'static {
    /// Timestamp the record was created in the backing store.
    fn create_date(&self) -> DateTime<Utc>;

    /// First instant the record applies.
    fn effective_from(&self) -> DateTime<Utc>;

    /// Last instant the record applies, where discontinued.
    fn discontinue_date(&self) -> Option<DateTime<Utc>>;

    /// Last instant the record may be served, where it expires.
    fn expire_date(&self) -> Option<DateTime<Utc>>;

    /// Whether the record is flagged inhibited. Only consulted for entity
    /// types that opt in through `FilterPolicy::with_skip_inhibited`.
    fn inhibited(&self) -> bool {
        false
    }
}

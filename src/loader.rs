use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::BackingStoreError;

/// Backing-store fetch for one cache key.
///
/// Implementations must be idempotent and side-effect free: the cache may
/// call [`Loader::load`] again for a key after an invalidation or a failed
/// attempt, and never interprets the result beyond storing it. Returning an
/// empty collection means the key has no records, which is cached like any
/// other result.
pub trait Loader<K, R>: Send + Sync {
    fn load(&self, key: &K) -> Result<Vec<R>, BackingStoreError>;
}

/// A [`Loader`] whose backing store can also enumerate every record, for
/// caches that are populated eagerly at startup.
pub trait BulkLoader<K, R>: Loader<K, R> {
    /// Fetches every record of the entity in one pass.
    fn load_all(&self) -> Result<Vec<R>, BackingStoreError>;

    /// The cache key a record belongs under.
    fn key_of(&self, record: &R) -> K;
}

/// Backing-store fetch for one key restricted to a validity window.
///
/// The window is part of the query, not a hint: implementations must return
/// exactly the records whose validity intersects `[bucket_start, bucket_end)`
/// so that distinct buckets of the same base key stay independent.
pub trait HistoricalLoader<K, R>: Send + Sync {
    fn load(
        &self,
        key: &K,
        bucket_start: DateTime<Utc>,
        bucket_end: DateTime<Utc>,
    ) -> Result<Vec<R>, BackingStoreError>;
}

/// A [`HistoricalLoader`] whose backing store can enumerate every record, for
/// historical caches preloaded with all-history buckets.
pub trait BulkHistoricalLoader<K, R>: HistoricalLoader<K, R> {
    fn load_all(&self) -> Result<Vec<R>, BackingStoreError>;

    fn key_of(&self, record: &R) -> K;
}

// A shared loader is a loader, so one backing-store client can serve several
// access objects.

impl<K, R, L> Loader<K, R> for Arc<L>
where
    L: Loader<K, R> + ?Sized,
{
    fn load(&self, key: &K) -> Result<Vec<R>, BackingStoreError> {
        (**self).load(key)
    }
}

impl<K, R, L> BulkLoader<K, R> for Arc<L>
where
    L: BulkLoader<K, R> + ?Sized,
{
    fn load_all(&self) -> Result<Vec<R>, BackingStoreError> {
        (**self).load_all()
    }

    fn key_of(&self, record: &R) -> K {
        (**self).key_of(record)
    }
}

impl<K, R, L> HistoricalLoader<K, R> for Arc<L>
where
    L: HistoricalLoader<K, R> + ?Sized,
{
    fn load(
        &self,
        key: &K,
        bucket_start: DateTime<Utc>,
        bucket_end: DateTime<Utc>,
    ) -> Result<Vec<R>, BackingStoreError> {
        (**self).load(key, bucket_start, bucket_end)
    }
}

impl<K, R, L> BulkHistoricalLoader<K, R> for Arc<L>
where
    L: BulkHistoricalLoader<K, R> + ?Sized,
{
    fn load_all(&self) -> Result<Vec<R>, BackingStoreError> {
        (**self).load_all()
    }

    fn key_of(&self, record: &R) -> K {
        (**self).key_of(record)
    }
}

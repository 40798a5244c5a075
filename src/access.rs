use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::bucket::{DateBucket, Granularity};
use crate::compress::Compressor;
use crate::error::{CacheResult, InitializationError};
use crate::key::{CacheKey, HistoricalKey, KeyFields, ObjectKey};
use crate::loader::{BulkHistoricalLoader, BulkLoader, HistoricalLoader, Loader};
use crate::predicate::{select, FilterPolicy};
use crate::record::TemporalRecord;
use crate::registry::CacheControl;
use crate::scope::{RequestScope, ResultView};
use crate::store::{CacheConfig, CacheStore, SharedRecords};

/// Read façade for one temporal entity backed by a [`CacheStore`].
///
/// A lookup fetches (or finds) the full collection for the key, then applies
/// the entity's [`FilterPolicy`] at the request's as-of instant. When the
/// whole collection passes the filter, the returned view aliases the cached
/// vector instead of copying it.
pub struct AccessObject<K, R, L> {
    name: String,
    store: CacheStore<K, R>,
    loader: L,
    policy: FilterPolicy,
}

impl<K, R, L> AccessObject<K, R, L>
where
    K: CacheKey,
    R: TemporalRecord,
    L: Loader<K, R>,
{
    pub fn new(
        name: impl Into<String>,
        loader: L,
        config: CacheConfig,
        policy: FilterPolicy,
    ) -> Self {
        let name = name.into();
        Self {
            store: CacheStore::new(name.clone(), config),
            name,
            loader,
            policy,
        }
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor<R>>) -> Self {
        self.store = self.store.with_compressor(compressor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &CacheStore<K, R> {
        &self.store
    }

    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }

    /// Records for `key` effective at `as_of`. A key with no records yields
    /// an empty view, not an error.
    pub fn get<'scope>(
        &self,
        scope: &'scope RequestScope,
        key: K,
        as_of: DateTime<Utc>,
    ) -> CacheResult<ResultView<'scope, R>> {
        let records = self.store.get_or_load(&key, || self.loader.load(&key))?;
        Ok(view_of(scope, &records, self.policy, as_of))
    }

    /// Every record currently resident, unfiltered. Enumerating never
    /// consults the backing store.
    pub fn get_all<'scope>(&self, scope: &'scope RequestScope) -> ResultView<'scope, R> {
        collect_resident(scope, &self.store)
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.store.invalidate(key)
    }
}

impl<K, R, L> AccessObject<K, R, L>
where
    K: CacheKey,
    R: TemporalRecord,
    L: BulkLoader<K, R>,
{
    /// Fetches every record in one pass and seeds the cache, one entry per
    /// distinct key. Returns the number of keys seeded.
    pub fn preload_all(&self) -> CacheResult<usize> {
        let records = self.loader.load_all()?;
        let total = records.len();
        let mut grouped: HashMap<K, Vec<R>> = HashMap::new();
        for record in records {
            grouped
                .entry(self.loader.key_of(&record))
                .or_default()
                .push(record);
        }
        let keys = grouped.len();
        for (key, group) in grouped {
            self.store.publish(key, group);
        }
        info!(cache = %self.name, keys, records = total, "preloaded cache");
        Ok(keys)
    }
}

impl<K, R, L> CacheControl for AccessObject<K, R, L>
where
    K: CacheKey + KeyFields,
    R: TemporalRecord,
    L: Loader<K, R>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_count(&self) -> usize {
        self.store.len()
    }

    fn clear(&self) -> usize {
        self.store.clear()
    }

    fn invalidate_object(&self, key: &ObjectKey) -> usize {
        match K::from_object_key(key) {
            Some(typed) => usize::from(self.store.invalidate(&typed)),
            None => {
                error!(
                    cache = %self.name,
                    key = %key,
                    "key translation failed; nothing invalidated"
                );
                0
            }
        }
    }

    fn compress_cold(&self, now: DateTime<Utc>) -> usize {
        self.store.compress_cold(now)
    }
}

/// Read façade for an entity cached per validity bucket.
///
/// A lookup first resolves the bucket containing `as_of` at the configured
/// granularity, then loads that bucket's records under a [`HistoricalKey`].
/// Distinct buckets of one base key are independent entries, so a historical
/// query does not disturb current-data residency.
pub struct HistoricalAccessObject<K, R, L> {
    name: String,
    store: CacheStore<HistoricalKey<K>, R>,
    loader: L,
    granularity: Granularity,
    policy: FilterPolicy,
}

impl<K, R, L> HistoricalAccessObject<K, R, L>
where
    K: CacheKey,
    R: TemporalRecord,
    L: HistoricalLoader<K, R>,
{
    pub fn new(
        name: impl Into<String>,
        loader: L,
        granularity: Granularity,
        config: CacheConfig,
        policy: FilterPolicy,
    ) -> Self {
        let name = name.into();
        Self {
            store: CacheStore::new(name.clone(), config),
            name,
            loader,
            granularity,
            policy,
        }
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor<R>>) -> Self {
        self.store = self.store.with_compressor(compressor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &CacheStore<HistoricalKey<K>, R> {
        &self.store
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }

    /// Records for `key` effective at `as_of`, loaded from the bucket that
    /// contains `as_of`. The loader sees the bucket bounds as part of the
    /// query.
    pub fn get<'scope>(
        &self,
        scope: &'scope RequestScope,
        key: K,
        as_of: DateTime<Utc>,
    ) -> CacheResult<ResultView<'scope, R>> {
        let bucket = DateBucket::containing(as_of, self.granularity);
        let historical = HistoricalKey::new(key, bucket);
        let records = self.store.get_or_load(&historical, || {
            self.loader
                .load(historical.base(), bucket.start(), bucket.end())
        })?;
        Ok(view_of(scope, &records, self.policy, as_of))
    }

    /// Every record across every resident bucket, unfiltered.
    pub fn get_all<'scope>(&self, scope: &'scope RequestScope) -> ResultView<'scope, R> {
        collect_resident(scope, &self.store)
    }

    /// Drops every resident bucket of `key`.
    pub fn invalidate_base(&self, key: &K) -> usize {
        self.store
            .invalidate_where(|candidate| candidate.base() == key)
    }
}

impl<K, R, L> HistoricalAccessObject<K, R, L>
where
    K: CacheKey,
    R: TemporalRecord,
    L: BulkHistoricalLoader<K, R>,
{
    /// Fetches every record in one pass and seeds the cache under all-history
    /// buckets. Finer granularities must load on demand, because a seeded
    /// subset would make later bucket misses indistinguishable from keys
    /// with no records.
    pub fn preload_all(&self) -> CacheResult<usize> {
        if self.granularity != Granularity::AllHistory {
            return Err(InitializationError::new(
                &self.name,
                "eager preload requires all-history granularity",
            )
            .into());
        }
        let records = self.loader.load_all()?;
        let total = records.len();
        let mut grouped: HashMap<K, Vec<R>> = HashMap::new();
        for record in records {
            grouped
                .entry(self.loader.key_of(&record))
                .or_default()
                .push(record);
        }
        let keys = grouped.len();
        for (key, group) in grouped {
            self.store
                .publish(HistoricalKey::new(key, DateBucket::all_history()), group);
        }
        info!(cache = %self.name, keys, records = total, "preloaded historical cache");
        Ok(keys)
    }
}

impl<K, R, L> CacheControl for HistoricalAccessObject<K, R, L>
where
    K: CacheKey + KeyFields,
    R: TemporalRecord,
    L: HistoricalLoader<K, R>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_count(&self) -> usize {
        self.store.len()
    }

    fn clear(&self) -> usize {
        self.store.clear()
    }

    /// Sweeps every bucket of the translated base key.
    fn invalidate_object(&self, key: &ObjectKey) -> usize {
        match K::from_object_key(key) {
            Some(base) => self.invalidate_base(&base),
            None => {
                error!(
                    cache = %self.name,
                    key = %key,
                    "key translation failed; nothing invalidated"
                );
                0
            }
        }
    }

    fn compress_cold(&self, now: DateTime<Utc>) -> usize {
        self.store.compress_cold(now)
    }
}

fn view_of<'scope, R: TemporalRecord>(
    scope: &'scope RequestScope,
    records: &SharedRecords<R>,
    policy: FilterPolicy,
    as_of: DateTime<Utc>,
) -> ResultView<'scope, R> {
    let selected = select(records, policy, as_of);
    if selected.len() == records.len() {
        scope.share(records)
    } else {
        scope.own(selected)
    }
}

fn collect_resident<'scope, K, R>(
    scope: &'scope RequestScope,
    store: &CacheStore<K, R>,
) -> ResultView<'scope, R>
where
    K: CacheKey,
    R: Send + Sync + 'static,
{
    let mut records = Vec::new();
    for key in store.keys() {
        if let Some(shared) = store.get_resident(&key) {
            records.extend(shared.iter().cloned());
        }
    }
    scope.own(records)
}

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use refdata_cache::{
    BackingStoreError, BulkHistoricalLoader, BulkLoader, HistoricalLoader, Loader, TemporalRecord,
};

/// In-memory backing store scripted per test: counts loads, can fail the next
/// N calls, can stall to widen race windows, and can swap its contents to
/// simulate maintenance between loads.
pub struct ScriptedLoader<K, R> {
    records: RwLock<HashMap<K, Vec<R>>>,
    key_of: fn(&R) -> K,
    calls: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl<K, R> ScriptedLoader<K, R>
where
    K: Clone + Eq + Hash,
    R: Clone,
{
    pub fn new(records: Vec<R>, key_of: fn(&R) -> K) -> Self {
        Self {
            records: RwLock::new(group(records, key_of)),
            key_of,
            calls: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the next `count` loads fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Swaps the backing data; already-cached collections are unaffected.
    pub fn replace(&self, records: Vec<R>) {
        *self.records.write() = group(records, self.key_of);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter, usable after the loader moves into a cache.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn fetch(&self, key: &K) -> Result<Vec<R>, BackingStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BackingStoreError::new("scripted backing store failure"));
        }
        Ok(self.records.read().get(key).cloned().unwrap_or_default())
    }

    fn fetch_all(&self) -> Result<Vec<R>, BackingStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.read().values().flatten().cloned().collect())
    }
}

fn group<K, R>(records: Vec<R>, key_of: fn(&R) -> K) -> HashMap<K, Vec<R>>
where
    K: Eq + Hash,
{
    let mut grouped: HashMap<K, Vec<R>> = HashMap::new();
    for record in records {
        grouped.entry(key_of(&record)).or_default().push(record);
    }
    grouped
}

impl<K, R> Loader<K, R> for ScriptedLoader<K, R>
where
    K: Clone + Eq + Hash + Send + Sync,
    R: Clone + Send + Sync,
{
    fn load(&self, key: &K) -> Result<Vec<R>, BackingStoreError> {
        self.fetch(key)
    }
}

impl<K, R> BulkLoader<K, R> for ScriptedLoader<K, R>
where
    K: Clone + Eq + Hash + Send + Sync,
    R: Clone + Send + Sync,
{
    fn load_all(&self) -> Result<Vec<R>, BackingStoreError> {
        self.fetch_all()
    }

    fn key_of(&self, record: &R) -> K {
        (self.key_of)(record)
    }
}

/// Historical variant: serves only records whose validity intersects the
/// requested bucket, the way a date-ranged query would.
pub struct HistoricalScriptedLoader<K, R> {
    inner: ScriptedLoader<K, R>,
}

impl<K, R> HistoricalScriptedLoader<K, R>
where
    K: Clone + Eq + Hash,
    R: Clone + TemporalRecord,
{
    pub fn new(records: Vec<R>, key_of: fn(&R) -> K) -> Self {
        Self {
            inner: ScriptedLoader::new(records, key_of),
        }
    }

    pub fn fail_next(&self, count: usize) {
        self.inner.fail_next(count);
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.inner.call_counter()
    }
}

fn intersects<R: TemporalRecord>(record: &R, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    record.effective_from() < end
        && record.discontinue_date().map_or(true, |date| date >= start)
        && record.expire_date().map_or(true, |date| date >= start)
}

impl<K, R> HistoricalLoader<K, R> for HistoricalScriptedLoader<K, R>
where
    K: Clone + Eq + Hash + Send + Sync,
    R: Clone + TemporalRecord,
{
    fn load(
        &self,
        key: &K,
        bucket_start: DateTime<Utc>,
        bucket_end: DateTime<Utc>,
    ) -> Result<Vec<R>, BackingStoreError> {
        let records = self.inner.fetch(key)?;
        Ok(records
            .into_iter()
            .filter(|record| intersects(record, bucket_start, bucket_end))
            .collect())
    }
}

impl<K, R> BulkHistoricalLoader<K, R> for HistoricalScriptedLoader<K, R>
where
    K: Clone + Eq + Hash + Send + Sync,
    R: Clone + TemporalRecord,
{
    fn load_all(&self) -> Result<Vec<R>, BackingStoreError> {
        self.inner.fetch_all()
    }

    fn key_of(&self, record: &R) -> K {
        (self.inner.key_of)(record)
    }
}

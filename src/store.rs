use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::compress::{CompressError, CompressedData, Compressor};
use crate::error::{BackingStoreError, CacheResult};
use crate::key::CacheKey;

/// A cached collection: one shared vector, one shared handle per record.
///
/// The per-record handles let filtered views keep individual records alive
/// after the containing entry is invalidated or replaced.
pub type SharedRecords<R> = Arc<Vec<Arc<R>>>;

/// Tuning knobs for a single [`CacheStore`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on resident entries; `None` means unbounded.
    pub max_entries: Option<usize>,
    /// Idle time before a compression sweep may pack an entry away.
    pub compress_idle_after: Duration,
    /// Collections smaller than this are never worth compressing.
    pub compress_min_records: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            compress_idle_after: Duration::from_secs(30 * 60),
            compress_min_records: 16,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_compress_idle_after(mut self, idle: Duration) -> Self {
        self.compress_idle_after = idle;
        self
    }

    pub fn with_compress_min_records(mut self, min_records: usize) -> Self {
        self.compress_min_records = min_records;
        self
    }
}

/// Running counters for one store.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
    load_failures: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    compressions: AtomicU64,
    restores: AtomicU64,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_compression(&self) {
        self.compressions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_restore(&self) {
        self.restores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn compressions(&self) -> u64 {
        self.compressions.load(Ordering::Relaxed)
    }

    pub fn restores(&self) -> u64 {
        self.restores.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

enum GateState<R> {
    Pending,
    Ready(SharedRecords<R>),
    Failed,
}

/// Rendezvous between the thread that claimed a load and the threads that
/// arrived while it was in flight.
struct LoadGate<R> {
    state: Mutex<GateState<R>>,
    ready: Condvar,
}

impl<R> LoadGate<R> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GateState::Pending),
            ready: Condvar::new(),
        })
    }

    fn publish(&self, records: SharedRecords<R>) {
        *self.state.lock() = GateState::Ready(records);
        self.ready.notify_all();
    }

    fn fail(&self) {
        *self.state.lock() = GateState::Failed;
        self.ready.notify_all();
    }

    /// Blocks until the claimant settles the gate. `None` means the load
    /// failed or was severed; the caller decides whether to retry.
    fn wait(&self) -> Option<SharedRecords<R>> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                GateState::Ready(records) => return Some(Arc::clone(records)),
                GateState::Failed => return None,
                GateState::Pending => {}
            }
            self.ready.wait(&mut state);
        }
    }
}

enum Slot<R> {
    /// Materialized records plus the last-touched stamp read by eviction and
    /// the compression sweep.
    Live {
        records: SharedRecords<R>,
        last_used: AtomicI64,
    },
    /// Packed bytes; rebuilt on the next read.
    Compressed { data: CompressedData, last_used: i64 },
    /// A load or rebuild in flight; readers join the gate.
    Loading(Arc<LoadGate<R>>),
}

impl<R> Slot<R> {
    fn live(records: SharedRecords<R>, now: i64) -> Self {
        Slot::Live {
            records,
            last_used: AtomicI64::new(now),
        }
    }

    fn last_used(&self) -> i64 {
        match self {
            Slot::Live { last_used, .. } => last_used.load(Ordering::Relaxed),
            Slot::Compressed { last_used, .. } => *last_used,
            // never an eviction victim while in flight
            Slot::Loading(_) => i64::MAX,
        }
    }
}

enum Probe<R> {
    Hit(SharedRecords<R>),
    Join(Arc<LoadGate<R>>),
    Claimed(Arc<LoadGate<R>>),
    Rebuild(Arc<LoadGate<R>>, CompressedData),
}

enum ResidentStep<R> {
    Wait(Arc<LoadGate<R>>),
    Rebuild,
}

/// Keyed read-through store for immutable record collections.
///
/// Each key maps to one collection loaded at most once per residency: the
/// first reader claims the load, concurrent readers for the same key block on
/// its gate, and a failed load publishes nothing so a later reader retries.
/// Published collections are never mutated; invalidation drops the entry
/// while outstanding handles keep their records alive.
pub struct CacheStore<K, R> {
    label: String,
    entries: RwLock<HashMap<K, Slot<R>>>,
    config: CacheConfig,
    compressor: Option<Arc<dyn Compressor<R>>>,
    statistics: CacheStatistics,
}

impl<K, R> CacheStore<K, R>
where
    K: CacheKey,
    R: Send + Sync + 'static,
{
    pub fn new(label: impl Into<String>, config: CacheConfig) -> Self {
        Self {
            label: label.into(),
            entries: RwLock::new(HashMap::new()),
            config,
            compressor: None,
            statistics: CacheStatistics::new(),
        }
    }

    /// Installs the compressor used by [`CacheStore::compress_cold`].
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor<R>>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn statistics(&self) -> &CacheStatistics {
        &self.statistics
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Every key currently holding a slot, in sorted order. Enumerating
    /// never triggers a load.
    pub fn keys(&self) -> Vec<K> {
        let mut keys: Vec<K> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the collection for `key`, calling `fetch` if it is not
    /// resident. Concurrent callers for the same key share one fetch; a
    /// failed fetch is returned to its claimant and cached by nobody.
    pub fn get_or_load<F>(&self, key: &K, fetch: F) -> CacheResult<SharedRecords<R>>
    where
        F: FnOnce() -> Result<Vec<R>, BackingStoreError>,
    {
        loop {
            match self.probe(key) {
                Probe::Hit(records) => return Ok(records),
                Probe::Join(gate) => {
                    if let Some(records) = gate.wait() {
                        self.statistics.record_hit();
                        return Ok(records);
                    }
                    // the load we joined failed; take our own turn
                }
                Probe::Claimed(gate) => return self.run_load(key, &gate, fetch),
                Probe::Rebuild(gate, data) => {
                    if let Some(records) = self.run_inflate(key, &gate, &data) {
                        return Ok(records);
                    }
                    // undecodable entry was dropped; reload from the store
                }
            }
        }
    }

    /// Returns the collection for `key` only if it is resident, rebuilding a
    /// compressed slot but never consulting the backing store.
    pub fn get_resident(&self, key: &K) -> Option<SharedRecords<R>> {
        loop {
            let step = {
                let entries = self.entries.read();
                match entries.get(key) {
                    Some(Slot::Live { records, last_used }) => {
                        last_used.store(Utc::now().timestamp_micros(), Ordering::Relaxed);
                        self.statistics.record_hit();
                        return Some(Arc::clone(records));
                    }
                    Some(Slot::Loading(gate)) => ResidentStep::Wait(Arc::clone(gate)),
                    Some(Slot::Compressed { .. }) => ResidentStep::Rebuild,
                    None => return None,
                }
            };
            match step {
                ResidentStep::Wait(gate) => {
                    if let Some(records) = gate.wait() {
                        self.statistics.record_hit();
                        return Some(records);
                    }
                    // severed or failed load; re-examine the slot
                }
                ResidentStep::Rebuild => {
                    if let Some((gate, data)) = self.claim_compressed(key) {
                        return self.run_inflate(key, &gate, &data);
                    }
                    // another thread beat us to the slot
                }
            }
        }
    }

    /// Seeds `key` with an already-fetched collection, replacing whatever the
    /// slot held. Waiters on an in-flight load for the key are handed the
    /// seeded records.
    pub fn publish(&self, key: K, records: Vec<R>) -> SharedRecords<R> {
        let shared: SharedRecords<R> = Arc::new(records.into_iter().map(Arc::new).collect());
        let stamp = Utc::now().timestamp_micros();
        let mut entries = self.entries.write();
        let previous = entries.insert(key, Slot::live(Arc::clone(&shared), stamp));
        if let Some(Slot::Loading(gate)) = previous {
            gate.publish(Arc::clone(&shared));
        }
        self.trim_locked(&mut entries);
        shared
    }

    /// Drops the entry for `key`. An in-flight load for the key is severed:
    /// its waiters retry and its result is not cached.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.entries.write().remove(key);
        match removed {
            Some(slot) => {
                if let Slot::Loading(gate) = slot {
                    gate.fail();
                }
                self.statistics.record_invalidations(1);
                debug!(cache = %self.label, key = ?key, "invalidated cache entry");
                true
            }
            None => false,
        }
    }

    /// Drops every entry whose key matches the predicate.
    pub fn invalidate_where<F>(&self, mut matches: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut severed = Vec::new();
        let removed = {
            let mut entries = self.entries.write();
            let keys: Vec<K> = entries.keys().filter(|&key| matches(key)).cloned().collect();
            for key in &keys {
                if let Some(Slot::Loading(gate)) = entries.remove(key) {
                    severed.push(gate);
                }
            }
            keys.len()
        };
        for gate in severed {
            gate.fail();
        }
        if removed > 0 {
            self.statistics.record_invalidations(removed as u64);
            debug!(cache = %self.label, removed, "invalidated matching cache entries");
        }
        removed
    }

    /// Drops every entry.
    pub fn clear(&self) -> usize {
        let mut severed = Vec::new();
        let removed = {
            let mut entries = self.entries.write();
            let count = entries.len();
            for (_, slot) in entries.drain() {
                if let Slot::Loading(gate) = slot {
                    severed.push(gate);
                }
            }
            count
        };
        for gate in severed {
            gate.fail();
        }
        if removed > 0 {
            self.statistics.record_invalidations(removed as u64);
        }
        info!(cache = %self.label, removed, "cache cleared");
        removed
    }

    /// Packs every sufficiently large entry idle since before
    /// `now - compress_idle_after` into its compressed form. Readers arriving
    /// during the swap are served the materialized records.
    pub fn compress_cold(&self, now: DateTime<Utc>) -> usize {
        let compressor = match &self.compressor {
            Some(compressor) => Arc::clone(compressor),
            None => return 0,
        };
        let cutoff = now.timestamp_micros() - self.config.compress_idle_after.as_micros() as i64;
        let candidates: Vec<K> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, slot)| match slot {
                    Slot::Live { records, last_used } => {
                        records.len() >= self.config.compress_min_records
                            && last_used.load(Ordering::Relaxed) <= cutoff
                    }
                    _ => false,
                })
                .map(|(key, _)| key.clone())
                .collect()
        };

        let mut compressed = 0;
        for key in candidates {
            if self.compress_entry(&key, compressor.as_ref(), cutoff) {
                compressed += 1;
            }
        }
        if compressed > 0 {
            info!(cache = %self.label, compressed, "compressed cold cache entries");
        }
        compressed
    }

    fn compress_entry(&self, key: &K, compressor: &dyn Compressor<R>, cutoff: i64) -> bool {
        // Re-check under the write lock; the entry may have been touched or
        // replaced since the candidate scan.
        let claimed = {
            let mut entries = self.entries.write();
            match entries.remove(key) {
                Some(Slot::Live { records, last_used }) => {
                    let stamp = last_used.load(Ordering::Relaxed);
                    if stamp <= cutoff && records.len() >= self.config.compress_min_records {
                        let gate = LoadGate::new();
                        entries.insert(key.clone(), Slot::Loading(Arc::clone(&gate)));
                        Some((records, stamp, gate))
                    } else {
                        entries.insert(key.clone(), Slot::Live { records, last_used });
                        None
                    }
                }
                Some(other) => {
                    entries.insert(key.clone(), other);
                    None
                }
                None => None,
            }
        };
        let (records, stamp, gate) = match claimed {
            Some(claimed) => claimed,
            None => return false,
        };

        let result = compressor.compress(&records);
        {
            let mut entries = self.entries.write();
            let owns_slot = matches!(
                entries.get(key),
                Some(Slot::Loading(current)) if Arc::ptr_eq(current, &gate)
            );
            if owns_slot {
                match &result {
                    Ok(data) => {
                        entries.insert(
                            key.clone(),
                            Slot::Compressed {
                                data: data.clone(),
                                last_used: stamp,
                            },
                        );
                    }
                    Err(_) => {
                        entries.insert(
                            key.clone(),
                            Slot::Live {
                                records: Arc::clone(&records),
                                last_used: AtomicI64::new(stamp),
                            },
                        );
                    }
                }
            }
            // invalidated or cleared mid-compression: leave the slot alone
        }
        // Readers that joined the gate during the swap get the materialized
        // records either way.
        gate.publish(Arc::clone(&records));

        match result {
            Ok(data) => {
                self.statistics.record_compression();
                debug!(
                    cache = %self.label,
                    key = ?key,
                    records = records.len(),
                    bytes = data.byte_len(),
                    "compressed idle cache entry"
                );
                true
            }
            Err(err) => {
                warn!(
                    cache = %self.label,
                    key = ?key,
                    error = %err,
                    "compression failed; entry left materialized"
                );
                false
            }
        }
    }

    fn probe(&self, key: &K) -> Probe<R> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(Slot::Live { records, last_used }) => {
                    last_used.store(Utc::now().timestamp_micros(), Ordering::Relaxed);
                    self.statistics.record_hit();
                    return Probe::Hit(Arc::clone(records));
                }
                Some(Slot::Loading(gate)) => return Probe::Join(Arc::clone(gate)),
                Some(Slot::Compressed { .. }) | None => {}
            }
        }

        let mut entries = self.entries.write();
        match entries.remove(key) {
            Some(Slot::Live { records, last_used }) => {
                last_used.store(Utc::now().timestamp_micros(), Ordering::Relaxed);
                self.statistics.record_hit();
                let hit = Arc::clone(&records);
                entries.insert(key.clone(), Slot::Live { records, last_used });
                Probe::Hit(hit)
            }
            Some(Slot::Loading(gate)) => {
                entries.insert(key.clone(), Slot::Loading(Arc::clone(&gate)));
                Probe::Join(gate)
            }
            Some(Slot::Compressed { data, .. }) => {
                let gate = LoadGate::new();
                entries.insert(key.clone(), Slot::Loading(Arc::clone(&gate)));
                Probe::Rebuild(gate, data)
            }
            None => {
                self.statistics.record_miss();
                let gate = LoadGate::new();
                entries.insert(key.clone(), Slot::Loading(Arc::clone(&gate)));
                Probe::Claimed(gate)
            }
        }
    }

    fn claim_compressed(&self, key: &K) -> Option<(Arc<LoadGate<R>>, CompressedData)> {
        let mut entries = self.entries.write();
        match entries.remove(key) {
            Some(Slot::Compressed { data, .. }) => {
                let gate = LoadGate::new();
                entries.insert(key.clone(), Slot::Loading(Arc::clone(&gate)));
                Some((gate, data))
            }
            Some(other) => {
                entries.insert(key.clone(), other);
                None
            }
            None => None,
        }
    }

    /// Runs the claimed fetch outside any lock and settles the gate.
    fn run_load<F>(
        &self,
        key: &K,
        gate: &Arc<LoadGate<R>>,
        fetch: F,
    ) -> CacheResult<SharedRecords<R>>
    where
        F: FnOnce() -> Result<Vec<R>, BackingStoreError>,
    {
        match fetch() {
            Ok(records) => {
                let shared: SharedRecords<R> =
                    Arc::new(records.into_iter().map(Arc::new).collect());
                self.install(key, gate, Arc::clone(&shared));
                gate.publish(Arc::clone(&shared));
                debug!(
                    cache = %self.label,
                    key = ?key,
                    records = shared.len(),
                    "loaded collection from backing store"
                );
                Ok(shared)
            }
            Err(err) => {
                self.release_claim(key, gate);
                gate.fail();
                self.statistics.record_load_failure();
                error!(cache = %self.label, key = ?key, error = %err, "backing store load failed");
                Err(err.into())
            }
        }
    }

    fn run_inflate(
        &self,
        key: &K,
        gate: &Arc<LoadGate<R>>,
        data: &CompressedData,
    ) -> Option<SharedRecords<R>> {
        let restored = match &self.compressor {
            Some(compressor) => compressor.decompress(data),
            None => Err(CompressError("no compressor configured".into())),
        };
        match restored {
            Ok(records) => {
                let shared: SharedRecords<R> =
                    Arc::new(records.into_iter().map(Arc::new).collect());
                self.install(key, gate, Arc::clone(&shared));
                gate.publish(Arc::clone(&shared));
                self.statistics.record_restore();
                self.statistics.record_hit();
                debug!(
                    cache = %self.label,
                    key = ?key,
                    records = shared.len(),
                    "restored compressed cache entry"
                );
                Some(shared)
            }
            Err(err) => {
                self.release_claim(key, gate);
                gate.fail();
                error!(
                    cache = %self.label,
                    key = ?key,
                    error = %err,
                    "discarding undecodable compressed entry"
                );
                None
            }
        }
    }

    /// Swaps the claimed slot to its loaded records, unless the claim was
    /// severed by an invalidation in the meantime.
    fn install(&self, key: &K, gate: &Arc<LoadGate<R>>, records: SharedRecords<R>) {
        let mut entries = self.entries.write();
        let owns_slot = matches!(
            entries.get(key),
            Some(Slot::Loading(current)) if Arc::ptr_eq(current, gate)
        );
        if owns_slot {
            entries.insert(key.clone(), Slot::live(records, Utc::now().timestamp_micros()));
            self.trim_locked(&mut entries);
        } else {
            debug!(
                cache = %self.label,
                key = ?key,
                "load finished after invalidation; result not cached"
            );
        }
    }

    fn release_claim(&self, key: &K, gate: &Arc<LoadGate<R>>) {
        let mut entries = self.entries.write();
        let owns_slot = matches!(
            entries.get(key),
            Some(Slot::Loading(current)) if Arc::ptr_eq(current, gate)
        );
        if owns_slot {
            entries.remove(key);
        }
    }

    fn trim_locked(&self, entries: &mut HashMap<K, Slot<R>>) {
        let max = match self.config.max_entries {
            Some(max) if max > 0 => max,
            _ => return,
        };
        while entries.len() > max {
            let victim = entries
                .iter()
                .filter(|(_, slot)| !matches!(slot, Slot::Loading(_)))
                .min_by_key(|(_, slot)| slot.last_used())
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    entries.remove(&key);
                    self.statistics.record_eviction();
                    debug!(cache = %self.label, key = ?key, "evicted least recently used entry");
                }
                None => return,
            }
        }
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult, InitializationError};
use crate::key::ObjectKey;

/// Administrative surface every registered cache exposes, independent of its
/// key and record types.
pub trait CacheControl: Send + Sync {
    /// Registry name, unique per process.
    fn name(&self) -> &str;

    /// Resident entries (collections, not records).
    fn entry_count(&self) -> usize;

    /// Drops every entry; returns how many were dropped.
    fn clear(&self) -> usize;

    /// Invalidates the entry (or entries) addressed by the field-form key;
    /// returns how many were dropped.
    fn invalidate_object(&self, key: &ObjectKey) -> usize;

    /// Packs entries idle longer than the cache's configured window, as of
    /// `now`.
    fn compress_cold(&self, now: DateTime<Utc>) -> usize;

    /// Lifecycle state; always `Ready` for caches constructed eagerly.
    fn state(&self) -> InitState {
        InitState::Ready
    }

    /// Seeds the cache if its preload policy calls for it; returns the
    /// number of entries seeded.
    fn preload(&self) -> CacheResult<usize> {
        Ok(0)
    }
}

/// Lifecycle of a lazily-initialized cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Ready,
    /// Initialization failed. The failure is sticky: later callers get the
    /// same error without the factory running again.
    Failed,
}

/// When a lazily-registered cache is populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreloadPolicy {
    /// The first request pays for initialization.
    #[default]
    OnDemand,
    /// Initialized during the registry's startup preload pass.
    Startup,
}

const STATE_UNINITIALIZED: u8 = 0;
const STATE_INITIALIZING: u8 = 1;
const STATE_READY: u8 = 2;
const STATE_FAILED: u8 = 3;

type DaoFactory<A> = Box<dyn Fn() -> Result<A, InitializationError> + Send + Sync>;

/// Deferred construction of an access object.
///
/// The factory runs at most once, on the first [`LazyDao::instance`] call;
/// concurrent first callers block until it settles. Both outcomes are kept,
/// so a failed factory never runs again and every caller sees the same
/// error.
pub struct LazyDao<A> {
    name: String,
    policy: PreloadPolicy,
    factory: DaoFactory<A>,
    cell: OnceCell<Result<Arc<A>, InitializationError>>,
    state: AtomicU8,
}

impl<A> LazyDao<A> {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<A, InitializationError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            policy: PreloadPolicy::OnDemand,
            factory: Box::new(factory),
            cell: OnceCell::new(),
            state: AtomicU8::new(STATE_UNINITIALIZED),
        }
    }

    pub fn with_preload(mut self, policy: PreloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn preload_policy(&self) -> PreloadPolicy {
        self.policy
    }

    /// The underlying access object, constructing it on first use.
    pub fn instance(&self) -> Result<Arc<A>, InitializationError> {
        let outcome = self.cell.get_or_init(|| {
            self.state.store(STATE_INITIALIZING, Ordering::SeqCst);
            info!(cache = %self.name, "initializing cache");
            match (self.factory)() {
                Ok(dao) => {
                    self.state.store(STATE_READY, Ordering::SeqCst);
                    Ok(Arc::new(dao))
                }
                Err(err) => {
                    self.state.store(STATE_FAILED, Ordering::SeqCst);
                    warn!(cache = %self.name, error = %err, "cache initialization failed");
                    Err(err)
                }
            }
        });
        outcome.clone()
    }

    fn current_state(&self) -> InitState {
        match self.state.load(Ordering::SeqCst) {
            STATE_INITIALIZING => InitState::Initializing,
            STATE_READY => InitState::Ready,
            STATE_FAILED => InitState::Failed,
            _ => InitState::Uninitialized,
        }
    }
}

impl<A> CacheControl for LazyDao<A>
where
    A: CacheControl + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_count(&self) -> usize {
        match self.cell.get() {
            Some(Ok(dao)) => dao.entry_count(),
            _ => 0,
        }
    }

    fn clear(&self) -> usize {
        match self.cell.get() {
            Some(Ok(dao)) => dao.clear(),
            _ => {
                warn!(cache = %self.name, "clear requested before initialization; nothing to drop");
                0
            }
        }
    }

    fn invalidate_object(&self, key: &ObjectKey) -> usize {
        match self.cell.get() {
            Some(Ok(dao)) => dao.invalidate_object(key),
            _ => {
                debug!(
                    cache = %self.name,
                    key = %key,
                    "invalidation before initialization ignored"
                );
                0
            }
        }
    }

    fn compress_cold(&self, now: DateTime<Utc>) -> usize {
        match self.cell.get() {
            Some(Ok(dao)) => dao.compress_cold(now),
            _ => 0,
        }
    }

    fn state(&self) -> InitState {
        self.current_state()
    }

    fn preload(&self) -> CacheResult<usize> {
        match self.policy {
            PreloadPolicy::OnDemand => Ok(0),
            PreloadPolicy::Startup => {
                let dao = self.instance()?;
                Ok(dao.entry_count())
            }
        }
    }
}

/// Process-wide directory of caches, keyed by unique name.
///
/// The registry owns no cache logic itself; it routes administrative
/// operations to whichever [`CacheControl`] registered under the name.
pub struct CacheRegistry {
    entries: RwLock<HashMap<String, Arc<dyn CacheControl>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a cache under its own name.
    pub fn register(&self, control: Arc<dyn CacheControl>) -> CacheResult<()> {
        let name = control.name().to_string();
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(CacheError::DuplicateCacheName(name));
        }
        debug!(cache = %name, "registered cache");
        entries.insert(name, control);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CacheControl>> {
        self.entries.read().get(name).map(Arc::clone)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs every cache's preload in name order, stopping at the first
    /// failure. Returns the total entries seeded.
    pub fn preload_all(&self) -> CacheResult<usize> {
        let mut controls: Vec<Arc<dyn CacheControl>> =
            self.entries.read().values().map(Arc::clone).collect();
        controls.sort_by(|a, b| a.name().cmp(b.name()));
        let mut seeded = 0;
        for control in controls {
            seeded += control.preload()?;
        }
        info!(seeded, "cache preload pass finished");
        Ok(seeded)
    }

    pub fn clear_all(&self) -> usize {
        let controls: Vec<_> = self.entries.read().values().map(Arc::clone).collect();
        let mut removed = 0;
        for control in controls {
            removed += control.clear();
        }
        info!(removed, "cleared all registered caches");
        removed
    }

    pub fn compress_all_cold(&self, now: DateTime<Utc>) -> usize {
        let controls: Vec<_> = self.entries.read().values().map(Arc::clone).collect();
        let mut compressed = 0;
        for control in controls {
            compressed += control.compress_cold(now);
        }
        compressed
    }

    /// Routes an invalidation to the cache registered for `entity`.
    pub fn invalidate(&self, entity: &str, key: &ObjectKey) -> usize {
        match self.get(entity) {
            Some(control) => control.invalidate_object(key),
            None => {
                debug!(entity, key = %key, "no cache registered for invalidation");
                0
            }
        }
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

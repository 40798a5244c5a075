use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use crate::store::SharedRecords;

/// Per-request arena for cache lookup results.
///
/// Every view handed out by an access object borrows the scope that requested
/// it, so results cannot outlive their request. Dropping the scope releases
/// every view in one step; record memory itself is reclaimed by the shared
/// handles once the cache and all scopes let go.
///
/// A scope belongs to one request thread and is deliberately not `Sync`.
pub struct RequestScope {
    id: Uuid,
    views: Cell<u64>,
    retained_records: Cell<u64>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            views: Cell::new(0),
            retained_records: Cell::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of views handed out so far.
    pub fn views(&self) -> u64 {
        self.views.get()
    }

    /// Total records across those views.
    pub fn retained_records(&self) -> u64 {
        self.retained_records.get()
    }

    /// Wraps a cached collection without copying; the view shares the
    /// cache's own vector.
    pub fn share<R>(&self, records: &SharedRecords<R>) -> ResultView<'_, R> {
        self.track(records.len());
        ResultView {
            records: ViewRecords::Shared(Arc::clone(records)),
            _scope: PhantomData,
        }
    }

    /// Wraps a filtered selection the scope now owns.
    pub fn own<R>(&self, records: Vec<Arc<R>>) -> ResultView<'_, R> {
        self.track(records.len());
        ResultView {
            records: ViewRecords::Owned(records),
            _scope: PhantomData,
        }
    }

    /// A view over nothing, for lookups that matched no records.
    pub fn empty<R>(&self) -> ResultView<'_, R> {
        self.own(Vec::new())
    }

    fn track(&self, records: usize) {
        self.views.set(self.views.get() + 1);
        self.retained_records
            .set(self.retained_records.get() + records as u64);
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        trace!(
            scope = %self.id,
            views = self.views.get(),
            records = self.retained_records.get(),
            "request scope released"
        );
    }
}

enum ViewRecords<R> {
    Shared(SharedRecords<R>),
    Owned(Vec<Arc<R>>),
}

/// Read-only result of one cache lookup, alive no longer than its scope.
///
/// Records are exposed by reference only, so a caller cannot retain them
/// past the scope without an explicit clone of the data.
pub struct ResultView<'scope, R> {
    records: ViewRecords<R>,
    _scope: PhantomData<&'scope RequestScope>,
}

impl<R> ResultView<'_, R> {
    fn as_slice(&self) -> &[Arc<R>] {
        match &self.records {
            ViewRecords::Shared(records) => records,
            ViewRecords::Owned(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.as_slice().get(index).map(Arc::as_ref)
    }

    pub fn first(&self) -> Option<&R> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.as_slice().iter().map(Arc::as_ref)
    }

    /// True when the view aliases the cache's collection instead of holding
    /// a filtered copy.
    pub fn is_shared(&self) -> bool {
        matches!(self.records, ViewRecords::Shared(_))
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for ResultView<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

//! # Refdata Cache
//!
//! This crate provides a temporal read-through cache layer for reference
//! data: immutable record collections loaded on demand, filtered by
//! effective-date at lookup time, and shared without copying.
//!
//! ## Key Components
//!
//! - `CacheStore`: Keyed store with single-flight loads and transparent
//!   compression of cold entries
//! - `AccessObject` and `HistoricalAccessObject`: Per-entity read façades
//!   applying effective-date filtering, the latter bucketed by validity date
//! - `RequestScope` and `ResultView`: Per-request arena binding lookup
//!   results to the request that made them
//! - `CacheRegistry` and `LazyDao`: Named directory of caches with lazy,
//!   at-most-once initialization
//! - `NotificationDispatcher`: Routes change notifications to cache
//!   invalidation

mod error;
mod record;
mod key;
mod bucket;
mod predicate;
mod loader;
mod compress;
mod store;
mod scope;
mod access;
mod registry;
mod notify;

pub use error::{BackingStoreError, CacheError, CacheResult, InitializationError};
pub use record::TemporalRecord;
pub use key::{CacheKey, HistoricalKey, KeyFields, ObjectKey};
pub use bucket::{DateBucket, Granularity};
pub use predicate::{is_effective_at, FilterPolicy, SelectionPolicy};
pub use loader::{BulkHistoricalLoader, BulkLoader, HistoricalLoader, Loader};
pub use compress::{CompressError, CompressedData, Compressor, MsgPackCompressor};
pub use store::{CacheConfig, CacheStatistics, CacheStore, SharedRecords};
pub use scope::{RequestScope, ResultView};
pub use access::{AccessObject, HistoricalAccessObject};
pub use registry::{CacheControl, CacheRegistry, InitState, LazyDao, PreloadPolicy};

// Re-export notification components
pub use notify::{
    CacheNotification,
    InvalidationHandler,
    NotificationDispatcher,
    NotificationHandler,
    NotifyAction,
};

use std::error::Error as StdError;

/// Failure reported by a loader when the backing store cannot produce
/// records for a key. The cache layer propagates it untouched and publishes
/// nothing, so a later access retries the load.
#[derive(Debug, thiserror::Error)]
#[error("Backing store error: {message}")]
pub struct BackingStoreError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl BackingStoreError {
    /// Create an error from a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The loader-supplied message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure during the one-time construction of an entity type's cache.
/// Sticky: the accessor returns the same error on every subsequent call
/// instead of serving a silently empty cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cache '{name}' failed to initialize: {reason}")]
pub struct InitializationError {
    name: String,
    reason: String,
}

impl InitializationError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Name of the cache that failed to come up.
    pub fn cache_name(&self) -> &str {
        &self.name
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Error type for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    BackingStore(#[from] BackingStoreError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error("Duplicate cache name: {0}")]
    DuplicateCacheName(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

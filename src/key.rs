use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bucket::DateBucket;

/// Requirements on a cache key: an owned composite of business identifiers
/// that hashes for lookup and orders totally for deterministic enumeration.
pub trait CacheKey: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

/// String field form of a cache key, used where a typed key cannot cross a
/// boundary: invalidation notifications and registry-level administration.
///
/// Fields keep a stable order, so the serialized form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectKey {
    fields: BTreeMap<String, String>,
}

impl ObjectKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Raw field value.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field value parsed into `T`; `None` when absent or unparseable.
    pub fn value_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.value(name).and_then(|raw| raw.parse().ok())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.fields {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Translation between a typed key and its [`ObjectKey`] field form.
///
/// Every entity type registered for remote invalidation implements this for
/// its key; a failed translation drops the notification rather than guessing.
pub trait KeyFields: Sized {
    /// The field form of this key.
    fn object_key(&self) -> ObjectKey;

    /// Rebuilds the typed key from its field form.
    fn from_object_key(key: &ObjectKey) -> Option<Self>;
}

/// A base key extended with the validity bucket its as-of timestamp fell
/// into. Distinct buckets of the same base key are independent cache entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HistoricalKey<K> {
    base: K,
    bucket: DateBucket,
}

impl<K> HistoricalKey<K> {
    pub fn new(base: K, bucket: DateBucket) -> Self {
        Self { base, bucket }
    }

    pub fn base(&self) -> &K {
        &self.base
    }

    pub fn bucket(&self) -> DateBucket {
        self.bucket
    }
}

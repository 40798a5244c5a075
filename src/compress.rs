use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Compact byte form of a cached collection, kept in the cache slot while
/// the materialized records are dropped.
#[derive(Debug, Clone)]
pub struct CompressedData {
    bytes: Vec<u8>,
    record_count: usize,
}

impl CompressedData {
    pub fn new(bytes: Vec<u8>, record_count: usize) -> Self {
        Self { bytes, record_count }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Error)]
#[error("Compressor error: {0}")]
pub struct CompressError(pub String);

/// Packs a cached collection into bytes and restores it on demand.
///
/// Stores without a compressor leave every entry materialized; the
/// compression sweep is a no-op for them.
pub trait Compressor<R>: Send + Sync {
    fn compress(&self, records: &[Arc<R>]) -> Result<CompressedData, CompressError>;

    fn decompress(&self, data: &CompressedData) -> Result<Vec<R>, CompressError>;
}

/// MessagePack round trip for any serde-capable record type.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPackCompressor;

impl<R> Compressor<R> for MsgPackCompressor
where
    R: Serialize + DeserializeOwned + Send + Sync,
{
    fn compress(&self, records: &[Arc<R>]) -> Result<CompressedData, CompressError> {
        let refs: Vec<&R> = records.iter().map(|record| record.as_ref()).collect();
        let bytes = rmp_serde::to_vec(&refs).map_err(|err| CompressError(err.to_string()))?;
        Ok(CompressedData::new(bytes, records.len()))
    }

    fn decompress(&self, data: &CompressedData) -> Result<Vec<R>, CompressError> {
        rmp_serde::from_slice(data.bytes()).map_err(|err| CompressError(err.to_string()))
    }
}

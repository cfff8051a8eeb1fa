//! Blob reference manager: content storage for uploaded files.
//!
//! Blobs live outside the relational transaction boundary. An upload or copy
//! that lands before a failed commit simply strands a snapshot blob, and the
//! orphan scan reclaims it later; nothing here participates in rollback.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Mutex;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::domain::BlobHandle;

/// Failure modes of the blob store.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob not found")]
    NotFound,
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// A decoded blob as served to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// True for application-scoped blobs (copy-on-apply snapshots and fresh
    /// uploads owned by one application), false for primary uploads (profile
    /// resume, organization logo/banner).
    pub snapshot: bool,
}

/// Storage abstraction for uploaded binaries so the lifecycle services can be
/// exercised against an in-memory double.
pub trait BlobStore: Send + Sync {
    /// Store a compressed copy of `bytes` under a fresh handle. Existing
    /// blobs are never mutated.
    fn upload(&self, bytes: &[u8], name: &str, content_type: &str)
        -> Result<BlobHandle, BlobError>;

    /// Like `upload`, but flags the blob as a snapshot. For content owned by
    /// exactly one application, so the orphan scan reclaims it once the
    /// owning row is cascaded away.
    fn upload_snapshot(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<BlobHandle, BlobError>;

    fn fetch(&self, handle: &BlobHandle) -> Result<StoredBlob, BlobError>;

    /// Produce an independent snapshot of an existing blob under a fresh
    /// handle, decoupled from the source. Used whenever a record must keep
    /// its own durable reference to content that may later change or vanish
    /// at the source.
    fn copy(&self, handle: &BlobHandle, new_name: &str) -> Result<BlobHandle, BlobError>;

    /// Hard-delete. Absent handles are a no-op success so deletion stays
    /// idempotent.
    fn delete(&self, handle: &BlobHandle) -> Result<(), BlobError>;

    /// Handles of every blob flagged as a snapshot; input to the orphan scan.
    fn snapshots(&self) -> Result<Vec<BlobHandle>, BlobError>;
}

#[derive(Debug, Clone)]
struct BlobRecord {
    name: String,
    content_type: String,
    compressed: Vec<u8>,
    snapshot: bool,
}

/// In-memory `BlobStore` holding gzip-compressed payloads.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    records: Mutex<BTreeMap<BlobHandle, BlobRecord>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, record: BlobRecord) -> BlobHandle {
        let handle = BlobHandle::next();
        let mut records = self.records.lock().expect("blob mutex poisoned");
        records.insert(handle.clone(), record);
        handle
    }
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>, BlobError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|_| encoder.finish())
        .map_err(|err| BlobError::Unavailable(err.to_string()))
}

fn decompress(compressed: &[u8]) -> Result<Vec<u8>, BlobError> {
    let mut decoder = GzDecoder::new(compressed);
    let mut bytes = Vec::new();
    decoder
        .read_to_end(&mut bytes)
        .map_err(|err| BlobError::Unavailable(err.to_string()))?;
    Ok(bytes)
}

impl MemoryBlobStore {
    fn store(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
        snapshot: bool,
    ) -> Result<BlobHandle, BlobError> {
        let compressed = compress(bytes)?;
        Ok(self.insert(BlobRecord {
            name: name.to_string(),
            content_type: content_type.to_string(),
            compressed,
            snapshot,
        }))
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<BlobHandle, BlobError> {
        self.store(bytes, name, content_type, false)
    }

    fn upload_snapshot(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<BlobHandle, BlobError> {
        self.store(bytes, name, content_type, true)
    }

    fn fetch(&self, handle: &BlobHandle) -> Result<StoredBlob, BlobError> {
        let record = {
            let records = self.records.lock().expect("blob mutex poisoned");
            records.get(handle).cloned().ok_or(BlobError::NotFound)?
        };
        Ok(StoredBlob {
            name: record.name,
            content_type: record.content_type,
            bytes: decompress(&record.compressed)?,
            snapshot: record.snapshot,
        })
    }

    fn copy(&self, handle: &BlobHandle, new_name: &str) -> Result<BlobHandle, BlobError> {
        let source = {
            let records = self.records.lock().expect("blob mutex poisoned");
            records.get(handle).cloned().ok_or(BlobError::NotFound)?
        };
        Ok(self.insert(BlobRecord {
            name: new_name.to_string(),
            content_type: source.content_type,
            compressed: source.compressed,
            snapshot: true,
        }))
    }

    fn delete(&self, handle: &BlobHandle) -> Result<(), BlobError> {
        let mut records = self.records.lock().expect("blob mutex poisoned");
        records.remove(handle);
        Ok(())
    }

    fn snapshots(&self) -> Result<Vec<BlobHandle>, BlobError> {
        let records = self.records.lock().expect("blob mutex poisoned");
        Ok(records
            .iter()
            .filter(|(_, record)| record.snapshot)
            .map(|(handle, _)| handle.clone())
            .collect())
    }
}

//! RocksDB storage backend.

use std::path::Path;

use rocksdb::{Options, DB};
use tracing::{debug, info};

use crate::batch::{BatchOp, WriteBatch};
use crate::error::{StorageError, StorageResult};
use crate::traits::KvStore;

// Namespace and key are joined with a separator that never appears in
// namespace names.
const SEPARATOR: u8 = b'/';

/// Persistent [`KvStore`] backed by a single RocksDB database.
///
/// Namespaces are mapped to key prefixes (`<namespace>/<key>`), so one
/// database file holds every namespace of the node.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Opens (or creates) a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        info!(target: "dpos::storage", path = %path.display(), "opening rocksdb store");

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_level_compaction_dynamic_level_bytes(true);

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::open(path.display().to_string(), e.to_string()))?;
        Ok(Self { db })
    }

    fn full_key(namespace: &str, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(namespace.len() + 1 + key.len());
        full.extend_from_slice(namespace.as_bytes());
        full.push(SEPARATOR);
        full.extend_from_slice(key);
        full
    }
}

impl KvStore for RocksStore {
    fn get(&self, namespace: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.db
            .get(Self::full_key(namespace, key))
            .map_err(|e| StorageError::backend(e.to_string()))
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        debug!(
            target: "dpos::storage",
            namespace,
            key = %hex::encode(&key[..key.len().min(8)]),
            value_len = value.len(),
            "put"
        );
        self.db
            .put(Self::full_key(namespace, key), value)
            .map_err(|e| StorageError::backend(e.to_string()))
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> StorageResult<()> {
        self.db
            .delete(Self::full_key(namespace, key))
            .map_err(|e| StorageError::backend(e.to_string()))
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut wb = rocksdb::WriteBatch::default();
        for op in batch.ops() {
            match op {
                BatchOp::Put {
                    namespace,
                    key,
                    value,
                } => wb.put(Self::full_key(namespace, key), value),
                BatchOp::Delete { namespace, key } => wb.delete(Self::full_key(namespace, key)),
            }
        }
        debug!(target: "dpos::storage", ops = batch.len(), "writing batch");
        self.db
            .write(wb)
            .map_err(|e| StorageError::backend(e.to_string()))
    }
}

//! In-memory storage backend.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::batch::{BatchOp, WriteBatch};
use crate::error::StorageResult;
use crate::traits::KvStore;

/// In-memory [`KvStore`] backed by one `HashMap` per namespace.
///
/// Used by tests and by ephemeral chains; contents vanish on drop.
#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.buckets
            .read()
            .get(namespace)
            .map_or(0, HashMap::len)
    }

    /// Returns true if `namespace` holds no entries.
    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, namespace: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .buckets
            .read()
            .get(namespace)
            .and_then(|bucket| bucket.get(key).cloned()))
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.buckets
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &[u8]) -> StorageResult<()> {
        if let Some(bucket) = self.buckets.write().get_mut(namespace) {
            bucket.remove(key);
        }
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut buckets = self.buckets.write();
        for op in batch.ops() {
            match op {
                BatchOp::Put {
                    namespace,
                    key,
                    value,
                } => {
                    buckets
                        .entry(namespace.clone())
                        .or_default()
                        .insert(key.clone(), value.clone());
                }
                BatchOp::Delete { namespace, key } => {
                    if let Some(bucket) = buckets.get_mut(namespace) {
                        bucket.remove(key);
                    }
                }
            }
        }
        Ok(())
    }
}

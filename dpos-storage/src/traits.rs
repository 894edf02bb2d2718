//! Storage trait definitions.
//!
//! The [`KvStore`] trait is the only interface higher layers use to touch
//! persistence; backends implement it with interior mutability so a store
//! can be shared behind an `Arc` by the tries and the state factory.

use crate::batch::WriteBatch;
use crate::error::StorageResult;

/// Namespaced key-value store.
///
/// Keys live inside string namespaces; the same key bytes in two
/// namespaces address two independent entries.
pub trait KvStore: Send + Sync {
    /// Reads the value stored under `key` in `namespace`.
    ///
    /// Returns `Ok(None)` when the key is absent; a missing key is not an
    /// error at this layer.
    fn get(&self, namespace: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Inserts or overwrites `key` with `value` in `namespace`.
    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Removes `key` from `namespace`. Removing an absent key is a no-op.
    fn delete(&self, namespace: &str, key: &[u8]) -> StorageResult<()>;

    /// Applies all operations in `batch` as a single atomic write.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Checks if a key exists.
    fn contains(&self, namespace: &str, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(namespace, key)?.is_some())
    }
}

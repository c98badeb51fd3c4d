//! Typed synchronous facade over the asynchronous KV engine.
//!
//! The engine applies writes through callbacks fired on its own threads.
//! Metadata processors run on plain worker threads and want sequential
//! code, so every write here parks the caller on a one-shot channel until
//! the engine's callback resolves it. The channel is single-resolution by
//! construction; a dropped callback surfaces as a store failure rather than
//! a hang forever on a poisoned wait.
//!
//! All operations address the reserved meta partition and map engine result
//! codes onto the metadata error taxonomy in one place.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{MetaError, MetaResult};
use crate::kvstore::{KvCallback, KvEngine, KvIterator, KvPair, Part, ResultCode};
use crate::types::{PartitionId, SpaceId};

/// Space id of the reserved metadata partition.
pub const DEFAULT_SPACE_ID: SpaceId = 0;
/// Partition id of the reserved metadata partition.
pub const DEFAULT_PART_ID: PartitionId = 0;

/// Map an engine result code onto the metadata error taxonomy.
pub fn to_meta_error(code: ResultCode) -> MetaError {
    match code {
        ResultCode::Succeeded => MetaError::StoreFailure,
        ResultCode::ErrKeyNotFound => MetaError::NotFound,
        ResultCode::ErrLeaderChanged => MetaError::LeaderChanged,
        ResultCode::ErrUnknown => MetaError::StoreFailure,
    }
}

/// Synchronous facade over the engine, pinned to the meta partition.
#[derive(Clone)]
pub struct MetaStore {
    engine: Arc<dyn KvEngine>,
}

impl MetaStore {
    /// Wrap an engine handle.
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self { engine }
    }

    /// The underlying engine handle.
    pub fn engine(&self) -> &Arc<dyn KvEngine> {
        &self.engine
    }

    /// Whether this instance leads the meta partition.
    pub fn is_leader(&self) -> bool {
        self.engine.is_leader(DEFAULT_SPACE_ID, DEFAULT_PART_ID)
    }

    /// Raft peer list of the meta partition.
    pub fn part(&self) -> MetaResult<Part> {
        self.engine
            .part(DEFAULT_SPACE_ID, DEFAULT_PART_ID)
            .map_err(to_meta_error)
    }

    fn block_on_write(&self, fire: impl FnOnce(KvCallback)) -> MetaResult<()> {
        let (tx, rx) = oneshot::channel();
        fire(Box::new(move |code| {
            // The receiver may have given up; resolution is still one-shot.
            let _ = tx.send(code);
        }));
        match rx.blocking_recv() {
            Ok(ResultCode::Succeeded) => Ok(()),
            Ok(code) => Err(to_meta_error(code)),
            Err(_) => {
                warn!("engine dropped a write callback without resolving it");
                Err(MetaError::StoreFailure)
            }
        }
    }

    /// Apply a batch of puts, blocking until the engine commits.
    pub fn put(&self, kvs: Vec<KvPair>) -> MetaResult<()> {
        self.block_on_write(|cb| {
            self.engine
                .async_multi_put(DEFAULT_SPACE_ID, DEFAULT_PART_ID, kvs, cb)
        })
    }

    /// Remove one key, blocking until the engine commits.
    pub fn remove(&self, key: &[u8]) -> MetaResult<()> {
        self.block_on_write(|cb| {
            self.engine
                .async_remove(DEFAULT_SPACE_ID, DEFAULT_PART_ID, key, cb)
        })
    }

    /// Remove a batch of keys, blocking until the engine commits.
    pub fn multi_remove(&self, keys: Vec<Vec<u8>>) -> MetaResult<()> {
        self.block_on_write(|cb| {
            self.engine
                .async_multi_remove(DEFAULT_SPACE_ID, DEFAULT_PART_ID, keys, cb)
        })
    }

    /// Remove every key in `[start, end)`, blocking until the engine commits.
    pub fn remove_range(&self, start: &[u8], end: &[u8]) -> MetaResult<()> {
        self.block_on_write(|cb| {
            self.engine
                .async_remove_range(DEFAULT_SPACE_ID, DEFAULT_PART_ID, start, end, cb)
        })
    }

    /// Read one key.
    pub fn get(&self, key: &[u8]) -> MetaResult<Vec<u8>> {
        self.engine
            .get(DEFAULT_SPACE_ID, DEFAULT_PART_ID, key)
            .map_err(to_meta_error)
    }

    /// Read a batch of keys; fails as a whole when any key is absent.
    pub fn multi_get(&self, keys: &[Vec<u8>]) -> MetaResult<Vec<Vec<u8>>> {
        self.engine
            .multi_get(DEFAULT_SPACE_ID, DEFAULT_PART_ID, keys)
            .map_err(to_meta_error)
    }

    /// Iterate all entries under a key prefix.
    pub fn prefix(&self, prefix: &[u8]) -> MetaResult<Box<dyn KvIterator + '_>> {
        self.engine
            .prefix(DEFAULT_SPACE_ID, DEFAULT_PART_ID, prefix)
            .map_err(to_meta_error)
    }

    /// Iterate all entries in `[start, end)`.
    pub fn range(&self, start: &[u8], end: &[u8]) -> MetaResult<Box<dyn KvIterator + '_>> {
        self.engine
            .range(DEFAULT_SPACE_ID, DEFAULT_PART_ID, start, end)
            .map_err(to_meta_error)
    }

    /// Collect the values of every entry in `[start, end)`.
    pub fn scan_values(&self, start: &[u8], end: &[u8]) -> MetaResult<Vec<Vec<u8>>> {
        let mut iter = self.range(start, end)?;
        let mut values = Vec::new();
        while iter.valid() {
            values.push(iter.val().to_vec());
            iter.next();
        }
        Ok(values)
    }

    /// Export meta tables as SST files for a named backup.
    pub fn backup_table(
        &self,
        name: &str,
        table_prefix: &[u8],
        filter: &dyn Fn(&[u8]) -> bool,
    ) -> MetaResult<Vec<String>> {
        self.engine
            .backup_table(DEFAULT_SPACE_ID, name, table_prefix, filter)
            .map_err(to_meta_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::memory::MemoryEngine;

    fn store() -> MetaStore {
        MetaStore::new(MemoryEngine::new())
    }

    #[test]
    fn put_then_get() {
        let store = store();
        store
            .put(vec![(b"k".to_vec(), b"v".to_vec())])
            .unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v");
    }

    #[test]
    fn missing_key_maps_to_not_found() {
        let store = store();
        assert_eq!(store.get(b"absent").unwrap_err(), MetaError::NotFound);
    }

    #[test]
    fn multi_remove_then_scan() {
        let store = store();
        store
            .put(vec![
                (b"a1".to_vec(), b"1".to_vec()),
                (b"a2".to_vec(), b"2".to_vec()),
                (b"a3".to_vec(), b"3".to_vec()),
            ])
            .unwrap();
        store
            .multi_remove(vec![b"a1".to_vec(), b"a3".to_vec()])
            .unwrap();

        let values = store.scan_values(b"a1", b"a4").unwrap();
        assert_eq!(values, vec![b"2".to_vec()]);
    }

    #[test]
    fn remove_range_is_half_open() {
        let store = store();
        store
            .put(vec![
                (b"a".to_vec(), b"".to_vec()),
                (b"b".to_vec(), b"".to_vec()),
                (b"c".to_vec(), b"".to_vec()),
            ])
            .unwrap();
        store.remove_range(b"a", b"c").unwrap();
        assert!(store.get(b"a").is_err());
        assert!(store.get(b"b").is_err());
        assert_eq!(store.get(b"c").unwrap(), b"");
    }
}

//! Contract of the replicated key-value engine the metadata service runs on.
//!
//! The engine itself (RocksDB plus Raft replication) lives outside this
//! crate; metadata code consumes it through [`KvEngine`]. Reads are
//! synchronous. Writes are asynchronous: the engine accepts a callback that
//! fires exactly once with a [`ResultCode`] on an engine-owned thread, and
//! [`crate::meta::store::MetaStore`] turns that into blocking calls.
//!
//! Iterators returned by `prefix`/`range` expose borrowed key/value views
//! that are only valid until the next `next()` call, and they borrow the
//! engine handle, so they cannot outlive it.

pub mod memory;

use crate::types::{HostAddr, PartitionId, SpaceId};

/// One key-value pair of a write payload.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Completion callback of an asynchronous engine write.
pub type KvCallback = Box<dyn FnOnce(ResultCode) + Send + 'static>;

/// Result codes surfaced by the engine.
///
/// Anything the engine reports beyond the first three collapses into
/// `ErrUnknown`; the facade maps the whole set onto the metadata error
/// taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Operation applied.
    Succeeded,
    /// Key absent.
    ErrKeyNotFound,
    /// This instance no longer leads the partition.
    ErrLeaderChanged,
    /// Any other engine failure.
    ErrUnknown,
}

/// Cursor over a prefix or range scan.
///
/// `key`/`val` return views into the iterator's current position; both are
/// invalidated by `next()`.
pub trait KvIterator {
    /// Whether the cursor points at an entry.
    fn valid(&self) -> bool;
    /// Key at the cursor.
    fn key(&self) -> &[u8];
    /// Value at the cursor.
    fn val(&self) -> &[u8];
    /// Advance the cursor.
    fn next(&mut self);
}

/// Raft peer list of one partition.
#[derive(Debug, Clone)]
pub struct Part {
    peers: Vec<HostAddr>,
}

impl Part {
    /// Wrap a peer list.
    pub fn new(peers: Vec<HostAddr>) -> Self {
        Self { peers }
    }

    /// Peers of the partition's Raft group.
    pub fn peers(&self) -> &[HostAddr] {
        &self.peers
    }
}

/// The replicated KV engine surface consumed by the metadata service.
pub trait KvEngine: Send + Sync {
    /// Read a single key.
    fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> Result<Vec<u8>, ResultCode>;

    /// Read multiple keys; fails as a whole if any key is absent.
    fn multi_get(
        &self,
        space: SpaceId,
        part: PartitionId,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>, ResultCode>;

    /// Iterate all entries whose key starts with `prefix`.
    fn prefix<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>, ResultCode>;

    /// Iterate all entries in `[start, end)`.
    fn range<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        start: &[u8],
        end: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>, ResultCode>;

    /// Apply a batch of puts; `cb` fires exactly once.
    fn async_multi_put(&self, space: SpaceId, part: PartitionId, kvs: Vec<KvPair>, cb: KvCallback);

    /// Remove a single key; `cb` fires exactly once.
    fn async_remove(&self, space: SpaceId, part: PartitionId, key: &[u8], cb: KvCallback);

    /// Remove a batch of keys; `cb` fires exactly once.
    fn async_multi_remove(
        &self,
        space: SpaceId,
        part: PartitionId,
        keys: Vec<Vec<u8>>,
        cb: KvCallback,
    );

    /// Remove all keys in `[start, end)`; `cb` fires exactly once.
    fn async_remove_range(
        &self,
        space: SpaceId,
        part: PartitionId,
        start: &[u8],
        end: &[u8],
        cb: KvCallback,
    );

    /// Raft peer list of a partition.
    fn part(&self, space: SpaceId, part: PartitionId) -> Result<Part, ResultCode>;

    /// Whether this instance currently leads the partition.
    fn is_leader(&self, space: SpaceId, part: PartitionId) -> bool;

    /// Export the entries of one table prefix as SST files for a named
    /// backup, keeping only keys accepted by `filter`.
    fn backup_table(
        &self,
        space: SpaceId,
        name: &str,
        table_prefix: &[u8],
        filter: &dyn Fn(&[u8]) -> bool,
    ) -> Result<Vec<String>, ResultCode>;
}

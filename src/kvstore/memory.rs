//! Deterministic in-memory engine for unit tests and simulations.
//!
//! Mirrors the production engine's behavior without disk or network I/O:
//! callbacks still fire exactly once, scans observe a stable snapshot, and
//! leadership can be toggled to exercise leader-changed paths.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{HostAddr, PartitionId, SpaceId};

use super::{KvCallback, KvEngine, KvIterator, KvPair, Part, ResultCode};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory [`KvEngine`] backed by one ordered map per partition.
///
/// Write callbacks are invoked inline on the calling thread; the facade's
/// one-shot wait primitive observes an already-resolved channel, which keeps
/// tests deterministic.
#[derive(Default)]
pub struct MemoryEngine {
    parts: RwLock<BTreeMap<(SpaceId, PartitionId), Table>>,
    peers: RwLock<Vec<HostAddr>>,
    leader: RwLock<bool>,
}

impl MemoryEngine {
    /// An empty engine that leads every partition.
    pub fn new() -> Arc<Self> {
        let engine = Self {
            leader: RwLock::new(true),
            ..Self::default()
        };
        Arc::new(engine)
    }

    /// Toggle leadership for every partition.
    pub fn set_leader(&self, leader: bool) {
        *self.leader.write() = leader;
    }

    /// Replace the Raft peer list reported by [`KvEngine::part`].
    pub fn set_peers(&self, peers: Vec<HostAddr>) {
        *self.peers.write() = peers;
    }

    /// Number of entries stored in one partition, for test assertions.
    pub fn entry_count(&self, space: SpaceId, part: PartitionId) -> usize {
        self.parts
            .read()
            .get(&(space, part))
            .map(|t| t.len())
            .unwrap_or(0)
    }

    fn snapshot_matching(
        &self,
        space: SpaceId,
        part: PartitionId,
        accept: impl Fn(&[u8]) -> bool,
    ) -> Vec<KvPair> {
        let parts = self.parts.read();
        match parts.get(&(space, part)) {
            Some(table) => table
                .iter()
                .filter(|(k, _)| accept(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Snapshot cursor over a prefix or range scan.
struct SnapshotIter {
    entries: Vec<KvPair>,
    pos: usize,
}

impl KvIterator for SnapshotIter {
    fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn val(&self) -> &[u8] {
        &self.entries[self.pos].1
    }

    fn next(&mut self) {
        self.pos += 1;
    }
}

impl KvEngine for MemoryEngine {
    fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> Result<Vec<u8>, ResultCode> {
        let parts = self.parts.read();
        parts
            .get(&(space, part))
            .and_then(|t| t.get(key).cloned())
            .ok_or(ResultCode::ErrKeyNotFound)
    }

    fn multi_get(
        &self,
        space: SpaceId,
        part: PartitionId,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>, ResultCode> {
        let parts = self.parts.read();
        let table = parts.get(&(space, part)).ok_or(ResultCode::ErrKeyNotFound)?;
        keys.iter()
            .map(|k| table.get(k).cloned().ok_or(ResultCode::ErrKeyNotFound))
            .collect()
    }

    fn prefix<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>, ResultCode> {
        let entries = self.snapshot_matching(space, part, |k| k.starts_with(prefix));
        Ok(Box::new(SnapshotIter { entries, pos: 0 }))
    }

    fn range<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        start: &[u8],
        end: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>, ResultCode> {
        let entries = self.snapshot_matching(space, part, |k| k >= start && k < end);
        Ok(Box::new(SnapshotIter { entries, pos: 0 }))
    }

    fn async_multi_put(&self, space: SpaceId, part: PartitionId, kvs: Vec<KvPair>, cb: KvCallback) {
        {
            let mut parts = self.parts.write();
            let table = parts.entry((space, part)).or_default();
            for (k, v) in kvs {
                table.insert(k, v);
            }
        }
        cb(ResultCode::Succeeded);
    }

    fn async_remove(&self, space: SpaceId, part: PartitionId, key: &[u8], cb: KvCallback) {
        {
            let mut parts = self.parts.write();
            if let Some(table) = parts.get_mut(&(space, part)) {
                table.remove(key);
            }
        }
        cb(ResultCode::Succeeded);
    }

    fn async_multi_remove(
        &self,
        space: SpaceId,
        part: PartitionId,
        keys: Vec<Vec<u8>>,
        cb: KvCallback,
    ) {
        {
            let mut parts = self.parts.write();
            if let Some(table) = parts.get_mut(&(space, part)) {
                for k in &keys {
                    table.remove(k);
                }
            }
        }
        cb(ResultCode::Succeeded);
    }

    fn async_remove_range(
        &self,
        space: SpaceId,
        part: PartitionId,
        start: &[u8],
        end: &[u8],
        cb: KvCallback,
    ) {
        {
            let mut parts = self.parts.write();
            if let Some(table) = parts.get_mut(&(space, part)) {
                let doomed: Vec<Vec<u8>> = table
                    .range(start.to_vec()..end.to_vec())
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in doomed {
                    table.remove(&k);
                }
            }
        }
        cb(ResultCode::Succeeded);
    }

    fn part(&self, _space: SpaceId, _part: PartitionId) -> Result<Part, ResultCode> {
        Ok(Part::new(self.peers.read().clone()))
    }

    fn is_leader(&self, _space: SpaceId, _part: PartitionId) -> bool {
        *self.leader.read()
    }

    fn backup_table(
        &self,
        space: SpaceId,
        name: &str,
        table_prefix: &[u8],
        filter: &dyn Fn(&[u8]) -> bool,
    ) -> Result<Vec<String>, ResultCode> {
        let matched = self.snapshot_matching(space, 0, |k| k.starts_with(table_prefix) && filter(k));
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        // Synthesize one SST path per exported table, as the disk engine
        // names them under the checkpoint directory.
        Ok(vec![format!(
            "{}/{}.sst",
            name,
            String::from_utf8_lossy(table_prefix).trim_end_matches('_')
        )])
    }
}

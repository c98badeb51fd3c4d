//! Storage-host admin RPC surface and the snapshot coordinator.
//!
//! The coordinator walks the part table to learn which hosts serve which
//! spaces, then drives per-host admin calls: blocking-writes signals,
//! checkpoint creation and checkpoint removal. Checkpoint removal is
//! best-effort by design; cleanup must not fail because one host is already
//! gone.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::{MetaError, MetaResult};
use crate::meta::keys;
use crate::meta::locks::{LockName, LockRegistry};
use crate::meta::store::MetaStore;
use crate::types::{CheckpointInfo, HostAddr, SpaceId};

/// Direction of a blocking-writes signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSign {
    /// Stop accepting writes.
    BlockOn,
    /// Resume accepting writes.
    BlockOff,
}

/// Admin RPC surface of a storage host.
pub trait AdminClient: Send + Sync {
    /// Create a checkpoint for one space; returns its directory.
    fn create_snapshot(&self, space: SpaceId, name: &str, host: &HostAddr)
        -> MetaResult<String>;

    /// Drop a checkpoint for one space.
    fn drop_snapshot(&self, space: SpaceId, name: &str, host: &HostAddr) -> MetaResult<()>;

    /// Toggle write blocking for one space.
    fn blocking_writes(&self, space: SpaceId, sign: BlockSign, host: &HostAddr) -> MetaResult<()>;
}

/// Coordinator of storage-side snapshot operations.
pub struct Snapshot<'a> {
    store: &'a MetaStore,
    locks: &'a LockRegistry,
    client: &'a dyn AdminClient,
    spaces: BTreeSet<SpaceId>,
}

impl<'a> Snapshot<'a> {
    /// A coordinator spanning every space.
    pub fn new(store: &'a MetaStore, locks: &'a LockRegistry, client: &'a dyn AdminClient) -> Self {
        Self {
            store,
            locks,
            client,
            spaces: BTreeSet::new(),
        }
    }

    /// Restrict the coordinator to a set of spaces.
    pub fn set_spaces(&mut self, spaces: impl IntoIterator<Item = SpaceId>) {
        self.spaces = spaces.into_iter().collect();
    }

    /// Hosts serving each space, derived from the part table.
    pub fn spaces_hosts(&self) -> MetaResult<BTreeMap<SpaceId, BTreeSet<HostAddr>>> {
        let _guard = self.locks.read(LockName::Space);
        let mut iter = self
            .store
            .prefix(&keys::part_prefix_all())
            .map_err(Self::to_host_meta_error)?;

        let mut hosts_by_space: BTreeMap<SpaceId, BTreeSet<HostAddr>> = BTreeMap::new();
        while iter.valid() {
            let space = keys::parse_part_key_space_id(iter.key())?;
            if self.spaces.is_empty() || self.spaces.contains(&space) {
                for host in keys::parse_part_val(iter.val())? {
                    hosts_by_space.entry(space).or_default().insert(host);
                }
            }
            iter.next();
        }
        Ok(hosts_by_space)
    }

    fn to_host_meta_error(e: MetaError) -> MetaError {
        // Everything except a leader change collapses into a store failure
        // for the caller.
        if e == MetaError::LeaderChanged {
            e
        } else {
            MetaError::StoreFailure
        }
    }

    /// Create a checkpoint on every (space, host) pair.
    ///
    /// The first host failure aborts the remaining calls.
    pub fn create_snapshot(
        &self,
        name: &str,
    ) -> MetaResult<HashMap<SpaceId, Vec<CheckpointInfo>>> {
        let spaces_hosts = self.spaces_hosts()?;
        let mut info: HashMap<SpaceId, Vec<CheckpointInfo>> = HashMap::new();
        for (space, hosts) in &spaces_hosts {
            for host in hosts {
                let dir = self
                    .client
                    .create_snapshot(*space, name, host)
                    .map_err(|_| MetaError::RpcFailure)?;
                info.entry(*space).or_default().push(CheckpointInfo {
                    host: *host,
                    checkpoint_dir: dir,
                });
            }
        }
        Ok(info)
    }

    /// Drop a checkpoint on the given hosts, best-effort.
    ///
    /// Per-host failures are logged and skipped; the call reports success
    /// unless the host enumeration itself failed.
    pub fn drop_snapshot(&self, name: &str, hosts: &[HostAddr]) -> MetaResult<()> {
        let spaces_hosts = self.spaces_hosts()?;
        for (space, space_hosts) in &spaces_hosts {
            for host in space_hosts {
                if !hosts.contains(host) {
                    continue;
                }
                if let Err(e) = self.client.drop_snapshot(*space, name, host) {
                    error!(
                        snapshot = name,
                        space = *space,
                        host = %host,
                        error = %e,
                        "failed to drop checkpoint"
                    );
                }
            }
        }
        Ok(())
    }

    /// Toggle write blocking on every (space, host) pair.
    ///
    /// A failed BLOCK_ON stops immediately so the caller can roll back; a
    /// failed BLOCK_OFF keeps signalling the remaining hosts.
    pub fn blocking_writes(&self, sign: BlockSign) -> MetaResult<()> {
        let spaces_hosts = self.spaces_hosts()?;
        let mut result = Ok(());
        'outer: for (space, hosts) in &spaces_hosts {
            for host in hosts {
                info!(space = *space, host = %host, ?sign, "signalling write blocking");
                if self.client.blocking_writes(*space, sign, host).is_err() {
                    error!(space = *space, host = %host, "blocking-writes signal failed");
                    result = Err(MetaError::BlockWriteFailure);
                    if sign == BlockSign::BlockOn {
                        break 'outer;
                    }
                }
            }
        }
        result
    }
}

/// Recording in-memory [`AdminClient`] for tests.
///
/// Calls are journaled in order; individual hosts can be primed to fail
/// specific operations.
#[derive(Default)]
pub struct RecordingAdminClient {
    calls: Mutex<Vec<String>>,
    fail_blocking: Mutex<Vec<HostAddr>>,
    fail_create: Mutex<Vec<HostAddr>>,
}

impl RecordingAdminClient {
    /// A client that succeeds everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail blocking-writes signals sent to `host`.
    pub fn fail_blocking_on(&self, host: HostAddr) {
        self.fail_blocking.lock().push(host);
    }

    /// Fail checkpoint creation on `host`.
    pub fn fail_create_on(&self, host: HostAddr) {
        self.fail_create.lock().push(host);
    }

    /// The journaled calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, line: String) {
        self.calls.lock().push(line);
    }
}

impl AdminClient for RecordingAdminClient {
    fn create_snapshot(
        &self,
        space: SpaceId,
        name: &str,
        host: &HostAddr,
    ) -> MetaResult<String> {
        self.record(format!("create {space} {name} {host}"));
        if self.fail_create.lock().contains(host) {
            return Err(MetaError::RpcFailure);
        }
        Ok(format!("/data/checkpoints/{name}/{space}"))
    }

    fn drop_snapshot(&self, space: SpaceId, name: &str, host: &HostAddr) -> MetaResult<()> {
        self.record(format!("drop {space} {name} {host}"));
        Ok(())
    }

    fn blocking_writes(
        &self,
        space: SpaceId,
        sign: BlockSign,
        host: &HostAddr,
    ) -> MetaResult<()> {
        let label = match sign {
            BlockSign::BlockOn => "block_on",
            BlockSign::BlockOff => "block_off",
        };
        self.record(format!("{label} {space} {host}"));
        if sign == BlockSign::BlockOn && self.fail_blocking.lock().contains(host) {
            return Err(MetaError::BlockWriteFailure);
        }
        Ok(())
    }
}

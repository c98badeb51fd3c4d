//! Backup orchestration over the snapshot coordinator.
//!
//! The protocol order is strict and observable: block writes, checkpoint
//! storage, export the meta SST files, unblock writes, commit the snapshot
//! record. Any failure after blocking attempts a best-effort unblock before
//! reporting, so a failed backup never leaves the cluster unwritable.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{MetaError, MetaResult};
use crate::meta::admin::{AdminClient, BlockSign, Snapshot};
use crate::meta::hosts::ActiveHostsMan;
use crate::meta::keys;
use crate::meta::last_update;
use crate::meta::locks::LockName;
use crate::meta::processor::Processor;
use crate::types::{BackupMeta, SnapshotStatus, SpaceBackupInfo, SpaceId};

/// CREATE BACKUP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBackupReq {
    /// Space names to back up; `None` backs up every space.
    pub spaces: Option<Vec<String>>,
}

impl Processor {
    /// Run the backup protocol and return the manifest.
    pub fn create_backup(
        &self,
        req: CreateBackupReq,
        client: &dyn AdminClient,
    ) -> MetaResult<BackupMeta> {
        if !self.store().is_leader() {
            return Err(MetaError::LeaderChanged);
        }

        if self.is_index_rebuilding()? {
            error!("index rebuild running, backup rejected");
            return Err(MetaError::BackupBuildingIndex);
        }

        let _snapshot_guard = self.locks().write(LockName::Snapshot);

        let hosts =
            ActiveHostsMan::active_hosts(self.store(), self.config(), last_update::now_ms())?;
        if hosts.is_empty() {
            error!("no active hosts, backup rejected");
            return Err(MetaError::NoHosts);
        }

        let spaces = self.space_names_to_ids(req.spaces.as_deref())?;

        let backup_name = format!("BACKUP_{}", keys::timestamp_str());
        self.do_put(vec![(
            keys::snapshot_key(&backup_name),
            keys::snapshot_val(SnapshotStatus::Invalid, &keys::host_addrs_str(&hosts)),
        )])?;

        let mut coordinator = Snapshot::new(self.store(), self.locks(), client);
        coordinator.set_spaces(spaces.iter().copied());

        // Block writes on every storage engine first.
        if let Err(e) = coordinator.blocking_writes(BlockSign::BlockOn) {
            error!(backup = %backup_name, "blocking writes failed, rolling back");
            self.unblock_best_effort(&coordinator);
            return Err(e);
        }

        // Checkpoint every storage engine under the write block.
        let checkpoints = match coordinator.create_snapshot(&backup_name) {
            Ok(info) => info,
            Err(e) => {
                error!(backup = %backup_name, "storage checkpoint failed, rolling back");
                self.unblock_best_effort(&coordinator);
                return Err(e);
            }
        };

        // Export the meta tables as SST files.
        let meta_files = match self.export_meta(&backup_name, &spaces) {
            Ok(files) => files,
            Err(_) => {
                error!(backup = %backup_name, "meta export failed, rolling back");
                self.unblock_best_effort(&coordinator);
                return Err(MetaError::BackupFailure);
            }
        };

        coordinator.blocking_writes(BlockSign::BlockOff)?;

        // Checkpoints confirmed everywhere; promote the record.
        self.do_put(vec![(
            keys::snapshot_key(&backup_name),
            keys::snapshot_val(SnapshotStatus::Valid, &keys::host_addrs_str(&hosts)),
        )])?;

        let mut backup_info = HashMap::new();
        for space in &spaces {
            let desc = keys::parse_space_desc(&self.store().get(&keys::space_key(*space))?)?;
            backup_info.insert(
                *space,
                SpaceBackupInfo {
                    space: desc,
                    cp_dirs: checkpoints.get(space).cloned().unwrap_or_default(),
                },
            );
        }

        info!(backup = %backup_name, files = meta_files.len(), "backup done");
        Ok(BackupMeta {
            meta_files,
            backup_info,
            backup_name,
        })
    }

    /// Whether any index rebuild status row reports RUNNING.
    fn is_index_rebuilding(&self) -> MetaResult<bool> {
        let _guard = self.locks().read(LockName::Space);
        let mut iter = self.store().prefix(&keys::index_status_prefix())?;
        while iter.valid() {
            if iter.val() == keys::INDEX_STATUS_RUNNING {
                return Ok(true);
            }
            iter.next();
        }
        Ok(false)
    }

    /// Resolve the requested space names, or enumerate every space.
    fn space_names_to_ids(&self, names: Option<&[String]>) -> MetaResult<HashSet<SpaceId>> {
        let _guard = self.locks().read(LockName::Space);
        let mut spaces = HashSet::new();
        match names {
            Some(names) if !names.is_empty() => {
                let name_keys: Vec<Vec<u8>> =
                    names.iter().map(|n| keys::space_name_key(n)).collect();
                let values = self.store().multi_get(&name_keys).map_err(|e| {
                    error!(error = %e, "resolving backup spaces failed");
                    e
                })?;
                for val in values {
                    spaces.insert(keys::parse_id(&val)?);
                }
            }
            _ => {
                let mut iter = self.store().prefix(&keys::space_prefix())?;
                while iter.valid() {
                    spaces.insert(keys::parse_space_key(iter.key())?);
                    iter.next();
                }
            }
        }
        if spaces.is_empty() {
            error!("no space matches the backup request");
            return Err(MetaError::BackupSpaceNotFound);
        }
        Ok(spaces)
    }

    /// Export the meta tables covering the chosen spaces.
    fn export_meta(&self, name: &str, spaces: &HashSet<SpaceId>) -> MetaResult<Vec<String>> {
        let mut files = Vec::new();
        // Space-scoped tables are filtered to the chosen spaces; the global
        // host table ships whole.
        for prefix in [keys::space_prefix(), keys::part_prefix_all()] {
            let exported = self.store().backup_table(name, &prefix, &|key| {
                keys::parse_space_key(key)
                    .or_else(|_| keys::parse_part_key_space_id(key))
                    .map(|space| spaces.contains(&space))
                    .unwrap_or(false)
            })?;
            files.extend(exported);
        }
        files.extend(self.store().backup_table(name, &keys::host_prefix(), &|_| true)?);
        Ok(files)
    }

    fn unblock_best_effort(&self, coordinator: &Snapshot<'_>) {
        if coordinator.blocking_writes(BlockSign::BlockOff).is_err() {
            error!("failed to cancel write blocking");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LivenessConfig;
    use crate::kvstore::memory::MemoryEngine;
    use crate::meta::admin::RecordingAdminClient;
    use crate::meta::processors::create_space::CreateSpaceReq;
    use crate::meta::processors::heartbeat::HeartbeatReq;
    use crate::types::{HostAddr, HostRole, SpaceDesc};

    fn processor_with_cluster() -> (Processor, Vec<HostAddr>) {
        let p = Processor::new(MemoryEngine::new(), LivenessConfig::default());
        let hosts = vec![HostAddr::localhost(1), HostAddr::localhost(2)];
        for host in &hosts {
            p.heartbeat(HeartbeatReq {
                host: *host,
                role: HostRole::Storage,
                git_sha: "sha".into(),
            })
            .unwrap();
        }
        for name in ["S1", "S2"] {
            p.create_space(CreateSpaceReq {
                properties: SpaceDesc {
                    space_name: name.into(),
                    partition_num: 2,
                    replica_factor: 2,
                    vid_len: 8,
                    int_vid: false,
                },
                if_not_exists: false,
            })
            .unwrap();
        }
        (p, hosts)
    }

    #[test]
    fn happy_path_commits_a_valid_record() {
        let (p, hosts) = processor_with_cluster();
        let client = RecordingAdminClient::new();

        let meta = p
            .create_backup(CreateBackupReq { spaces: None }, &client)
            .unwrap();

        assert!(meta.backup_name.starts_with("BACKUP_"));
        assert!(!meta.meta_files.is_empty());
        assert_eq!(meta.backup_info.len(), 2);
        for info in meta.backup_info.values() {
            assert!(!info.cp_dirs.is_empty());
        }

        let record = p
            .store()
            .get(&keys::snapshot_key(&meta.backup_name))
            .unwrap();
        assert_eq!(
            keys::parse_snapshot_status(&record).unwrap(),
            SnapshotStatus::Valid
        );
        assert_eq!(
            keys::parse_snapshot_hosts(&record).unwrap(),
            keys::host_addrs_str(&hosts)
        );

        // Protocol order: every block_on precedes every create, which
        // precedes every block_off.
        let calls = client.calls();
        let last_on = calls.iter().rposition(|c| c.starts_with("block_on")).unwrap();
        let first_create = calls.iter().position(|c| c.starts_with("create")).unwrap();
        let first_off = calls.iter().position(|c| c.starts_with("block_off")).unwrap();
        assert!(last_on < first_create);
        assert!(first_create < first_off);
    }

    #[test]
    fn blocking_failure_aborts_and_unblocks() {
        let (p, hosts) = processor_with_cluster();
        let client = RecordingAdminClient::new();
        client.fail_blocking_on(hosts[1]);

        let err = p
            .create_backup(CreateBackupReq { spaces: None }, &client)
            .unwrap_err();
        assert_eq!(err, MetaError::BlockWriteFailure);

        // The invalid record is left behind, never promoted.
        let iter = p.store().prefix(&keys::snapshot_prefix()).unwrap();
        assert!(iter.valid());
        assert_eq!(
            keys::parse_snapshot_status(iter.val()).unwrap(),
            SnapshotStatus::Invalid
        );
        drop(iter);

        // A rollback signalled BLOCK_OFF on every (space, host) pair.
        let calls = client.calls();
        let offs = calls.iter().filter(|c| c.starts_with("block_off")).count();
        assert_eq!(offs, 4);
        assert!(!calls.iter().any(|c| c.starts_with("create")));
    }

    #[test]
    fn checkpoint_failure_aborts_and_unblocks() {
        let (p, hosts) = processor_with_cluster();
        let client = RecordingAdminClient::new();
        client.fail_create_on(hosts[0]);

        let err = p
            .create_backup(CreateBackupReq { spaces: None }, &client)
            .unwrap_err();
        assert_eq!(err, MetaError::RpcFailure);
        assert!(client.calls().iter().any(|c| c.starts_with("block_off")));
    }

    #[test]
    fn named_subset_restricts_spaces() {
        let (p, _hosts) = processor_with_cluster();
        let client = RecordingAdminClient::new();

        let meta = p
            .create_backup(
                CreateBackupReq {
                    spaces: Some(vec!["S2".into()]),
                },
                &client,
            )
            .unwrap();
        assert_eq!(meta.backup_info.len(), 1);
        let space = meta.backup_info.values().next().unwrap();
        assert_eq!(space.space.space_name, "S2");
    }

    #[test]
    fn unknown_space_name_fails() {
        let (p, _hosts) = processor_with_cluster();
        let client = RecordingAdminClient::new();
        assert_eq!(
            p.create_backup(
                CreateBackupReq {
                    spaces: Some(vec!["ghost".into()]),
                },
                &client,
            )
            .unwrap_err(),
            MetaError::NotFound
        );
    }

    #[test]
    fn rebuilding_index_blocks_backup() {
        let (p, _hosts) = processor_with_cluster();
        let client = RecordingAdminClient::new();
        p.do_put(vec![(
            keys::index_status_key(1, "i1"),
            keys::INDEX_STATUS_RUNNING.to_vec(),
        )])
        .unwrap();

        assert_eq!(
            p.create_backup(CreateBackupReq { spaces: None }, &client)
                .unwrap_err(),
            MetaError::BackupBuildingIndex
        );
    }

    #[test]
    fn follower_rejects_backup() {
        let engine = MemoryEngine::new();
        engine.set_leader(false);
        let p = Processor::new(engine, LivenessConfig::default());
        let client = RecordingAdminClient::new();
        assert_eq!(
            p.create_backup(CreateBackupReq { spaces: None }, &client)
                .unwrap_err(),
            MetaError::LeaderChanged
        );
    }
}

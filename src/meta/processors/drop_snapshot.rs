//! Snapshot removal.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{MetaError, MetaResult};
use crate::meta::admin::{AdminClient, Snapshot};
use crate::meta::keys;
use crate::meta::locks::LockName;
use crate::meta::processor::Processor;

/// DROP SNAPSHOT request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSnapshotReq {
    /// Name of the snapshot to drop.
    pub name: String,
}

impl Processor {
    /// Drop the storage-side checkpoints of a snapshot, best-effort, then
    /// remove its record.
    pub fn drop_snapshot(&self, req: DropSnapshotReq, client: &dyn AdminClient) -> MetaResult<()> {
        let _guard = self.locks().write(LockName::Snapshot);

        let record = match self.store().get(&keys::snapshot_key(&req.name)) {
            Ok(val) => val,
            // Dropping an unknown snapshot is a no-op.
            Err(MetaError::NotFound) => return Ok(()),
            Err(e) => {
                error!(snapshot = %req.name, error = %e, "reading snapshot record failed");
                return Err(e);
            }
        };
        let hosts = keys::parse_host_addrs_str(&keys::parse_snapshot_hosts(&record)?)?;

        let coordinator = Snapshot::new(self.store(), self.locks(), client);
        coordinator.drop_snapshot(&req.name, &hosts)?;

        self.do_multi_remove_and_update(vec![keys::snapshot_key(&req.name)])?;
        info!(snapshot = %req.name, "dropped snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LivenessConfig;
    use crate::kvstore::memory::MemoryEngine;
    use crate::meta::admin::RecordingAdminClient;
    use crate::types::{HostAddr, SnapshotStatus};

    #[test]
    fn drop_removes_record_and_calls_hosts() {
        let p = Processor::new(MemoryEngine::new(), LivenessConfig::default());
        let host = HostAddr::localhost(1);
        p.do_put(vec![
            (keys::part_key(1, 1), keys::part_val(&[host])),
            (
                keys::snapshot_key("BACKUP_x"),
                keys::snapshot_val(SnapshotStatus::Valid, &keys::host_addrs_str(&[host])),
            ),
        ])
        .unwrap();

        let client = RecordingAdminClient::new();
        p.drop_snapshot(
            DropSnapshotReq {
                name: "BACKUP_x".into(),
            },
            &client,
        )
        .unwrap();

        assert!(p.store().get(&keys::snapshot_key("BACKUP_x")).is_err());
        assert!(client.calls().iter().any(|c| c.starts_with("drop")));
    }

    #[test]
    fn unknown_snapshot_is_a_noop() {
        let p = Processor::new(MemoryEngine::new(), LivenessConfig::default());
        let client = RecordingAdminClient::new();
        p.drop_snapshot(
            DropSnapshotReq {
                name: "ghost".into(),
            },
            &client,
        )
        .unwrap();
        assert!(client.calls().is_empty());
    }
}

//! Space creation.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{MetaError, MetaResult};
use crate::kvstore::KvPair;
use crate::meta::hosts::ActiveHostsMan;
use crate::meta::keys;
use crate::meta::last_update;
use crate::meta::locks::LockName;
use crate::meta::processor::Processor;
use crate::types::{SpaceDesc, SpaceId};

/// CREATE SPACE request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSpaceReq {
    /// Properties of the new space.
    pub properties: SpaceDesc,
    /// Succeed silently when the space already exists.
    pub if_not_exists: bool,
}

impl Processor {
    /// Create a space: allocate its id, record both name-index and
    /// descriptor keys and place its partitions over the active hosts.
    ///
    /// Holds the snapshot lock shared so topology cannot change under an
    /// in-flight backup, which owns it exclusive.
    pub fn create_space(&self, req: CreateSpaceReq) -> MetaResult<SpaceId> {
        let _snapshot_guard = self.locks().read(LockName::Snapshot);
        let _space_guard = self.locks().write(LockName::Space);
        let name = req.properties.space_name.clone();

        match self.get_space_id(&name) {
            Ok(existing) => {
                if req.if_not_exists {
                    return Ok(existing);
                }
                error!(space = %name, "space already exists");
                return Err(MetaError::AlreadyExists);
            }
            Err(MetaError::NotFound) => {}
            Err(e) => return Err(e),
        }

        if req.properties.partition_num <= 0 || req.properties.replica_factor <= 0 {
            return Err(MetaError::InvalidOperation);
        }

        let hosts =
            ActiveHostsMan::active_hosts(self.store(), self.config(), last_update::now_ms())?;
        if hosts.is_empty() {
            error!(space = %name, "no active hosts to place partitions on");
            return Err(MetaError::NoHosts);
        }
        let replica = req.properties.replica_factor as usize;
        if hosts.len() < replica {
            error!(
                space = %name,
                active = hosts.len(),
                replica,
                "not enough active hosts for the replica factor"
            );
            return Err(MetaError::NoHosts);
        }

        let space_id = self.auto_increment_id()?;
        let mut data: Vec<KvPair> = vec![
            (keys::space_name_key(&name), keys::id_val(space_id)),
            (keys::space_key(space_id), keys::space_val(&req.properties)),
        ];

        // Round-robin placement: partition p gets the next `replica` hosts
        // starting at offset p.
        for part in 1..=req.properties.partition_num {
            let mut replicas = Vec::with_capacity(replica);
            for r in 0..replica {
                replicas.push(hosts[(part as usize + r) % hosts.len()]);
            }
            data.push((keys::part_key(space_id, part), keys::part_val(&replicas)));
        }

        self.do_put_and_update(data)?;
        info!(space = %name, space_id, "created space");
        Ok(space_id)
    }
}

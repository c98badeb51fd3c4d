//! Space removal with cascading cleanup.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{MetaError, MetaResult};
use crate::meta::keys;
use crate::meta::locks::LockName;
use crate::meta::processor::Processor;

/// DROP SPACE request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSpaceReq {
    /// Name of the space to drop.
    pub space_name: String,
    /// Succeed silently when the space does not exist.
    pub if_exists: bool,
}

impl Processor {
    /// Drop a space and every key scoped to it: placement rows, both space
    /// keys, role grants, listeners and the statistics row.
    pub fn drop_space(&self, req: DropSpaceReq) -> MetaResult<()> {
        let _snapshot_guard = self.locks().read(LockName::Snapshot);
        let _space_guard = self.locks().write(LockName::Space);

        let space_id = match self.get_space_id(&req.space_name) {
            Ok(id) => id,
            Err(MetaError::NotFound) if req.if_exists => return Ok(()),
            Err(e) => {
                error!(space = %req.space_name, error = %e, "drop space failed");
                return Err(e);
            }
        };

        let mut delete_keys = Vec::new();

        let mut part_iter = self.store().prefix(&keys::part_prefix(space_id))?;
        while part_iter.valid() {
            delete_keys.push(part_iter.key().to_vec());
            part_iter.next();
        }
        drop(part_iter);

        delete_keys.push(keys::space_name_key(&req.space_name));
        delete_keys.push(keys::space_key(space_id));

        let mut role_iter = self.store().prefix(&keys::role_space_prefix(space_id))?;
        while role_iter.valid() {
            debug!(
                user = %keys::parse_role_user(role_iter.key())?,
                space = space_id,
                "revoking role with the space"
            );
            delete_keys.push(role_iter.key().to_vec());
            role_iter.next();
        }
        drop(role_iter);

        let mut listener_iter = self.store().prefix(&keys::listener_prefix(space_id))?;
        while listener_iter.valid() {
            delete_keys.push(listener_iter.key().to_vec());
            listener_iter.next();
        }
        drop(listener_iter);

        // The statistics row may not exist; removing an absent key is a
        // no-op in the engine.
        delete_keys.push(keys::statis_key(space_id));

        self.do_multi_remove_and_update(delete_keys)?;
        info!(space = %req.space_name, space_id, "dropped space");
        Ok(())
    }
}

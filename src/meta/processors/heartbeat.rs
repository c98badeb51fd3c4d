//! Host heartbeat processing.
//!
//! Hosts enter the registry through their first heartbeat and stay alive by
//! repeating it; the liveness reporter classifies them from the recorded
//! timestamp. Heartbeats do not bump the last-update timestamp, they carry
//! no metadata clients would cache.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetaResult;
use crate::meta::keys;
use crate::meta::last_update;
use crate::meta::processor::Processor;
use crate::types::{HostAddr, HostInfo, HostRole};

/// One host heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatReq {
    /// Reporting host.
    pub host: HostAddr,
    /// Role the host serves.
    pub role: HostRole,
    /// Git SHA the host binary was built from.
    pub git_sha: String,
}

impl Processor {
    /// Upsert the host record with the current wall clock.
    pub fn heartbeat(&self, req: HeartbeatReq) -> MetaResult<()> {
        let info = HostInfo {
            role: req.role,
            last_heartbeat_ms: last_update::now_ms(),
            git_sha: req.git_sha,
        };
        debug!(host = %req.host, role = ?info.role, "heartbeat");
        self.do_put(vec![(keys::host_key(&req.host), keys::host_val(&info))])
    }
}

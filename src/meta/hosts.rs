//! Host liveness bookkeeping.
//!
//! A host's state is a deterministic function of its heartbeat age alone:
//! fresh heartbeats are online, stale ones are offline, and records past the
//! removal threshold are forgotten entirely. The list-hosts processor uses
//! the same windows to classify rows and to collect forgotten keys for
//! asynchronous removal.

use crate::config::LivenessConfig;
use crate::error::MetaResult;
use crate::meta::keys;
use crate::meta::store::MetaStore;
use crate::types::HostAddr;

/// Liveness classification of one host record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLiveness {
    /// Heartbeat within the online window.
    Online,
    /// Heartbeat stale, record kept.
    Offline,
    /// Record old enough to be removed.
    Expired,
}

/// Classify a host record by heartbeat age.
pub fn classify(now_ms: i64, last_heartbeat_ms: i64, config: &LivenessConfig) -> HostLiveness {
    let age = now_ms - last_heartbeat_ms;
    if age >= config.removed_threshold_ms() {
        HostLiveness::Expired
    } else if age >= config.online_window_ms() {
        HostLiveness::Offline
    } else {
        HostLiveness::Online
    }
}

/// Registry view over the persisted host records.
pub struct ActiveHostsMan;

impl ActiveHostsMan {
    /// Hosts whose heartbeat is within the online window.
    pub fn active_hosts(
        store: &MetaStore,
        config: &LivenessConfig,
        now_ms: i64,
    ) -> MetaResult<Vec<HostAddr>> {
        let mut hosts = Vec::new();
        let mut iter = store.prefix(&keys::host_prefix())?;
        while iter.valid() {
            let addr = keys::parse_host_key(iter.key())?;
            let info = keys::parse_host_val(iter.val())?;
            if classify(now_ms, info.last_heartbeat_ms, config) == HostLiveness::Online {
                hosts.push(addr);
            }
            iter.next();
        }
        Ok(hosts)
    }

}

//! Host listing with liveness, leadership and placement joins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{MetaError, MetaResult};
use crate::meta::hosts::{classify, ActiveHostsMan, HostLiveness};
use crate::meta::keys;
use crate::meta::last_update;
use crate::meta::locks::LockName;
use crate::meta::processor::Processor;
use crate::meta::store::{DEFAULT_PART_ID, DEFAULT_SPACE_ID};
use crate::meta::GIT_INFO_SHA;
use crate::types::{HostItem, HostRole, HostStatus, ListHostType, SpaceId};

/// LIST HOSTS request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListHostsReq {
    /// Host class to report.
    pub host_type: ListHostType,
}

struct ListHostsContext {
    space_ids: Vec<SpaceId>,
    space_names: HashMap<SpaceId, String>,
    items: Vec<HostItem>,
}

impl Processor {
    /// List hosts of one class.
    ///
    /// META rows are synthesized from the meta Raft peer list; GRAPH and
    /// STORAGE rows come from heartbeat records with expired records
    /// scheduled for removal; ALLOC additionally joins leadership and
    /// placement onto the storage rows.
    pub fn list_hosts(&self, req: ListHostsReq) -> MetaResult<Vec<HostItem>> {
        let mut ctx = ListHostsContext {
            space_ids: Vec::new(),
            space_names: HashMap::new(),
            items: Vec::new(),
        };
        {
            let _guard = self.locks().read(LockName::Space);
            self.space_id_name_map(&mut ctx)?;
            match req.host_type {
                ListHostType::Alloc => {
                    self.fill_leaders(&mut ctx)?;
                    self.fill_all_parts(&mut ctx)?;
                }
                ListHostType::Meta => self.all_meta_hosts_status(&mut ctx)?,
                ListHostType::Graph => self.all_hosts_with_status(&mut ctx, HostRole::Graph)?,
                ListHostType::Storage => self.all_hosts_with_status(&mut ctx, HostRole::Storage)?,
            }
        }
        Ok(ctx.items)
    }

    /// Every meta peer is reported online with the local build's SHA; the
    /// peers share one binary by deployment convention.
    fn all_meta_hosts_status(&self, ctx: &mut ListHostsContext) -> MetaResult<()> {
        let part = self.store().part()?;
        for peer in part.peers() {
            ctx.items.push(HostItem::new(
                *peer,
                HostRole::Meta,
                GIT_INFO_SHA.to_string(),
                HostStatus::Online,
            ));
        }
        Ok(())
    }

    fn all_hosts_with_status(&self, ctx: &mut ListHostsContext, role: HostRole) -> MetaResult<()> {
        let now = last_update::now_ms();
        let mut remove_keys = Vec::new();
        {
            let mut iter = self
                .store()
                .prefix(&keys::host_prefix())
                .map_err(no_hosts_unless_leader_changed)?;
            while iter.valid() {
                let info = keys::parse_host_val(iter.val())?;
                if info.role != role {
                    iter.next();
                    continue;
                }
                let host = keys::parse_host_key(iter.key())?;
                match classify(now, info.last_heartbeat_ms, self.config()) {
                    HostLiveness::Online => ctx.items.push(HostItem::new(
                        host,
                        info.role,
                        info.git_sha,
                        HostStatus::Online,
                    )),
                    HostLiveness::Offline => ctx.items.push(HostItem::new(
                        host,
                        info.role,
                        info.git_sha,
                        HostStatus::Offline,
                    )),
                    HostLiveness::Expired => remove_keys.push(iter.key().to_vec()),
                }
                iter.next();
            }
        }
        self.remove_expired_hosts(remove_keys);
        Ok(())
    }

    /// Remove hosts long past the offline threshold, fire and forget.
    fn remove_expired_hosts(&self, remove_keys: Vec<Vec<u8>>) {
        if remove_keys.is_empty() {
            return;
        }
        info!(count = remove_keys.len(), "removing long-offline hosts");
        self.store().engine().async_multi_remove(
            DEFAULT_SPACE_ID,
            DEFAULT_PART_ID,
            remove_keys,
            Box::new(|code| {
                if code != crate::kvstore::ResultCode::Succeeded {
                    error!(?code, "failed to remove long-offline hosts");
                }
            }),
        );
    }

    fn fill_leaders(&self, ctx: &mut ListHostsContext) -> MetaResult<()> {
        self.all_hosts_with_status(ctx, HostRole::Storage)?;

        let active = ActiveHostsMan::active_hosts(self.store(), self.config(), last_update::now_ms())?;

        let mut iter = self
            .store()
            .prefix(&keys::leader_prefix())
            .map_err(no_hosts_unless_leader_changed)?;
        while iter.valid() {
            let (space, part) = keys::parse_leader_key(iter.key())?;
            let (host, _term, code) = keys::parse_leader_val(iter.val())?;
            if code != 0 {
                iter.next();
                continue;
            }
            if !active.contains(&host) {
                info!(host = %host, "skipping inactive leader entry");
                iter.next();
                continue;
            }
            let space_name = match ctx.space_names.get(&space) {
                Some(name) => name.clone(),
                // The space vanished between scans; its leader rows go with it.
                None => {
                    iter.next();
                    continue;
                }
            };
            if let Some(item) = ctx.items.iter_mut().find(|item| item.host == host) {
                item.leader_parts.entry(space_name).or_default().push(part);
            }
            iter.next();
        }
        Ok(())
    }

    fn fill_all_parts(&self, ctx: &mut ListHostsContext) -> MetaResult<()> {
        for &space in &ctx.space_ids {
            let space_name = match ctx.space_names.get(&space) {
                Some(name) => name.clone(),
                None => continue,
            };
            let mut iter = self.store().prefix(&keys::part_prefix(space))?;
            while iter.valid() {
                let part = keys::parse_part_key_part_id(iter.key())?;
                for host in keys::parse_part_val(iter.val())? {
                    if let Some(item) = ctx.items.iter_mut().find(|item| item.host == host) {
                        item.all_parts
                            .entry(space_name.clone())
                            .or_default()
                            .push(part);
                    }
                }
                iter.next();
            }
        }
        Ok(())
    }

    fn space_id_name_map(&self, ctx: &mut ListHostsContext) -> MetaResult<()> {
        let mut iter = self
            .store()
            .prefix(&keys::space_prefix())
            .map_err(no_hosts_unless_leader_changed)?;
        while iter.valid() {
            let space = keys::parse_space_key(iter.key())?;
            ctx.space_ids.push(space);
            ctx.space_names
                .insert(space, keys::parse_space_name(iter.val())?);
            iter.next();
        }
        Ok(())
    }
}

fn no_hosts_unless_leader_changed(e: MetaError) -> MetaError {
    if e == MetaError::LeaderChanged {
        e
    } else {
        MetaError::NoHosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LivenessConfig;
    use crate::kvstore::memory::MemoryEngine;
    use crate::kvstore::KvEngine;
    use crate::meta::processors::create_space::CreateSpaceReq;
    use crate::types::{HostAddr, HostInfo, SpaceDesc};
    use std::sync::Arc;

    fn processor() -> (Arc<MemoryEngine>, Processor) {
        let engine = MemoryEngine::new();
        let p = Processor::new(engine.clone(), LivenessConfig::default());
        (engine, p)
    }

    fn put_host(p: &Processor, host: HostAddr, role: HostRole, age_ms: i64) {
        let info = HostInfo {
            role,
            last_heartbeat_ms: last_update::now_ms() - age_ms,
            git_sha: "sha".into(),
        };
        p.do_put(vec![(keys::host_key(&host), keys::host_val(&info))])
            .unwrap();
    }

    #[test]
    fn meta_rows_come_from_the_peer_list() {
        let (engine, p) = processor();
        let peers = vec![HostAddr::localhost(1), HostAddr::localhost(2)];
        engine.set_peers(peers.clone());

        let items = p
            .list_hosts(ListHostsReq {
                host_type: ListHostType::Meta,
            })
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|i| i.status == HostStatus::Online && i.role == HostRole::Meta));
        assert_eq!(items[0].host, peers[0]);
    }

    #[test]
    fn storage_rows_classify_and_forget() {
        let (engine, p) = processor();
        let fresh = HostAddr::localhost(1);
        let stale = HostAddr::localhost(2);
        let ancient = HostAddr::localhost(3);
        put_host(&p, fresh, HostRole::Storage, 0);
        put_host(&p, stale, HostRole::Storage, 60_000);
        put_host(&p, ancient, HostRole::Storage, 2 * 24 * 60 * 60 * 1000);
        // A graph host never shows up in a storage listing.
        put_host(&p, HostAddr::localhost(4), HostRole::Graph, 0);

        let items = p
            .list_hosts(ListHostsReq {
                host_type: ListHostType::Storage,
            })
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].host, fresh);
        assert_eq!(items[0].status, HostStatus::Online);
        assert_eq!(items[1].host, stale);
        assert_eq!(items[1].status, HostStatus::Offline);

        // The ancient record was removed asynchronously.
        assert!(engine
            .get(DEFAULT_SPACE_ID, DEFAULT_PART_ID, &keys::host_key(&ancient))
            .is_err());
    }

    #[test]
    fn alloc_joins_leaders_and_parts() {
        let (_engine, p) = processor();
        let active = HostAddr::localhost(1);
        let inactive = HostAddr::localhost(2);
        put_host(&p, active, HostRole::Storage, 0);
        put_host(&p, inactive, HostRole::Storage, 60_000);

        let space_id = p
            .create_space(CreateSpaceReq {
                properties: SpaceDesc {
                    space_name: "S".into(),
                    partition_num: 2,
                    replica_factor: 1,
                    vid_len: 8,
                    int_vid: false,
                },
                if_not_exists: false,
            })
            .unwrap();

        p.do_put(vec![
            (keys::leader_key(space_id, 1), keys::leader_val(&active, 3, 0)),
            // Leader entries of inactive hosts are skipped.
            (keys::leader_key(space_id, 2), keys::leader_val(&inactive, 3, 0)),
        ])
        .unwrap();

        let items = p
            .list_hosts(ListHostsReq {
                host_type: ListHostType::Alloc,
            })
            .unwrap();

        let row = items.iter().find(|i| i.host == active).unwrap();
        assert_eq!(row.leader_parts["S"], vec![1]);
        assert!(!row.all_parts["S"].is_empty());

        let stale_row = items.iter().find(|i| i.host == inactive).unwrap();
        assert!(stale_row.leader_parts.is_empty());
    }

    #[test]
    fn poisoned_leader_entries_are_skipped() {
        let (_engine, p) = processor();
        let host = HostAddr::localhost(1);
        put_host(&p, host, HostRole::Storage, 0);
        p.do_put(vec![
            (keys::space_key(1), keys::space_val(&SpaceDesc {
                space_name: "S".into(),
                partition_num: 1,
                replica_factor: 1,
                vid_len: 8,
                int_vid: false,
            })),
            (keys::leader_key(1, 1), keys::leader_val(&host, 3, 1)),
        ])
        .unwrap();

        let items = p
            .list_hosts(ListHostsReq {
                host_type: ListHostType::Alloc,
            })
            .unwrap();
        assert!(items[0].leader_parts.is_empty());
    }
}

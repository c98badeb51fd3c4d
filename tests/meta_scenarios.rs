//! End-to-end scenarios over the metadata service public API.

use std::collections::HashSet;
use std::thread;

use canopy::config::LivenessConfig;
use canopy::error::MetaError;
use canopy::kvstore::memory::MemoryEngine;
use canopy::meta::admin::RecordingAdminClient;
use canopy::meta::processors::{
    CreateBackupReq, CreateSpaceReq, DropSpaceReq, HeartbeatReq, ListHostsReq,
};
use canopy::meta::{keys, last_update, Processor};
use canopy::types::{
    HostAddr, HostRole, HostStatus, ListHostType, ListenerType, RoleType, SnapshotStatus,
    SpaceDesc,
};

fn cluster(host_count: u16) -> (Processor, Vec<HostAddr>) {
    let p = Processor::new(MemoryEngine::new(), LivenessConfig::default());
    let hosts: Vec<HostAddr> = (1..=host_count).map(HostAddr::localhost).collect();
    for host in &hosts {
        p.heartbeat(HeartbeatReq {
            host: *host,
            role: HostRole::Storage,
            git_sha: "deadbeef".into(),
        })
        .unwrap();
    }
    (p, hosts)
}

fn space_desc(name: &str) -> SpaceDesc {
    SpaceDesc {
        space_name: name.into(),
        partition_num: 4,
        replica_factor: 1,
        vid_len: 8,
        int_vid: false,
    }
}

#[test]
fn create_then_drop_space_leaves_nothing_behind() {
    let (p, _hosts) = cluster(2);

    let space_id = p
        .create_space(CreateSpaceReq {
            properties: space_desc("S"),
            if_not_exists: false,
        })
        .unwrap();
    assert_eq!(space_id, 1);
    let t1 = last_update::get(p.store()).unwrap();
    assert!(t1 > 0);

    // Dependents a real deployment would accumulate.
    p.do_put(vec![
        (
            keys::role_key(space_id, "alice"),
            keys::role_val(RoleType::User),
        ),
        (
            keys::listener_key(space_id, ListenerType::Elasticsearch, 1),
            keys::listener_val(&HostAddr::localhost(9200)),
        ),
        (keys::statis_key(space_id), b"rows=0".to_vec()),
    ])
    .unwrap();

    p.drop_space(DropSpaceReq {
        space_name: "S".into(),
        if_exists: false,
    })
    .unwrap();
    let t2 = last_update::get(p.store()).unwrap();
    assert!(t2 >= t1);

    assert_eq!(p.get_space_id("S").unwrap_err(), MetaError::NotFound);
    assert_eq!(p.space_exist(space_id).unwrap_err(), MetaError::NotFound);
    for prefix in [
        keys::part_prefix(space_id),
        keys::role_space_prefix(space_id),
        keys::listener_prefix(space_id),
    ] {
        let iter = p.store().prefix(&prefix).unwrap();
        assert!(!iter.valid());
    }
    assert!(p.store().get(&keys::statis_key(space_id)).is_err());
}

#[test]
fn contended_id_allocation_is_a_dense_permutation() {
    let (p, _hosts) = cluster(1);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let p = p.clone();
        handles.push(thread::spawn(move || {
            (0..10)
                .map(|_| p.auto_increment_id().unwrap())
                .collect::<Vec<_>>()
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(ids, (1..=100).collect::<HashSet<_>>());
    assert_eq!(
        keys::parse_id(&p.store().get(keys::ID_KEY).unwrap()).unwrap(),
        100
    );
}

#[test]
fn backup_happy_path_commits_valid_record_with_active_hosts() {
    let (p, hosts) = cluster(2);
    for name in ["S1", "S2"] {
        p.create_space(CreateSpaceReq {
            properties: space_desc(name),
            if_not_exists: false,
        })
        .unwrap();
    }

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
        keys::parse_host_addrs_str(&keys::parse_snapshot_hosts(&record).unwrap()).unwrap(),
        hosts
    );
}

#[test]
fn backup_aborted_by_blocking_failure_rolls_back() {
    let (p, hosts) = cluster(2);
    p.create_space(CreateSpaceReq {
        properties: space_desc("S"),
        if_not_exists: false,
    })
    .unwrap();

    let client = RecordingAdminClient::new();
    client.fail_blocking_on(hosts[1]);

    assert_eq!(
        p.create_backup(CreateBackupReq { spaces: None }, &client)
            .unwrap_err(),
        MetaError::BlockWriteFailure
    );

    // The record stays INVALID and a BLOCK_OFF went out to the cluster.
    let iter = p.store().prefix(&keys::snapshot_prefix()).unwrap();
    assert!(iter.valid());
    assert_eq!(
        keys::parse_snapshot_status(iter.val()).unwrap(),
        SnapshotStatus::Invalid
    );
    drop(iter);

    let calls = client.calls();
    assert!(calls.iter().any(|c| c.starts_with("block_off")));
    assert!(!calls.iter().any(|c| c.starts_with("create")));
}

#[test]
fn list_hosts_round_trip_through_heartbeats() {
    let (p, hosts) = cluster(3);

    let items = p
        .list_hosts(ListHostsReq {
            host_type: ListHostType::Storage,
        })
        .unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.status == HostStatus::Online));
    assert_eq!(
        items.iter().map(|i| i.host).collect::<Vec<_>>(),
        hosts
    );
    assert!(items.iter().all(|i| i.git_sha == "deadbeef"));
}

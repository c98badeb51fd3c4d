//! Framework shared by every metadata request processor.
//!
//! A processor is a plain function over this context: it acquires the named
//! locks it needs, builds keys through the codec, validates through the
//! lookup helpers, writes through the facade and returns its response or a
//! single error. The composite write operations bump the last-update
//! timestamp after the data commit; the bump is deliberately not
//! transactional with the write, so a bump failure is reported while the
//! data stays visible.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::LivenessConfig;
use crate::error::{MetaError, MetaResult};
use crate::kvstore::{KvEngine, KvPair};
use crate::meta::keys;
use crate::meta::last_update;
use crate::meta::locks::{LockName, LockRegistry};
use crate::meta::store::MetaStore;
use crate::types::{
    AlterSchemaItem, AlterSchemaOp, ColumnDef, EdgeType, GroupId, HostAddr, IndexId, IndexItem,
    ListenerType, Schema, SchemaId, SpaceId, TagId, ZoneId,
};

/// Shared context of the metadata request processors.
#[derive(Clone)]
pub struct Processor {
    store: MetaStore,
    locks: Arc<LockRegistry>,
    config: LivenessConfig,
}

impl Processor {
    /// Build a processor context over an engine handle.
    pub fn new(engine: Arc<dyn KvEngine>, config: LivenessConfig) -> Self {
        Self {
            store: MetaStore::new(engine),
            locks: Arc::new(LockRegistry::new()),
            config,
        }
    }

    /// The KV facade.
    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    /// The named lock registry.
    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Liveness tunables.
    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    // ---- composite write operations ----------------------------------------

    /// Apply a batch of puts.
    pub fn do_put(&self, kvs: Vec<KvPair>) -> MetaResult<()> {
        self.store.put(kvs)
    }

    /// Remove one key.
    pub fn do_remove(&self, key: &[u8]) -> MetaResult<()> {
        self.store.remove(key)
    }

    /// Remove a batch of keys.
    pub fn do_multi_remove(&self, keys: Vec<Vec<u8>>) -> MetaResult<()> {
        self.store.multi_remove(keys)
    }

    /// Remove every key in `[start, end)`.
    pub fn do_remove_range(&self, start: &[u8], end: &[u8]) -> MetaResult<()> {
        self.store.remove_range(start, end)
    }

    /// Collect the values of every entry in `[start, end)`.
    pub fn do_scan(&self, start: &[u8], end: &[u8]) -> MetaResult<Vec<Vec<u8>>> {
        self.store.scan_values(start, end)
    }

    /// Apply a batch of puts, then bump the last-update timestamp.
    ///
    /// The bump happens only after the data write commits. When the bump
    /// itself fails the error is returned and the data write remains
    /// visible.
    pub fn do_put_and_update(&self, kvs: Vec<KvPair>) -> MetaResult<()> {
        self.store.put(kvs)?;
        last_update::update(&self.store, last_update::now_ms())
    }

    /// Remove a batch of keys, then bump the last-update timestamp.
    pub fn do_multi_remove_and_update(&self, keys: Vec<Vec<u8>>) -> MetaResult<()> {
        self.store.multi_remove(keys)?;
        last_update::update(&self.store, last_update::now_ms())
    }

    // ---- existence and lookup helpers --------------------------------------

    /// Whether a space id resolves to a live space.
    pub fn space_exist(&self, space: SpaceId) -> MetaResult<()> {
        let _guard = self.locks.read(LockName::Space);
        self.store.get(&keys::space_key(space)).map(|_| ())
    }

    /// Whether an account is registered.
    pub fn user_exist(&self, account: &str) -> MetaResult<()> {
        self.store.get(&keys::user_key(account)).map(|_| ())
    }

    /// Whether a host is registered.
    pub fn host_exist(&self, addr: &HostAddr) -> MetaResult<()> {
        self.store.get(&keys::host_key(addr)).map(|_| ())
    }

    /// Resolve a space name to its id.
    pub fn get_space_id(&self, name: &str) -> MetaResult<SpaceId> {
        let val = self.store.get(&keys::space_name_key(name))?;
        Ok(keys::parse_id(&val)?)
    }

    /// Resolve a tag name to its id.
    pub fn get_tag_id(&self, space: SpaceId, name: &str) -> MetaResult<TagId> {
        let val = self.store.get(&keys::tag_name_key(space, name))?;
        Ok(keys::parse_id(&val)?)
    }

    /// Resolve an edge name to its type.
    pub fn get_edge_type(&self, space: SpaceId, name: &str) -> MetaResult<EdgeType> {
        let val = self.store.get(&keys::edge_name_key(space, name))?;
        Ok(keys::parse_id(&val)?)
    }

    /// Resolve an index name to its id.
    pub fn get_index_id(&self, space: SpaceId, name: &str) -> MetaResult<IndexId> {
        let val = self.store.get(&keys::index_name_key(space, name))?;
        Ok(keys::parse_id(&val)?)
    }

    /// Resolve a group name to its id.
    pub fn get_group_id(&self, name: &str) -> MetaResult<GroupId> {
        let val = self.store.get(&keys::group_name_key(name))?;
        Ok(keys::parse_id(&val)?)
    }

    /// Resolve a zone name to its id.
    pub fn get_zone_id(&self, name: &str) -> MetaResult<ZoneId> {
        let val = self.store.get(&keys::zone_name_key(name))?;
        Ok(keys::parse_id(&val)?)
    }

    /// Latest schema version of a tag.
    ///
    /// The schema prefix enumerates versions newest first, so the first
    /// entry wins; an empty prefix means the tag does not exist.
    pub fn get_latest_tag_schema(&self, space: SpaceId, tag: TagId) -> MetaResult<Schema> {
        let prefix = keys::tag_schema_prefix(space, tag);
        let iter = self.store.prefix(&prefix)?;
        if iter.valid() {
            Ok(keys::parse_schema(iter.val())?)
        } else {
            debug!(space, tag, "tag schema prefix empty");
            Err(MetaError::NotFound)
        }
    }

    /// Latest schema version of an edge kind.
    pub fn get_latest_edge_schema(&self, space: SpaceId, edge: EdgeType) -> MetaResult<Schema> {
        let prefix = keys::edge_schema_prefix(space, edge);
        let iter = self.store.prefix(&prefix)?;
        if iter.valid() {
            Ok(keys::parse_schema(iter.val())?)
        } else {
            debug!(space, edge, "edge schema prefix empty");
            Err(MetaError::NotFound)
        }
    }

    /// Compare a supplied password with the stored one.
    ///
    /// Returns the comparison outcome; the stored value never leaves this
    /// function.
    pub fn check_password(&self, account: &str, password: &str) -> MetaResult<bool> {
        let val = self.store.get(&keys::user_key(account))?;
        Ok(keys::parse_user_pwd(&val)? == password)
    }

    /// Addresses of every registered host.
    pub fn all_hosts(&self) -> MetaResult<Vec<HostAddr>> {
        let mut hosts = Vec::new();
        let mut iter = self.store.prefix(&keys::host_prefix())?;
        while iter.valid() {
            hosts.push(keys::parse_host_key(iter.key())?);
            iter.next();
        }
        Ok(hosts)
    }

    /// Index definitions of one tag or edge kind.
    pub fn get_indexes(&self, space: SpaceId, tag_or_edge: i32) -> MetaResult<Vec<IndexItem>> {
        let mut items = Vec::new();
        let mut iter = self.store.prefix(&keys::index_prefix(space))?;
        while iter.valid() {
            let item = keys::parse_index(iter.val())?;
            let matches = match item.schema_id {
                SchemaId::Tag(id) => id == tag_or_edge,
                SchemaId::Edge(t) => t == tag_or_edge,
            };
            if matches {
                items.push(item);
            }
            iter.next();
        }
        Ok(items)
    }

    /// Whether a listener of the given kind is registered in a space.
    pub fn listener_exist(&self, space: SpaceId, tp: ListenerType) -> MetaResult<()> {
        let _guard = self.locks.read(LockName::Listener);
        let prefix = keys::listener_prefix_type(space, tp);
        let iter = self.store.prefix(&prefix)?;
        if iter.valid() {
            Ok(())
        } else {
            Err(MetaError::NotFound)
        }
    }

    // ---- id allocation ------------------------------------------------------

    /// Allocate the next global id.
    ///
    /// The counter is read-modify-written under the id lock held exclusive;
    /// the first allocation on a fresh store returns 1.
    pub fn auto_increment_id(&self) -> MetaResult<i32> {
        let _guard = self.locks.write(LockName::Id);
        let id = match self.store.get(keys::ID_KEY) {
            Ok(val) => keys::parse_id(&val)? + 1,
            Err(MetaError::NotFound) => 1,
            Err(e) => return Err(e),
        };
        self.store
            .put(vec![(keys::ID_KEY.to_vec(), keys::id_val(id))])?;
        Ok(id)
    }
}

// ---- index consistency checks ----------------------------------------------

/// Reject schema changes that would invalidate an existing index.
///
/// A CHANGE or DROP item naming any column listed in any existing index's
/// fields is a conflict; ADD is always allowed.
pub fn index_check(indexes: &[IndexItem], alter_items: &[AlterSchemaItem]) -> MetaResult<()> {
    for index in indexes {
        for item in alter_items {
            if !matches!(item.op, AlterSchemaOp::Change | AlterSchemaOp::Drop) {
                continue;
            }
            for col in &item.columns {
                if index.fields.iter().any(|f| f.name == col.name) {
                    error!(
                        index = %index.index_name,
                        column = %col.name,
                        "schema change conflicts with an existing index"
                    );
                    return Err(MetaError::Conflict);
                }
            }
        }
    }
    Ok(())
}

/// Whether a proposed field list redefines an existing index.
///
/// An empty proposal is reported as already existing; otherwise the
/// proposal is a duplicate when it matches the existing fields pairwise
/// over its whole length.
pub fn check_index_exist(fields: &[ColumnDef], item: &IndexItem) -> bool {
    if fields.is_empty() {
        error!(index = %item.index_name, "index already exists");
        return true;
    }
    if fields.len() > item.fields.len() {
        return false;
    }
    let duplicate = fields
        .iter()
        .zip(&item.fields)
        .all(|(field, existing)| field.name == existing.name);
    if duplicate {
        error!(index = %item.index_name, "index already exists");
    }
    duplicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::memory::MemoryEngine;
    use crate::types::{PropType, SpaceDesc};
    use std::collections::HashSet;
    use std::thread;

    fn processor() -> Processor {
        Processor::new(MemoryEngine::new(), LivenessConfig::default())
    }

    #[test]
    fn first_id_is_one() {
        let p = processor();
        assert_eq!(p.auto_increment_id().unwrap(), 1);
        assert_eq!(p.auto_increment_id().unwrap(), 2);
    }

    #[test]
    fn concurrent_ids_are_a_permutation() {
        let p = processor();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let p = p.clone();
            handles.push(thread::spawn(move || {
                (0..25)
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
        assert_eq!(ids, (1..=200).collect::<HashSet<_>>());

        let stored = keys::parse_id(&p.store().get(keys::ID_KEY).unwrap()).unwrap();
        assert_eq!(stored, 200);
    }

    #[test]
    fn space_helpers() {
        let p = processor();
        assert_eq!(p.get_space_id("S").unwrap_err(), MetaError::NotFound);
        assert_eq!(p.space_exist(1).unwrap_err(), MetaError::NotFound);

        let desc = SpaceDesc {
            space_name: "S".into(),
            partition_num: 1,
            replica_factor: 1,
            vid_len: 8,
            int_vid: false,
        };
        p.do_put(vec![
            (keys::space_name_key("S"), keys::id_val(1)),
            (keys::space_key(1), keys::space_val(&desc)),
        ])
        .unwrap();

        assert_eq!(p.get_space_id("S").unwrap(), 1);
        p.space_exist(1).unwrap();
    }

    #[test]
    fn name_index_helpers_resolve_ids() {
        let p = processor();
        p.do_put(vec![
            (keys::tag_name_key(1, "person"), keys::id_val(10)),
            (keys::edge_name_key(1, "knows"), keys::id_val(20)),
            (keys::index_name_key(1, "i_person"), keys::id_val(30)),
            (keys::group_name_key("g1"), keys::id_val(40)),
            (keys::zone_name_key("z1"), keys::id_val(50)),
        ])
        .unwrap();

        assert_eq!(p.get_tag_id(1, "person").unwrap(), 10);
        assert_eq!(p.get_edge_type(1, "knows").unwrap(), 20);
        assert_eq!(p.get_index_id(1, "i_person").unwrap(), 30);
        assert_eq!(p.get_group_id("g1").unwrap(), 40);
        assert_eq!(p.get_zone_id("z1").unwrap(), 50);
        // Misses in another space stay misses.
        assert_eq!(p.get_tag_id(2, "person").unwrap_err(), MetaError::NotFound);
    }

    #[test]
    fn user_and_listener_existence() {
        let p = processor();
        assert_eq!(p.user_exist("root").unwrap_err(), MetaError::NotFound);
        p.do_put(vec![(keys::user_key("root"), keys::user_val("pw"))])
            .unwrap();
        p.user_exist("root").unwrap();

        assert_eq!(
            p.listener_exist(1, ListenerType::Elasticsearch).unwrap_err(),
            MetaError::NotFound
        );
        p.do_put(vec![(
            keys::listener_key(1, ListenerType::Elasticsearch, 1),
            keys::listener_val(&crate::types::HostAddr::localhost(9200)),
        )])
        .unwrap();
        p.listener_exist(1, ListenerType::Elasticsearch).unwrap();
    }

    #[test]
    fn scan_and_remove_wrappers() {
        let p = processor();
        p.do_put(vec![
            (b"row_a".to_vec(), b"1".to_vec()),
            (b"row_b".to_vec(), b"2".to_vec()),
            (b"row_c".to_vec(), b"3".to_vec()),
        ])
        .unwrap();

        assert_eq!(
            p.do_scan(b"row_a", b"row_c").unwrap(),
            vec![b"1".to_vec(), b"2".to_vec()]
        );

        p.do_remove(b"row_a").unwrap();
        assert!(p.store().get(b"row_a").is_err());

        p.do_remove_range(b"row_a", b"row_z").unwrap();
        assert!(p.do_scan(b"row_a", b"row_z").unwrap().is_empty());
    }

    #[test]
    fn latest_schema_wins() {
        let p = processor();
        let v0 = Schema {
            columns: vec![ColumnDef::new("c1", PropType::Int)],
        };
        let v1 = Schema {
            columns: vec![
                ColumnDef::new("c1", PropType::Int),
                ColumnDef::new("c2", PropType::String),
            ],
        };
        p.do_put(vec![
            (keys::tag_schema_key(1, 7, 0), keys::schema_val("person", &v0)),
            (keys::tag_schema_key(1, 7, 1), keys::schema_val("person", &v1)),
        ])
        .unwrap();

        assert_eq!(p.get_latest_tag_schema(1, 7).unwrap(), v1);

        p.do_put(vec![(
            keys::edge_schema_key(1, 9, 0),
            keys::schema_val("knows", &v0),
        )])
        .unwrap();
        assert_eq!(p.get_latest_edge_schema(1, 9).unwrap(), v0);
    }

    #[test]
    fn empty_schema_prefix_is_not_found() {
        let p = processor();
        assert_eq!(
            p.get_latest_tag_schema(1, 7).unwrap_err(),
            MetaError::NotFound
        );
        assert_eq!(
            p.get_latest_edge_schema(1, 7).unwrap_err(),
            MetaError::NotFound
        );
    }

    #[test]
    fn password_check_never_leaks() {
        let p = processor();
        p.do_put(vec![(keys::user_key("root"), keys::user_val("secret"))])
            .unwrap();
        assert!(p.check_password("root", "secret").unwrap());
        assert!(!p.check_password("root", "wrong").unwrap());
        assert_eq!(
            p.check_password("ghost", "x").unwrap_err(),
            MetaError::NotFound
        );
    }

    #[test]
    fn update_bumps_timestamp() {
        let p = processor();
        let before = last_update::get(p.store()).unwrap();
        p.do_put_and_update(vec![(b"k".to_vec(), b"v".to_vec())])
            .unwrap();
        let after = last_update::get(p.store()).unwrap();
        assert!(after >= before);
        assert!(after > 0);
    }

    fn index(fields: &[&str]) -> IndexItem {
        IndexItem {
            index_id: 1,
            index_name: "i1".into(),
            schema_id: SchemaId::Tag(1),
            schema_name: "t".into(),
            fields: fields
                .iter()
                .map(|name| ColumnDef::new(*name, PropType::Int))
                .collect(),
        }
    }

    fn alter(op: AlterSchemaOp, cols: &[&str]) -> AlterSchemaItem {
        AlterSchemaItem {
            op,
            columns: cols
                .iter()
                .map(|name| ColumnDef::new(*name, PropType::Int))
                .collect(),
        }
    }

    #[test]
    fn index_check_rejects_drop_of_indexed_column() {
        let indexes = vec![index(&["a", "b"])];
        assert_eq!(
            index_check(&indexes, &[alter(AlterSchemaOp::Drop, &["b", "c"])]).unwrap_err(),
            MetaError::Conflict
        );
        assert_eq!(
            index_check(&indexes, &[alter(AlterSchemaOp::Change, &["a"])]).unwrap_err(),
            MetaError::Conflict
        );
    }

    #[test]
    fn index_check_allows_add_and_unrelated_columns() {
        let indexes = vec![index(&["a", "b"])];
        index_check(&indexes, &[alter(AlterSchemaOp::Add, &["a", "d"])]).unwrap();
        index_check(&indexes, &[alter(AlterSchemaOp::Drop, &["c", "d"])]).unwrap();
        index_check(&[], &[alter(AlterSchemaOp::Drop, &["a"])]).unwrap();
    }

    #[test]
    fn check_index_exist_cases() {
        let item = index(&["a", "b"]);
        // Empty proposals are reported as duplicates.
        assert!(check_index_exist(&[], &item));
        // Prefix-identical over the proposal's whole length.
        assert!(check_index_exist(
            &[ColumnDef::new("a", PropType::Int)],
            &item
        ));
        assert!(check_index_exist(
            &[
                ColumnDef::new("a", PropType::Int),
                ColumnDef::new("b", PropType::Int)
            ],
            &item
        ));
        // Mismatch at any position is not a duplicate.
        assert!(!check_index_exist(
            &[ColumnDef::new("b", PropType::Int)],
            &item
        ));
        // Longer than the existing index cannot be a duplicate.
        assert!(!check_index_exist(
            &[
                ColumnDef::new("a", PropType::Int),
                ColumnDef::new("b", PropType::Int),
                ColumnDef::new("c", PropType::Int)
            ],
            &item
        ));
    }

    #[test]
    fn get_indexes_filters_by_schema() {
        let p = processor();
        let tag_index = index(&["a"]);
        let mut edge_index = index(&["x"]);
        edge_index.index_id = 2;
        edge_index.index_name = "i2".into();
        edge_index.schema_id = SchemaId::Edge(9);

        p.do_put(vec![
            (keys::index_key(1, 1), keys::index_val(&tag_index)),
            (keys::index_key(1, 2), keys::index_val(&edge_index)),
        ])
        .unwrap();

        let tagged = p.get_indexes(1, 1).unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].index_name, "i1");
    }
}

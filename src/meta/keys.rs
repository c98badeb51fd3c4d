//! Key construction and value parsing for every metadata entity.
//!
//! All metadata lives in one reserved partition of the replicated store and
//! is shared byte-for-byte by every meta instance in the Raft group, so this
//! module is the single owner of the on-disk layout. Keys are a textual
//! table prefix followed by raw fixed-width little-endian numeric fields.
//! Composite values are bincode-encoded; id-valued entries and the reserved
//! counters are raw little-endian integers.
//!
//! Decoding goes through [`LeReader`], which bounds-checks every read and
//! turns undersized buffers into [`CodecError`]s instead of panics.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use snafu::ResultExt;

use crate::error::{CodecError, ValueSnafu};
use crate::types::{
    EdgeType, HostAddr, HostInfo, HostRole, IndexItem, ListenerType, PartitionId, RoleType, Schema,
    SnapshotStatus, SpaceDesc, SpaceId, TagId, TermId,
};

const SPACES_TABLE: &[u8] = b"__spaces__";
const SPACE_NAMES_TABLE: &[u8] = b"__space_names__";
const PARTS_TABLE: &[u8] = b"__parts__";
const HOSTS_TABLE: &[u8] = b"__hosts__";
const LEADERS_TABLE: &[u8] = b"__leaders__";
const TAG_NAMES_TABLE: &[u8] = b"__tag_names__";
const EDGE_NAMES_TABLE: &[u8] = b"__edge_names__";
const TAGS_TABLE: &[u8] = b"__tags__";
const EDGES_TABLE: &[u8] = b"__edges__";
const INDEX_NAMES_TABLE: &[u8] = b"__index_names__";
const INDEXES_TABLE: &[u8] = b"__indexes__";
const INDEX_STATUS_TABLE: &[u8] = b"__index_status__";
const USERS_TABLE: &[u8] = b"__users__";
const ROLES_TABLE: &[u8] = b"__roles__";
const LISTENERS_TABLE: &[u8] = b"__listeners__";
const GROUP_NAMES_TABLE: &[u8] = b"__group_names__";
const ZONE_NAMES_TABLE: &[u8] = b"__zone_names__";
const SNAPSHOTS_TABLE: &[u8] = b"__snapshots__";
const STATIS_TABLE: &[u8] = b"__statis__";

/// Reserved key of the global id counter, a raw i32 LE.
pub const ID_KEY: &[u8] = b"__id__";
/// Reserved key of the last-update timestamp, a raw i64 LE.
pub const LAST_UPDATE_TIME_KEY: &[u8] = b"__last_update_time__";

/// Value marking an index rebuild in progress.
pub const INDEX_STATUS_RUNNING: &[u8] = b"RUNNING";

/// Bounds-checked little-endian reader over a borrowed buffer.
pub struct LeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, need: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() - self.pos < need {
            return Err(CodecError::Truncated {
                need,
                offset: self.pos,
                len: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + need];
        self.pos += need;
        Ok(out)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Read a u16 stored little-endian.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    /// Read a u32 stored little-endian.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Read an i32 stored little-endian.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    /// Read an i64 stored little-endian.
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Read an i64 stored big-endian (sort-ordered fields).
    pub fn read_i64_be(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.take(n)
    }

    /// Everything not yet consumed.
    pub fn remainder(self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn strip_table<'a>(key: &'a [u8], table: &[u8], what: &'static str) -> Result<&'a [u8], CodecError> {
    key.strip_prefix(table)
        .ok_or(CodecError::BadPrefix { what })
}

fn read_host_addr(r: &mut LeReader<'_>) -> Result<HostAddr, CodecError> {
    let ip = r.read_u32()?;
    let port = r.read_u16()?;
    Ok(HostAddr { ip, port })
}

fn put_host_addr(buf: &mut Vec<u8>, addr: &HostAddr) {
    put_u32(buf, addr.ip);
    put_u16(buf, addr.port);
}

fn utf8(bytes: &[u8], what: &'static str) -> Result<String, CodecError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 { what })
}

// ---- ids stored as raw values ----------------------------------------------

/// Encode an id for a name-index value or the reserved counter.
pub fn id_val(id: i32) -> Vec<u8> {
    id.to_le_bytes().to_vec()
}

/// Decode an id from a name-index value or the reserved counter.
pub fn parse_id(val: &[u8]) -> Result<i32, CodecError> {
    LeReader::new(val).read_i32()
}

/// Encode the last-update timestamp value.
pub fn last_update_val(now_ms: i64) -> Vec<u8> {
    now_ms.to_le_bytes().to_vec()
}

/// Decode the last-update timestamp value.
pub fn parse_last_update(val: &[u8]) -> Result<i64, CodecError> {
    LeReader::new(val).read_i64()
}

// ---- spaces ----------------------------------------------------------------

/// Key of a space descriptor.
pub fn space_key(space: SpaceId) -> Vec<u8> {
    let mut key = SPACES_TABLE.to_vec();
    put_i32(&mut key, space);
    key
}

/// Prefix enumerating every space descriptor.
pub fn space_prefix() -> Vec<u8> {
    SPACES_TABLE.to_vec()
}

/// Space id embedded in a space-descriptor key.
pub fn parse_space_key(key: &[u8]) -> Result<SpaceId, CodecError> {
    LeReader::new(strip_table(key, SPACES_TABLE, "spaces")?).read_i32()
}

/// Encode a space descriptor.
pub fn space_val(desc: &SpaceDesc) -> Vec<u8> {
    bincode::serialize(desc).expect("space descriptor serializes")
}

/// Decode a space descriptor.
pub fn parse_space_desc(val: &[u8]) -> Result<SpaceDesc, CodecError> {
    bincode::deserialize(val).context(ValueSnafu { what: "space descriptor" })
}

/// Space name held in a space-descriptor value.
pub fn parse_space_name(val: &[u8]) -> Result<String, CodecError> {
    Ok(parse_space_desc(val)?.space_name)
}

/// Name-index key resolving a space name to its id.
pub fn space_name_key(name: &str) -> Vec<u8> {
    let mut key = SPACE_NAMES_TABLE.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

// ---- parts -----------------------------------------------------------------

/// Key of one partition's placement row.
pub fn part_key(space: SpaceId, part: PartitionId) -> Vec<u8> {
    let mut key = PARTS_TABLE.to_vec();
    put_i32(&mut key, space);
    put_i32(&mut key, part);
    key
}

/// Prefix enumerating the placement rows of one space.
pub fn part_prefix(space: SpaceId) -> Vec<u8> {
    let mut key = PARTS_TABLE.to_vec();
    put_i32(&mut key, space);
    key
}

/// Prefix enumerating the placement rows of every space.
pub fn part_prefix_all() -> Vec<u8> {
    PARTS_TABLE.to_vec()
}

/// Space id embedded in a placement key.
pub fn parse_part_key_space_id(key: &[u8]) -> Result<SpaceId, CodecError> {
    LeReader::new(strip_table(key, PARTS_TABLE, "parts")?).read_i32()
}

/// Partition id embedded in a placement key.
pub fn parse_part_key_part_id(key: &[u8]) -> Result<PartitionId, CodecError> {
    let mut r = LeReader::new(strip_table(key, PARTS_TABLE, "parts")?);
    let _space = r.read_i32()?;
    r.read_i32()
}

/// Encode the replica hosts of one partition.
pub fn part_val(hosts: &[HostAddr]) -> Vec<u8> {
    let mut val = Vec::with_capacity(hosts.len() * 6);
    for host in hosts {
        put_host_addr(&mut val, host);
    }
    val
}

/// Decode the replica hosts of one partition.
pub fn parse_part_val(val: &[u8]) -> Result<Vec<HostAddr>, CodecError> {
    let mut r = LeReader::new(val);
    let mut hosts = Vec::new();
    while r.remaining() > 0 {
        hosts.push(read_host_addr(&mut r)?);
    }
    Ok(hosts)
}

// ---- hosts -----------------------------------------------------------------

/// Key of a registered host.
pub fn host_key(addr: &HostAddr) -> Vec<u8> {
    let mut key = HOSTS_TABLE.to_vec();
    put_host_addr(&mut key, addr);
    key
}

/// Prefix enumerating every registered host.
pub fn host_prefix() -> Vec<u8> {
    HOSTS_TABLE.to_vec()
}

/// Address embedded in a host key.
pub fn parse_host_key(key: &[u8]) -> Result<HostAddr, CodecError> {
    read_host_addr(&mut LeReader::new(strip_table(key, HOSTS_TABLE, "hosts")?))
}

fn role_byte(role: HostRole) -> u8 {
    match role {
        HostRole::Unknown => 0x00,
        HostRole::Graph => 0x01,
        HostRole::Meta => 0x02,
        HostRole::Storage => 0x03,
    }
}

fn parse_role_byte(value: u8) -> Result<HostRole, CodecError> {
    match value {
        0x00 => Ok(HostRole::Unknown),
        0x01 => Ok(HostRole::Graph),
        0x02 => Ok(HostRole::Meta),
        0x03 => Ok(HostRole::Storage),
        value => Err(CodecError::BadDiscriminant {
            what: "host role",
            value,
        }),
    }
}

/// Encode a host record: role byte, heartbeat i64 LE, git SHA bytes.
pub fn host_val(info: &HostInfo) -> Vec<u8> {
    let mut val = Vec::with_capacity(9 + info.git_sha.len());
    val.push(role_byte(info.role));
    val.extend_from_slice(&info.last_heartbeat_ms.to_le_bytes());
    val.extend_from_slice(info.git_sha.as_bytes());
    val
}

/// Decode a host record.
pub fn parse_host_val(val: &[u8]) -> Result<HostInfo, CodecError> {
    let mut r = LeReader::new(val);
    let role = parse_role_byte(r.read_u8()?)?;
    let last_heartbeat_ms = r.read_i64()?;
    let git_sha = utf8(r.remainder(), "host git sha")?;
    Ok(HostInfo {
        role,
        last_heartbeat_ms,
        git_sha,
    })
}

// ---- leaders ---------------------------------------------------------------

/// Key of one partition's leader record.
pub fn leader_key(space: SpaceId, part: PartitionId) -> Vec<u8> {
    let mut key = LEADERS_TABLE.to_vec();
    put_i32(&mut key, space);
    put_i32(&mut key, part);
    key
}

/// Prefix enumerating every leader record.
pub fn leader_prefix() -> Vec<u8> {
    LEADERS_TABLE.to_vec()
}

/// Space and partition embedded in a leader key.
pub fn parse_leader_key(key: &[u8]) -> Result<(SpaceId, PartitionId), CodecError> {
    let mut r = LeReader::new(strip_table(key, LEADERS_TABLE, "leaders")?);
    Ok((r.read_i32()?, r.read_i32()?))
}

/// Encode a leader record; `code` zero means the record is healthy.
pub fn leader_val(host: &HostAddr, term: TermId, code: u8) -> Vec<u8> {
    let mut val = Vec::with_capacity(15);
    put_host_addr(&mut val, host);
    val.extend_from_slice(&term.to_le_bytes());
    val.push(code);
    val
}

/// Decode a leader record into (host, term, code).
pub fn parse_leader_val(val: &[u8]) -> Result<(HostAddr, TermId, u8), CodecError> {
    let mut r = LeReader::new(val);
    let host = read_host_addr(&mut r)?;
    let term = r.read_i64()?;
    let code = r.read_u8()?;
    Ok((host, term, code))
}

// ---- tags and edges --------------------------------------------------------

/// Name-index key resolving a tag name to its id.
pub fn tag_name_key(space: SpaceId, name: &str) -> Vec<u8> {
    let mut key = TAG_NAMES_TABLE.to_vec();
    put_i32(&mut key, space);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Name-index key resolving an edge name to its type.
pub fn edge_name_key(space: SpaceId, name: &str) -> Vec<u8> {
    let mut key = EDGE_NAMES_TABLE.to_vec();
    put_i32(&mut key, space);
    key.extend_from_slice(name.as_bytes());
    key
}

// The version component is stored as (i64::MAX - version) big-endian so a
// prefix scan yields the newest version first.
fn put_version(buf: &mut Vec<u8>, version: i64) {
    buf.extend_from_slice(&(i64::MAX - version).to_be_bytes());
}

fn read_version(r: &mut LeReader<'_>) -> Result<i64, CodecError> {
    Ok(i64::MAX - r.read_i64_be()?)
}

/// Key of one tag schema version.
pub fn tag_schema_key(space: SpaceId, tag: TagId, version: i64) -> Vec<u8> {
    let mut key = TAGS_TABLE.to_vec();
    put_i32(&mut key, space);
    put_i32(&mut key, tag);
    put_version(&mut key, version);
    key
}

/// Prefix enumerating one tag's schema versions, newest first.
pub fn tag_schema_prefix(space: SpaceId, tag: TagId) -> Vec<u8> {
    let mut key = TAGS_TABLE.to_vec();
    put_i32(&mut key, space);
    put_i32(&mut key, tag);
    key
}

/// Space, tag and version embedded in a tag schema key.
pub fn parse_tag_schema_key(key: &[u8]) -> Result<(SpaceId, TagId, i64), CodecError> {
    let mut r = LeReader::new(strip_table(key, TAGS_TABLE, "tags")?);
    Ok((r.read_i32()?, r.read_i32()?, read_version(&mut r)?))
}

/// Key of one edge schema version.
pub fn edge_schema_key(space: SpaceId, edge: EdgeType, version: i64) -> Vec<u8> {
    let mut key = EDGES_TABLE.to_vec();
    put_i32(&mut key, space);
    put_i32(&mut key, edge);
    put_version(&mut key, version);
    key
}

/// Prefix enumerating one edge kind's schema versions, newest first.
pub fn edge_schema_prefix(space: SpaceId, edge: EdgeType) -> Vec<u8> {
    let mut key = EDGES_TABLE.to_vec();
    put_i32(&mut key, space);
    put_i32(&mut key, edge);
    key
}

/// Space, edge type and version embedded in an edge schema key.
pub fn parse_edge_schema_key(key: &[u8]) -> Result<(SpaceId, EdgeType, i64), CodecError> {
    let mut r = LeReader::new(strip_table(key, EDGES_TABLE, "edges")?);
    Ok((r.read_i32()?, r.read_i32()?, read_version(&mut r)?))
}

/// Encode a schema value: name length u32 LE, name bytes, bincode schema.
pub fn schema_val(name: &str, schema: &Schema) -> Vec<u8> {
    let mut val = Vec::new();
    put_u32(&mut val, name.len() as u32);
    val.extend_from_slice(name.as_bytes());
    val.extend_from_slice(&bincode::serialize(schema).expect("schema serializes"));
    val
}

/// Schema name held in a schema value.
pub fn parse_schema_name(val: &[u8]) -> Result<String, CodecError> {
    let mut r = LeReader::new(val);
    let len = r.read_u32()? as usize;
    utf8(r.read_bytes(len)?, "schema name")
}

/// Schema held in a schema value.
pub fn parse_schema(val: &[u8]) -> Result<Schema, CodecError> {
    let mut r = LeReader::new(val);
    let len = r.read_u32()? as usize;
    let _name = r.read_bytes(len)?;
    bincode::deserialize(r.remainder()).context(ValueSnafu { what: "schema" })
}

// ---- indexes ---------------------------------------------------------------

/// Name-index key resolving an index name to its id.
pub fn index_name_key(space: SpaceId, name: &str) -> Vec<u8> {
    let mut key = INDEX_NAMES_TABLE.to_vec();
    put_i32(&mut key, space);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Key of an index definition.
pub fn index_key(space: SpaceId, index: i32) -> Vec<u8> {
    let mut key = INDEXES_TABLE.to_vec();
    put_i32(&mut key, space);
    put_i32(&mut key, index);
    key
}

/// Prefix enumerating every index definition of one space.
pub fn index_prefix(space: SpaceId) -> Vec<u8> {
    let mut key = INDEXES_TABLE.to_vec();
    put_i32(&mut key, space);
    key
}

/// Encode an index definition.
pub fn index_val(item: &IndexItem) -> Vec<u8> {
    bincode::serialize(item).expect("index item serializes")
}

/// Decode an index definition.
pub fn parse_index(val: &[u8]) -> Result<IndexItem, CodecError> {
    bincode::deserialize(val).context(ValueSnafu { what: "index item" })
}

/// Key of one index rebuild status row.
pub fn index_status_key(space: SpaceId, index_name: &str) -> Vec<u8> {
    let mut key = INDEX_STATUS_TABLE.to_vec();
    put_i32(&mut key, space);
    key.extend_from_slice(index_name.as_bytes());
    key
}

/// Prefix enumerating every index rebuild status row.
pub fn index_status_prefix() -> Vec<u8> {
    INDEX_STATUS_TABLE.to_vec()
}

// ---- users and roles -------------------------------------------------------

/// Key of a user account.
pub fn user_key(account: &str) -> Vec<u8> {
    let mut key = USERS_TABLE.to_vec();
    key.extend_from_slice(account.as_bytes());
    key
}

/// Encode a user value: password length u32 LE, password bytes.
pub fn user_val(password: &str) -> Vec<u8> {
    let mut val = Vec::with_capacity(4 + password.len());
    put_u32(&mut val, password.len() as u32);
    val.extend_from_slice(password.as_bytes());
    val
}

/// Password held in a user value.
pub fn parse_user_pwd(val: &[u8]) -> Result<String, CodecError> {
    let mut r = LeReader::new(val);
    let len = r.read_u32()? as usize;
    utf8(r.read_bytes(len)?, "user password")
}

/// Key of one role grant in a space.
pub fn role_key(space: SpaceId, account: &str) -> Vec<u8> {
    let mut key = ROLES_TABLE.to_vec();
    put_i32(&mut key, space);
    key.extend_from_slice(account.as_bytes());
    key
}

/// Prefix enumerating every role grant of one space.
pub fn role_space_prefix(space: SpaceId) -> Vec<u8> {
    let mut key = ROLES_TABLE.to_vec();
    put_i32(&mut key, space);
    key
}

/// Account embedded in a role key.
pub fn parse_role_user(key: &[u8]) -> Result<String, CodecError> {
    let mut r = LeReader::new(strip_table(key, ROLES_TABLE, "roles")?);
    let _space = r.read_i32()?;
    utf8(r.remainder(), "role account")
}

fn role_type_byte(role: RoleType) -> u8 {
    match role {
        RoleType::God => 0x01,
        RoleType::Admin => 0x02,
        RoleType::Dba => 0x03,
        RoleType::User => 0x04,
        RoleType::Guest => 0x05,
    }
}

/// Encode a role grant value.
pub fn role_val(role: RoleType) -> Vec<u8> {
    vec![role_type_byte(role)]
}

/// Decode a role grant value.
pub fn parse_role(val: &[u8]) -> Result<RoleType, CodecError> {
    match LeReader::new(val).read_u8()? {
        0x01 => Ok(RoleType::God),
        0x02 => Ok(RoleType::Admin),
        0x03 => Ok(RoleType::Dba),
        0x04 => Ok(RoleType::User),
        0x05 => Ok(RoleType::Guest),
        value => Err(CodecError::BadDiscriminant {
            what: "role type",
            value,
        }),
    }
}

// ---- listeners -------------------------------------------------------------

fn listener_type_byte(tp: ListenerType) -> u8 {
    match tp {
        ListenerType::Elasticsearch => 0x01,
    }
}

/// Key of one listener registration.
pub fn listener_key(space: SpaceId, tp: ListenerType, part: PartitionId) -> Vec<u8> {
    let mut key = LISTENERS_TABLE.to_vec();
    put_i32(&mut key, space);
    key.push(listener_type_byte(tp));
    put_i32(&mut key, part);
    key
}

/// Prefix enumerating every listener of one space.
pub fn listener_prefix(space: SpaceId) -> Vec<u8> {
    let mut key = LISTENERS_TABLE.to_vec();
    put_i32(&mut key, space);
    key
}

/// Prefix enumerating one listener kind of one space.
pub fn listener_prefix_type(space: SpaceId, tp: ListenerType) -> Vec<u8> {
    let mut key = LISTENERS_TABLE.to_vec();
    put_i32(&mut key, space);
    key.push(listener_type_byte(tp));
    key
}

/// Encode a listener value, the host serving it.
pub fn listener_val(host: &HostAddr) -> Vec<u8> {
    let mut val = Vec::with_capacity(6);
    put_host_addr(&mut val, host);
    val
}

/// Decode a listener value.
pub fn parse_listener_host(val: &[u8]) -> Result<HostAddr, CodecError> {
    read_host_addr(&mut LeReader::new(val))
}

// ---- groups and zones ------------------------------------------------------

/// Name-index key resolving a group name to its id.
pub fn group_name_key(name: &str) -> Vec<u8> {
    let mut key = GROUP_NAMES_TABLE.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

/// Name-index key resolving a zone name to its id.
pub fn zone_name_key(name: &str) -> Vec<u8> {
    let mut key = ZONE_NAMES_TABLE.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

// ---- snapshots -------------------------------------------------------------

/// Key of a snapshot record.
pub fn snapshot_key(name: &str) -> Vec<u8> {
    let mut key = SNAPSHOTS_TABLE.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

/// Prefix enumerating every snapshot record.
pub fn snapshot_prefix() -> Vec<u8> {
    SNAPSHOTS_TABLE.to_vec()
}

/// Snapshot name embedded in a snapshot key.
pub fn parse_snapshot_name(key: &[u8]) -> Result<String, CodecError> {
    utf8(
        strip_table(key, SNAPSHOTS_TABLE, "snapshots")?,
        "snapshot name",
    )
}

fn snapshot_status_byte(status: SnapshotStatus) -> u8 {
    match status {
        SnapshotStatus::Invalid => 0x00,
        SnapshotStatus::Valid => 0x01,
    }
}

/// Encode a snapshot record: status byte followed by the host list string.
pub fn snapshot_val(status: SnapshotStatus, hosts: &str) -> Vec<u8> {
    let mut val = Vec::with_capacity(1 + hosts.len());
    val.push(snapshot_status_byte(status));
    val.extend_from_slice(hosts.as_bytes());
    val
}

/// Status held in a snapshot record.
pub fn parse_snapshot_status(val: &[u8]) -> Result<SnapshotStatus, CodecError> {
    match LeReader::new(val).read_u8()? {
        0x00 => Ok(SnapshotStatus::Invalid),
        0x01 => Ok(SnapshotStatus::Valid),
        value => Err(CodecError::BadDiscriminant {
            what: "snapshot status",
            value,
        }),
    }
}

/// Host list string held in a snapshot record.
pub fn parse_snapshot_hosts(val: &[u8]) -> Result<String, CodecError> {
    let mut r = LeReader::new(val);
    let _status = r.read_u8()?;
    utf8(r.remainder(), "snapshot hosts")
}

// ---- statis ----------------------------------------------------------------

/// Key of one space's statistics row.
pub fn statis_key(space: SpaceId) -> Vec<u8> {
    let mut key = STATIS_TABLE.to_vec();
    put_i32(&mut key, space);
    key
}

// ---- host list strings and timestamps --------------------------------------

/// Render hosts as the `ip:port,ip:port` string stored in snapshot records.
pub fn host_addrs_str(hosts: &[HostAddr]) -> String {
    hosts
        .iter()
        .map(HostAddr::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a host list string back into addresses.
pub fn parse_host_addrs_str(text: &str) -> Result<Vec<HostAddr>, CodecError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',').map(parse_host_addr_str).collect()
}

fn parse_host_addr_str(entry: &str) -> Result<HostAddr, CodecError> {
    let bad = || CodecError::BadHostAddr {
        text: entry.to_string(),
    };
    let (ip_text, port_text) = entry.split_once(':').ok_or_else(bad)?;
    let port = port_text.parse::<u16>().map_err(|_| bad())?;
    let mut octets = [0u8; 4];
    let mut count = 0;
    for part in ip_text.split('.') {
        if count == 4 {
            return Err(bad());
        }
        octets[count] = part.parse::<u8>().map_err(|_| bad())?;
        count += 1;
    }
    if count != 4 {
        return Err(bad());
    }
    Ok(HostAddr::new(octets, port))
}

static TIMESTAMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Wall-clock rendering used in backup names.
///
/// A process-wide sequence number keeps two invocations within the same
/// second distinct.
pub fn timestamp_str() -> String {
    let seq = TIMESTAMP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}", Utc::now().format("%Y_%m_%d_%H_%M_%S"), seq)
}

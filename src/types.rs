//! Entity types shared by the metadata service and the lookup planner.
//!
//! Everything here is a plain value type with serde derives; composite values
//! are persisted with bincode while id-valued entries are stored as raw
//! little-endian bytes (see [`crate::meta::keys`]).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a graph space.
pub type SpaceId = i32;
/// Identifier of a partition within a space.
pub type PartitionId = i32;
/// Identifier of a tag (vertex-kind schema).
pub type TagId = i32;
/// Identifier of an edge kind.
pub type EdgeType = i32;
/// Identifier of a secondary index.
pub type IndexId = i32;
/// Identifier of a host group.
pub type GroupId = i32;
/// Identifier of a zone.
pub type ZoneId = i32;
/// Raft term of a partition leader.
pub type TermId = i64;

/// Network address of a cluster host.
///
/// Stored fixed-width in key material: ip as u32 LE followed by port as
/// u16 LE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAddr {
    /// IPv4 address as a big-endian integer (`0x7f000001` is 127.0.0.1).
    pub ip: u32,
    /// Service port.
    pub port: u16,
}

impl HostAddr {
    /// Build an address from the four octets and a port.
    pub fn new(octets: [u8; 4], port: u16) -> Self {
        Self {
            ip: u32::from_be_bytes(octets),
            port,
        }
    }

    /// Loopback address helper for tests and peer lists.
    pub fn localhost(port: u16) -> Self {
        Self::new([127, 0, 0, 1], port)
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.ip.to_be_bytes();
        write!(f, "{}.{}.{}.{}:{}", o[0], o[1], o[2], o[3], self.port)
    }
}

/// Role a host registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    /// Query-layer host.
    Graph,
    /// Metadata service host.
    Meta,
    /// Storage host.
    Storage,
    /// Role not recognized by this version.
    Unknown,
}

/// Host class requested by a list-hosts call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListHostType {
    /// Graph hosts only.
    Graph,
    /// Meta hosts only (synthesized from the raft peer list).
    Meta,
    /// Storage hosts only.
    Storage,
    /// Storage hosts joined with leader records and part placement.
    Alloc,
}

/// Liveness status reported for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// Heartbeat received within the online window.
    Online,
    /// Heartbeat stale but not yet old enough to forget the host.
    Offline,
}

/// Registered host record, persisted as the host-key value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Role the host registered under.
    pub role: HostRole,
    /// Wall-clock milliseconds of the last received heartbeat.
    pub last_heartbeat_ms: i64,
    /// Git SHA the host binary was built from.
    pub git_sha: String,
}

/// One row of a list-hosts response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostItem {
    /// Host address.
    pub host: HostAddr,
    /// Registered role.
    pub role: HostRole,
    /// Git SHA the host binary was built from.
    pub git_sha: String,
    /// Liveness classification at response time.
    pub status: HostStatus,
    /// Space name to the partitions this host currently leads.
    pub leader_parts: HashMap<String, Vec<PartitionId>>,
    /// Space name to all partitions placed on this host.
    pub all_parts: HashMap<String, Vec<PartitionId>>,
}

impl HostItem {
    /// A row with empty placement maps.
    pub fn new(host: HostAddr, role: HostRole, git_sha: String, status: HostStatus) -> Self {
        Self {
            host,
            role,
            git_sha,
            status,
            leader_parts: HashMap::new(),
            all_parts: HashMap::new(),
        }
    }
}

/// Properties of a graph space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceDesc {
    /// Space name, unique in the cluster.
    pub space_name: String,
    /// Number of partitions the space is sharded into.
    pub partition_num: i32,
    /// Replicas per partition.
    pub replica_factor: i32,
    /// Fixed width of vertex identifiers in bytes.
    pub vid_len: i32,
    /// Whether vertex identifiers are integers rather than fixed strings.
    pub int_vid: bool,
}

/// Property value kind of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropType {
    /// Boolean property.
    Bool,
    /// 64-bit integer property.
    Int,
    /// Double-precision float property.
    Double,
    /// Variable-length string property.
    String,
    /// Millisecond timestamp property.
    Timestamp,
}

/// One column of a tag or edge schema, also used for index fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Value kind.
    pub prop_type: PropType,
    /// Whether the column may hold null.
    pub nullable: bool,
}

impl ColumnDef {
    /// Non-nullable column helper.
    pub fn new(name: impl Into<String>, prop_type: PropType) -> Self {
        Self {
            name: name.into(),
            prop_type,
            nullable: false,
        }
    }

    /// Nullable column helper.
    pub fn nullable(name: impl Into<String>, prop_type: PropType) -> Self {
        Self {
            name: name.into(),
            prop_type,
            nullable: true,
        }
    }
}

/// A versioned tag or edge schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Columns in definition order.
    pub columns: Vec<ColumnDef>,
}

/// Which schema an index is defined over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaId {
    /// Index over a tag.
    Tag(TagId),
    /// Index over an edge kind.
    Edge(EdgeType),
}

/// Definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexItem {
    /// Index identifier.
    pub index_id: IndexId,
    /// Index name, unique within its space.
    pub index_name: String,
    /// Tag or edge the index is defined over.
    pub schema_id: SchemaId,
    /// Name of that tag or edge.
    pub schema_name: String,
    /// Ordered columns forming the index key.
    pub fields: Vec<ColumnDef>,
}

/// Operation kind of one item in an ALTER request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlterSchemaOp {
    /// Add new columns.
    Add,
    /// Change existing columns.
    Change,
    /// Drop existing columns.
    Drop,
}

/// One item of an ALTER TAG / ALTER EDGE request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterSchemaItem {
    /// What the item does.
    pub op: AlterSchemaOp,
    /// Columns the item touches.
    pub columns: Vec<ColumnDef>,
}

/// Privilege stored in a role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    /// Cluster superuser.
    God,
    /// Space administrator.
    Admin,
    /// Schema administrator.
    Dba,
    /// Read-write user.
    User,
    /// Read-only user.
    Guest,
}

/// Listener kind attached to a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerType {
    /// Full-text search listener.
    Elasticsearch,
}

/// State of a snapshot record.
///
/// The only valid transition is `Invalid` to `Valid`; a valid record is never
/// demoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Record written before the checkpoints were confirmed.
    Invalid,
    /// Every listed host holds a checkpoint directory.
    Valid,
}

/// Checkpoint produced by one storage host during a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    /// Host that created the checkpoint.
    pub host: HostAddr,
    /// Directory on that host holding the checkpoint.
    pub checkpoint_dir: String,
}

/// Per-space section of a backup manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceBackupInfo {
    /// Space properties at backup time.
    pub space: SpaceDesc,
    /// Checkpoint directories per storage host.
    pub cp_dirs: Vec<CheckpointInfo>,
}

/// Manifest returned by a successful backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMeta {
    /// Exported meta SST files.
    pub meta_files: Vec<String>,
    /// Per-space checkpoint placement.
    pub backup_info: HashMap<SpaceId, SpaceBackupInfo>,
    /// Generated backup name (`BACKUP_<timestamp>`).
    pub backup_name: String,
}

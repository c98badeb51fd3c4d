//! In-memory schema and index managers consumed by the planner.
//!
//! The planner never touches storage; it reads these managers, which the
//! serving layer keeps warm from metadata. The `Memory*` implementations
//! here are deterministic fixtures for tests and simulations.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::lookup::error::LookupError;
use crate::types::{EdgeType, IndexId, IndexItem, Schema, SpaceId, TagId};

/// Read surface over cached tag and edge schemas.
pub trait SchemaManager: Send + Sync {
    /// Vertex-id width and integer-vid flag of a space.
    fn space_vid_len(&self, space: SpaceId) -> Result<(i32, bool), LookupError>;

    /// Name of a tag.
    fn tag_name(&self, space: SpaceId, tag: TagId) -> Option<String>;

    /// Name of an edge kind.
    fn edge_name(&self, space: SpaceId, edge: EdgeType) -> Option<String>;

    /// Every schema version of a tag, oldest first.
    fn all_ver_tag_schemas(&self, space: SpaceId, tag: TagId) -> Option<Vec<Arc<Schema>>>;

    /// Every schema version of an edge kind, oldest first.
    fn all_ver_edge_schemas(&self, space: SpaceId, edge: EdgeType) -> Option<Vec<Arc<Schema>>>;
}

/// Read surface over cached index definitions.
pub trait IndexManager: Send + Sync {
    /// A tag index by id.
    fn tag_index(&self, space: SpaceId, index: IndexId) -> Option<Arc<IndexItem>>;

    /// An edge index by id.
    fn edge_index(&self, space: SpaceId, index: IndexId) -> Option<Arc<IndexItem>>;
}

/// Deterministic in-memory [`SchemaManager`].
#[derive(Default)]
pub struct MemorySchemaManager {
    spaces: RwLock<HashMap<SpaceId, (i32, bool)>>,
    tags: RwLock<HashMap<(SpaceId, TagId), (String, Vec<Arc<Schema>>)>>,
    edges: RwLock<HashMap<(SpaceId, EdgeType), (String, Vec<Arc<Schema>>)>>,
}

impl MemorySchemaManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a space with its vid facts.
    pub fn add_space(&self, space: SpaceId, vid_len: i32, int_vid: bool) {
        self.spaces.write().insert(space, (vid_len, int_vid));
    }

    /// Register a tag with all its schema versions, oldest first.
    pub fn add_tag(&self, space: SpaceId, tag: TagId, name: &str, versions: Vec<Schema>) {
        self.tags.write().insert(
            (space, tag),
            (name.to_string(), versions.into_iter().map(Arc::new).collect()),
        );
    }

    /// Register an edge kind with all its schema versions, oldest first.
    pub fn add_edge(&self, space: SpaceId, edge: EdgeType, name: &str, versions: Vec<Schema>) {
        self.edges.write().insert(
            (space, edge),
            (name.to_string(), versions.into_iter().map(Arc::new).collect()),
        );
    }
}

impl SchemaManager for MemorySchemaManager {
    fn space_vid_len(&self, space: SpaceId) -> Result<(i32, bool), LookupError> {
        self.spaces
            .read()
            .get(&space)
            .copied()
            .ok_or(LookupError::SpaceNotFound)
    }

    fn tag_name(&self, space: SpaceId, tag: TagId) -> Option<String> {
        self.tags.read().get(&(space, tag)).map(|(name, _)| name.clone())
    }

    fn edge_name(&self, space: SpaceId, edge: EdgeType) -> Option<String> {
        self.edges
            .read()
            .get(&(space, edge))
            .map(|(name, _)| name.clone())
    }

    fn all_ver_tag_schemas(&self, space: SpaceId, tag: TagId) -> Option<Vec<Arc<Schema>>> {
        self.tags
            .read()
            .get(&(space, tag))
            .map(|(_, versions)| versions.clone())
    }

    fn all_ver_edge_schemas(&self, space: SpaceId, edge: EdgeType) -> Option<Vec<Arc<Schema>>> {
        self.edges
            .read()
            .get(&(space, edge))
            .map(|(_, versions)| versions.clone())
    }
}

/// Deterministic in-memory [`IndexManager`].
#[derive(Default)]
pub struct MemoryIndexManager {
    tag_indexes: RwLock<HashMap<(SpaceId, IndexId), Arc<IndexItem>>>,
    edge_indexes: RwLock<HashMap<(SpaceId, IndexId), Arc<IndexItem>>>,
}

impl MemoryIndexManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag index.
    pub fn add_tag_index(&self, space: SpaceId, item: IndexItem) {
        self.tag_indexes
            .write()
            .insert((space, item.index_id), Arc::new(item));
    }

    /// Register an edge index.
    pub fn add_edge_index(&self, space: SpaceId, item: IndexItem) {
        self.edge_indexes
            .write()
            .insert((space, item.index_id), Arc::new(item));
    }
}

impl IndexManager for MemoryIndexManager {
    fn tag_index(&self, space: SpaceId, index: IndexId) -> Option<Arc<IndexItem>> {
        self.tag_indexes.read().get(&(space, index)).cloned()
    }

    fn edge_index(&self, space: SpaceId, index: IndexId) -> Option<Arc<IndexItem>> {
        self.edge_indexes.read().get(&(space, index)).cloned()
    }
}

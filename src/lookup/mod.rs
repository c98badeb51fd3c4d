//! The secondary-index lookup planner.
//!
//! Given a lookup request carrying one or more index query contexts, the
//! planner validates the schema and index references, classifies each
//! context by what the index key alone can answer, and assembles a small
//! dataflow plan: per-context scan chains feeding one deduplication node
//! and a terminal aggregation node. Plan shape is decided purely by
//! structural predicates; there is no cost model.

pub mod error;
pub mod expr;
pub mod managers;
pub mod plan;
pub mod planner;

use serde::{Deserialize, Serialize};

use crate::types::{IndexId, SpaceId};

pub use error::LookupError;
pub use expr::{Expr, ExprContext, RelOp, Value};
pub use managers::{IndexManager, MemoryIndexManager, MemorySchemaManager, SchemaManager};
pub use plan::{NodeId, OutputSource, Plan, PlanNode};
pub use planner::LookupPlanner;

/// How one column of an index is constrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Exact prefix match.
    Prefix,
    /// Bounded range.
    Range,
}

/// Constraint on one index column, produced by the query layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHint {
    /// Column name.
    pub column: String,
    /// Prefix or range scan.
    pub scan_type: ScanType,
    /// Inclusive begin value.
    pub begin: Option<expr::Value>,
    /// Exclusive end value, for range scans.
    pub end: Option<expr::Value>,
}

/// One candidate index with its constraints and optional residual filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQueryContext {
    /// Index to scan.
    pub index_id: IndexId,
    /// Per-column constraints the scan can apply directly.
    pub column_hints: Vec<ColumnHint>,
    /// Residual filter the hints cannot express.
    pub filter: Option<Expr>,
}

/// The tag or edge side of a lookup with its candidate contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Whether the lookup targets edges.
    pub is_edge: bool,
    /// Tag id or edge type the indexes belong to.
    pub tag_or_edge_id: i32,
    /// Candidate index contexts.
    pub contexts: Vec<IndexQueryContext>,
}

/// A lookup request as received from the query layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Space the lookup runs in.
    pub space_id: SpaceId,
    /// Index contexts.
    pub indices: IndexSpec,
    /// Columns the caller wants back.
    pub return_columns: Vec<String>,
}

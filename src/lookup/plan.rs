//! Arena-backed dataflow plans.
//!
//! Nodes are value types addressed by index; dependency edges live in one
//! list of (node, dependency) pairs. Nothing holds a pointer to anything
//! else, so plans are cheap to move and trivially safe to share once built.

use std::sync::Arc;

use crate::lookup::expr::{Expr, ExprContext};
use crate::lookup::ColumnHint;
use crate::types::{ColumnDef, IndexId, Schema};

/// Index of a node inside its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// What an output node reads from its child.
#[derive(Debug, Clone)]
pub enum OutputSource {
    /// Columns decoded straight from the index key.
    IndexRow {
        /// Whether any index field is nullable.
        has_nullable_col: bool,
        /// Index fields, in key order.
        fields: Vec<ColumnDef>,
    },
    /// Rows produced by a vertex or edge fetch.
    DataRow,
    /// Rows surviving a filter node.
    FilterRow,
}

/// One typed node of a lookup plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Scan one index with the context's column hints.
    IndexScan {
        /// Index to scan.
        index_id: IndexId,
        /// Per-column scan hints.
        column_hints: Vec<ColumnHint>,
    },
    /// Fetch the tag row behind each scanned key.
    VertexFetch {
        /// Tag name.
        tag_name: String,
        /// All schema versions, oldest first.
        schemas: Vec<Arc<Schema>>,
    },
    /// Fetch the edge row behind each scanned key.
    EdgeFetch {
        /// Edge name.
        edge_name: String,
        /// All schema versions, oldest first.
        schemas: Vec<Arc<Schema>>,
    },
    /// Evaluate a filter over its input rows.
    Filter {
        /// The filter expression.
        filter: Expr,
        /// Pre-built evaluation context.
        context: ExprContext,
    },
    /// Produce result rows for one index context.
    Output {
        /// What the node reads from its child.
        source: OutputSource,
    },
    /// Deduplicate result rows over the key-kind columns.
    DeDup {
        /// Positions of the dedup columns in the result row.
        columns: Vec<usize>,
    },
    /// Terminal aggregation; the plan root.
    Aggregate,
}

impl PlanNode {
    /// Short label used in logs and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanNode::IndexScan { .. } => "IndexScan",
            PlanNode::VertexFetch { .. } => "VertexFetch",
            PlanNode::EdgeFetch { .. } => "EdgeFetch",
            PlanNode::Filter { .. } => "Filter",
            PlanNode::Output { .. } => "Output",
            PlanNode::DeDup { .. } => "DeDup",
            PlanNode::Aggregate => "Aggregate",
        }
    }
}

/// A dataflow plan over an arena of nodes.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    edges: Vec<(NodeId, NodeId)>,
    root: Option<NodeId>,
}

impl Plan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn add_node(&mut self, node: PlanNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Record that `node` consumes the output of `dependency`.
    pub fn add_dependency(&mut self, node: NodeId, dependency: NodeId) {
        self.edges.push((node, dependency));
    }

    /// Mark the terminal node.
    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// The terminal node, when set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Node behind an id.
    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of the nodes `id` consumes, in insertion order.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(node, _)| *node == id)
            .map(|(_, dep)| *dep)
            .collect()
    }
}

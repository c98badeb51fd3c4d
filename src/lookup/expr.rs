//! Filter expressions attached to index query contexts.
//!
//! The planner never evaluates these; it only inspects their structure to
//! decide whether a filter can be answered from the index key alone or
//! needs the fetched row. Execution receives the expression together with a
//! pre-built [`ExprContext`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{ColumnDef, IndexItem, Schema};

/// Name of the vertex-id pseudo column.
pub const K_VID: &str = "_vid";
/// Name of the tag pseudo column.
pub const K_TAG: &str = "_tag";
/// Name of the edge-source pseudo column.
pub const K_SRC: &str = "_src";
/// Name of the edge-type pseudo column.
pub const K_TYPE: &str = "_type";
/// Name of the edge-rank pseudo column.
pub const K_RANK: &str = "_rank";
/// Name of the edge-destination pseudo column.
pub const K_DST: &str = "_dst";

/// Whether a return column is answered by key material alone.
pub fn is_key_column(name: &str) -> bool {
    matches!(name, K_VID | K_TAG | K_SRC | K_TYPE | K_RANK | K_DST)
}

fn is_edge_key_prop(name: &str) -> bool {
    matches!(name, K_SRC | K_TYPE | K_RANK | K_DST)
}

/// A constant operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Boolean constant.
    Bool(bool),
    /// Integer constant.
    Int(i64),
    /// Float constant.
    Float(f64),
    /// String constant.
    Str(String),
}

/// Relational operator of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Membership.
    In,
    /// Negated membership.
    NotIn,
}

/// A filter expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Conjunction over the operands.
    And(Vec<Expr>),
    /// Disjunction over the operands.
    Or(Vec<Expr>),
    /// Relational comparison.
    Rel {
        /// Operator.
        op: RelOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Reference to a tag property.
    TagProp {
        /// Property name.
        prop: String,
    },
    /// Reference to an edge property.
    EdgeProp {
        /// Property name.
        prop: String,
    },
    /// Reference to an edge key component (src, type, rank, dst).
    EdgeKey {
        /// Pseudo column name.
        prop: String,
    },
    /// A constant operand.
    Constant(Value),
}

impl Expr {
    /// Tag property reference.
    pub fn tag_prop(prop: impl Into<String>) -> Self {
        Expr::TagProp { prop: prop.into() }
    }

    /// Edge property reference.
    pub fn edge_prop(prop: impl Into<String>) -> Self {
        Expr::EdgeProp { prop: prop.into() }
    }

    /// Edge key component reference.
    pub fn edge_key(prop: impl Into<String>) -> Self {
        Expr::EdgeKey { prop: prop.into() }
    }

    /// Integer constant.
    pub fn int(value: i64) -> Self {
        Expr::Constant(Value::Int(value))
    }

    /// Relational comparison.
    pub fn rel(op: RelOp, left: Expr, right: Expr) -> Self {
        Expr::Rel {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Conjunction.
    pub fn and(operands: Vec<Expr>) -> Self {
        Expr::And(operands)
    }

    /// Disjunction.
    pub fn or(operands: Vec<Expr>) -> Self {
        Expr::Or(operands)
    }
}

/// Whether a filter references anything the index key cannot answer.
///
/// Logical nodes are outside when any operand is; comparisons when either
/// side is. A property leaf is outside when its name is not an index
/// field; an edge key leaf when its name is not one of the four key
/// components. Constants and anything else are inside.
pub fn is_outside_index(expr: &Expr, index: &IndexItem) -> bool {
    match expr {
        Expr::And(operands) | Expr::Or(operands) => {
            operands.iter().any(|e| is_outside_index(e, index))
        }
        Expr::Rel { left, right, .. } => {
            is_outside_index(left, index) || is_outside_index(right, index)
        }
        Expr::EdgeKey { prop } => !is_edge_key_prop(prop),
        Expr::TagProp { prop } | Expr::EdgeProp { prop } => {
            !index.fields.iter().any(|f| f.name == *prop)
        }
        Expr::Constant(_) => false,
    }
}

/// Evaluation context handed to a filter node.
///
/// When the plan fetches no row data the context carries only key and index
/// facts; when it does, the latest schema rides along so property offsets
/// can be resolved.
#[derive(Debug, Clone)]
pub enum ExprContext {
    /// Filter answered from index key material.
    FieldOnly {
        /// Fixed vertex-id width of the space.
        vid_len: i32,
        /// Whether vertex ids are integers.
        is_int_vid: bool,
        /// Whether any index field is nullable.
        has_nullable_col: bool,
        /// Index fields, in key order.
        fields: Vec<ColumnDef>,
    },
    /// Filter over the fetched row.
    SchemaAware {
        /// Fixed vertex-id width of the space.
        vid_len: i32,
        /// Whether vertex ids are integers.
        is_int_vid: bool,
        /// Name of the tag or edge.
        schema_name: String,
        /// Latest schema version.
        schema: Arc<Schema>,
        /// Whether the rows are edges.
        is_edge: bool,
    },
}

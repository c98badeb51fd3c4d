//! Failures surfaced by the lookup planner.

use snafu::Snafu;

/// Errors raised while validating a lookup request or assembling its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum LookupError {
    /// The space id does not resolve.
    #[snafu(display("space not found"))]
    SpaceNotFound,
    /// The tag id does not resolve.
    #[snafu(display("tag not found"))]
    TagNotFound,
    /// The edge type does not resolve.
    #[snafu(display("edge not found"))]
    EdgeNotFound,
    /// An index context names an unknown index.
    #[snafu(display("index not found"))]
    IndexNotFound,
    /// Empty contexts or empty return columns.
    #[snafu(display("malformed lookup request"))]
    InvalidOperation,
    /// A data fetch was required but no schema version is available.
    #[snafu(display("schema not found"))]
    SchemaNotFound,
    /// Plan wiring produced no output node.
    #[snafu(display("index scan plan error"))]
    InvalidPlan,
}

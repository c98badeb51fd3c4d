//! Canopy metadata service and index lookup planner.
//!
//! Two subsystems of the Canopy distributed graph database live in this
//! crate. The metadata service persists and mutates cluster state (spaces,
//! schemas, indexes, hosts, roles, snapshots) through one reserved
//! partition of a replicated key-value engine, serializing mutations with a
//! small set of named locks. The lookup planner compiles an index lookup
//! request into a dataflow plan of typed nodes executed against
//! partition-local data.
//!
//! The replicated engine itself, the RPC transport and plan execution are
//! external collaborators; this crate pins down their contracts in
//! [`kvstore`] and [`meta::admin`].

#![warn(missing_docs)]

/// Liveness configuration.
pub mod config;
/// Error taxonomy shared across the metadata service.
pub mod error;
/// Contract of the replicated KV engine plus a deterministic test engine.
pub mod kvstore;
/// The secondary-index lookup planner.
pub mod lookup;
/// The metadata service.
pub mod meta;
/// Entity types shared by both subsystems.
pub mod types;

pub use config::LivenessConfig;
pub use error::{MetaError, MetaResult};
pub use meta::Processor;

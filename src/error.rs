//! Error taxonomy shared by the metadata processors and their helpers.

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Result alias used throughout the metadata service.
pub type MetaResult<T> = Result<T, MetaError>;

/// Error surface exposed to RPC callers, one variant per failure kind.
///
/// Helpers translate engine result codes at the boundary; processors record
/// exactly one of these per failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Snafu, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaError {
    /// Requested entity is absent.
    #[snafu(display("entity not found"))]
    NotFound,
    /// Tag name or id could not be resolved.
    #[snafu(display("tag not found"))]
    TagNotFound,
    /// Edge name or type could not be resolved.
    #[snafu(display("edge not found"))]
    EdgeNotFound,
    /// Index id could not be resolved.
    #[snafu(display("index not found"))]
    IndexNotFound,
    /// Entity with the same name already exists.
    #[snafu(display("entity already exists"))]
    AlreadyExists,
    /// Schema change would invalidate an existing index.
    #[snafu(display("conflicting schema change"))]
    Conflict,
    /// The meta partition leader moved; the client should retry elsewhere.
    #[snafu(display("meta partition leader changed"))]
    LeaderChanged,
    /// Any other engine-level failure.
    #[snafu(display("key-value store failure"))]
    StoreFailure,
    /// A storage host refused or failed an admin call.
    #[snafu(display("storage admin rpc failure"))]
    RpcFailure,
    /// A storage host failed a blocking-writes signal.
    #[snafu(display("blocking writes failed on a storage host"))]
    BlockWriteFailure,
    /// Request shape is malformed.
    #[snafu(display("malformed request"))]
    InvalidOperation,
    /// Backup rejected while an index rebuild is running.
    #[snafu(display("backup rejected, an index rebuild is running"))]
    BackupBuildingIndex,
    /// Backup rejected because no target space resolved.
    #[snafu(display("backup rejected, no matching space"))]
    BackupSpaceNotFound,
    /// Meta SST export or another backup step failed.
    #[snafu(display("backup failed"))]
    BackupFailure,
    /// Host registry was empty when at least one host was required.
    #[snafu(display("no hosts registered"))]
    NoHosts,
}

/// Decode failure raised by the metadata codec.
///
/// Raw bytes shared across meta server instances are decoded with explicit
/// bounds checks; an undersized or malformed buffer is an error, never a
/// panic.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
    /// Buffer ended before a fixed-width field.
    #[snafu(display("buffer truncated, need {need} bytes at offset {offset} of {len}"))]
    Truncated {
        /// Bytes the field requires.
        need: usize,
        /// Offset the read started at.
        offset: usize,
        /// Total buffer length.
        len: usize,
    },
    /// A textual field held invalid UTF-8.
    #[snafu(display("invalid utf-8 in {what}"))]
    InvalidUtf8 {
        /// Field being decoded.
        what: &'static str,
    },
    /// A composite value failed to deserialize.
    #[snafu(display("failed to decode {what}: {source}"))]
    Value {
        /// Value being decoded.
        what: &'static str,
        /// Underlying bincode failure.
        source: bincode::Error,
    },
    /// A single-byte tag held an unknown value.
    #[snafu(display("unknown discriminant {value} for {what}"))]
    BadDiscriminant {
        /// Field being decoded.
        what: &'static str,
        /// Byte read.
        value: u8,
    },
    /// A key did not start with the expected table prefix.
    #[snafu(display("key does not belong to the {what} table"))]
    BadPrefix {
        /// Table being decoded.
        what: &'static str,
    },
    /// A serialized host list held a malformed entry.
    #[snafu(display("malformed host address '{text}'"))]
    BadHostAddr {
        /// Offending entry.
        text: String,
    },
}

impl From<CodecError> for MetaError {
    fn from(_: CodecError) -> Self {
        // A record two meta instances disagree on is a store-level problem,
        // not a caller mistake.
        MetaError::StoreFailure
    }
}

//! Request processors, one module per metadata operation.

pub mod create_backup;
pub mod create_space;
pub mod drop_snapshot;
pub mod drop_space;
pub mod heartbeat;
pub mod list_hosts;

pub use create_backup::CreateBackupReq;
pub use create_space::CreateSpaceReq;
pub use drop_snapshot::DropSnapshotReq;
pub use drop_space::DropSpaceReq;
pub use heartbeat::HeartbeatReq;
pub use list_hosts::ListHostsReq;

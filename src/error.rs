//! Typed failures raised by the indexing core
//!
//! Operation plumbing returns `anyhow::Result`; these are the cases callers
//! may want to match on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("object pool limit must be at least 1, got {0}")]
    InvalidPoolLimit(usize),

    #[error("object pool has been closed")]
    PoolClosed,

    #[error("invalid record id {0}")]
    InvalidId(i64),

    #[error("unknown artifactory id {0}")]
    UnknownArtifactory(i64),

    #[error("invalid artifact coordinates '{0}', expected group:artifact:version")]
    InvalidCoordinates(String),

    #[error("external source spec version {found} is not supported (latest is {latest})")]
    UnsupportedSpecVersion { found: u32, latest: u32 },

    #[error("external source group '{0}' lists no artifacts")]
    EmptyGroup(String),
}

use std::collections::TryReserveError;
use std::fmt;

/// Convenient alias for results produced by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can be produced while storing or querying segment data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A sample index lies outside the committed data.
    #[error("sample index {index} out of range (sample count {len})")]
    OutOfRange {
        /// Requested sample index.
        index: u64,
        /// Number of samples committed when the request was made.
        len: u64,
    },

    /// A range argument was malformed or reached past the committed data.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Storage for new samples or envelope entries could not be allocated.
    #[error("out of memory while allocating {bytes} bytes")]
    OutOfMemory {
        /// Size of the allocation that failed.
        bytes: usize,
    },

    /// Construction or reconfiguration was attempted with unusable parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Samples were appended after the segment was marked complete.
    #[error("segment is complete and no longer accepts samples")]
    Completed,
}

impl Error {
    pub(crate) fn config<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidConfig(msg.to_string())
    }

    pub(crate) fn range<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidRange(msg.to_string())
    }

    pub(crate) fn out_of_range(index: u64, len: u64) -> Self {
        Self::OutOfRange { index, len }
    }

    pub(crate) fn alloc(bytes: usize, err: TryReserveError) -> Self {
        tracing::warn!(bytes, error = %err, "allocation failed");
        Self::OutOfMemory { bytes }
    }
}

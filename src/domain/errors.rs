// Domain-level errors for replication workflows.

use thiserror::Error;

/// Errors raised while sampling, merging or mirroring replicated transforms.
///
/// Duplicate batches and exhausted interpolation are not errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// The six per-axis arrays of a batch disagree on length.
    #[error("batch axis `{axis}` has {actual} entries, expected {expected}")]
    RaggedBatch {
        axis: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A batch reaches past the width the object was configured with.
    #[error("batch covers indices {offset}..{end} but the object is {expected} wide")]
    WidthMismatch {
        offset: usize,
        end: usize,
        expected: usize,
    },

    /// `offset + width` does not fit in an index.
    #[error("batch at offset {offset} with {width} entries overflows the index range")]
    OffsetOverflow { offset: usize, width: usize },
    /// A batch would grow the list past the object's length limit.
    #[error("batch ends at index {end} but the list is capped at {max} records")]
    ListTooLong { end: usize, max: usize },
    /// The proxy set handed to the sampler no longer matches its initial width.
    #[error("proxy set has {actual} entries but the sampler was built for {expected}")]
    ProxyCountMismatch { expected: usize, actual: usize },

    /// Tuning values that would stall or divide the interpolation by zero.
    #[error("invalid sync tuning: {0}")]
    InvalidTuning(String),

    /// A mirror received a change for an index it cannot reach yet.
    #[error("delta touches index {index} but the mirror only holds {len} records")]
    MirrorGap { index: usize, len: usize },

    /// Another node must release authority before this one can take it.
    #[error("authority is held by node {holder}")]
    AuthorityHeld { holder: u64 },

    /// Only the authority holder may submit batches.
    #[error("node {node_id} does not hold authority")]
    NotAuthority { node_id: u64 },
}

impl SyncError {
    pub fn invalid_tuning(reason: impl Into<String>) -> Self {
        Self::InvalidTuning(reason.into())
    }

    /// Returns true for errors caused by mismatched sizes or bad settings rather than by
    /// protocol ordering.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::RaggedBatch { .. }
                | Self::WidthMismatch { .. }
                | Self::OffsetOverflow { .. }
                | Self::ListTooLong { .. }
                | Self::ProxyCountMismatch { .. }
                | Self::InvalidTuning(_)
        )
    }
}

use crate::filters3d::hyperstack::Hyperstack;
use thiserror::Error;

/// Result alias used throughout the filter engine.
pub type FilterResult<T> = Result<T, FilterError>;

/// Error type for 3D neighborhood filtering
///
/// Parameter and image-type problems are reported before any worker is
/// started. Runtime failures abort the whole operation and leave the
/// caller's image untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Invalid parameter provided to the operation
    ///
    /// Returned for negative or non-finite radii, out-of-range channel or
    /// frame selections, and type/kind combinations the engine rejects.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The image type cannot be decomposed into single-channel volumes
    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    /// Plane or buffer dimensions do not agree
    #[error("Dimension mismatch: expected {expected:?}, actual {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height, depth)
        expected: (u32, u32, u32),
        /// Actual dimensions (width, height, depth)
        actual: (u32, u32, u32),
    },

    /// A slab worker failed; reported only after every worker has been joined
    #[error("Worker failure: {0}")]
    WorkerFailure(String),

    /// Cooperative cancellation between (channel, frame) pairs
    #[error("Cancelled after {completed} of {total} channel/frame pairs")]
    Cancelled {
        /// Pairs whose results were committed before the stop request
        completed: usize,
        /// Pairs selected for processing
        total: usize,
        /// New stack holding the completed pairs, for kinds that build one
        ///
        /// Depth-preserving kinds commit into the caller's stack and leave
        /// this `None`.
        partial: Option<Box<Hyperstack>>,
    },
}

impl FilterError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

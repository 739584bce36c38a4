pub mod color_space;
pub mod texture_gen;
pub mod transfer_function;

pub use color_space::{ColorMode, compute_color};
pub use texture_gen::generate;
pub use transfer_function::{
    DirectTransfer, GaussianTransfer, TransferFunction, TransferFunctionKind,
    TriangularGaussianTransfer,
};

use thiserror::Error;

/// Configuration errors of the transfer-function pipeline. These are logged
/// and skipped by callers, never propagated across the engine boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TfError {
    #[error("transfer function must have at least one dimension")]
    ZeroDimension,

    #[error("axis vectors disagree with dimension count (expected {expected}, got {got})")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("gradient-aware transfer function needs a gradient axis (got {dims} dimension)")]
    GradientAxisMissing { dims: usize },

    #[error("texture grid must be 1-3 dimensional, got {0} axes")]
    UnsupportedGridRank(usize),

    #[error("texture grid rank {grid} does not match transfer function dimension {tf}")]
    GridRankMismatch { grid: usize, tf: usize },

    #[error("texture grid has a zero-sized axis")]
    EmptyGridAxis,
}

//! Error types for yolov5-post.

use thiserror::Error;

/// Result alias for postprocessing operations.
pub type PostprocessResult<T> = std::result::Result<T, PostprocessError>;

/// Errors that can occur when configuring or running the postprocessor.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PostprocessError {
    /// A configuration parameter is out of range.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
    /// A scale stride does not evenly divide the model input size.
    #[error("stride {stride} does not divide model size {model_size}")]
    StrideMismatch { stride: usize, model_size: usize },
    /// Tensor dimensions must all be non-zero.
    #[error("invalid tensor dimensions {grid_h}x{grid_w}x{channels}")]
    InvalidDimensions {
        grid_h: usize,
        grid_w: usize,
        channels: usize,
    },
    /// The raw buffer length does not match the declared dimensions.
    #[error("buffer length mismatch: expected {expected}, got {got}")]
    BufferLength { expected: usize, got: usize },
    /// Tensor shapes must be `[H, W, C]` or `[1, H, W, C]`.
    #[error("unsupported tensor shape of rank {rank}")]
    InvalidShape { rank: usize },
    /// A scale's tensor disagrees with the configured grid.
    #[error("scale {scale}: expected shape {expected:?}, got {got:?}")]
    InputShape {
        scale: usize,
        expected: [usize; 3],
        got: [usize; 3],
    },
    /// The worker thread pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

//! Error types for matrix, layer and network operations.

use thiserror::Error;

/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, NnError>;

/// Errors raised by the training core.
///
/// Every variant signals a programming or configuration mistake rather
/// than a transient fault. Operations check for them before touching any
/// destination buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NnError {
    /// Operand shapes disagree for an elementwise or structural operation.
    #[error("dimension mismatch in {op}: {left:?} vs {right:?}")]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Inner dimensions of a matrix product disagree.
    #[error("incompatible shapes for multiplication: {left:?} x {right:?}")]
    IncompatibleShape {
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Unknown activation, or softmax requested away from the output layer.
    #[error("unsupported activation: {0}")]
    UnsupportedActivation(String),

    /// The host could not provide a buffer of the requested size.
    #[error("failed to allocate a {rows}x{cols} matrix")]
    AllocationFailure { rows: usize, cols: usize },

    /// A matrix with a zero dimension was requested.
    #[error("matrices must have at least one row and one column")]
    EmptyShape,

    /// Invalid training or topology parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

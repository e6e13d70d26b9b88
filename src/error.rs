//! Error types for graph construction.

use thiserror::Error;

/// Errors that can occur while building a neighbor graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Invalid parameter value (zero `k`, empty row range, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// More neighbors requested than there are candidate points.
    #[error("requested {requested} neighbors but only {available} candidate points exist")]
    NotEnoughPoints { requested: usize, available: usize },

    /// Feature dimensionality differs between query and reference sets.
    #[error("dimension mismatch: queries have {query_dim} dimensions, references have {reference_dim}")]
    DimensionMismatch {
        query_dim: usize,
        reference_dim: usize,
    },

    /// Batch sizes differ between query and reference sets.
    #[error("batch mismatch: {query_batch} query sets vs {reference_batch} reference sets")]
    BatchMismatch {
        query_batch: usize,
        reference_batch: usize,
    },

    /// An input array does not have the shape the operation requires.
    #[error("{what} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Reshape failure reported by ndarray.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, GraphError>;

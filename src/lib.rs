//! patchgraph: k-nearest-neighbor graphs over patch feature maps.
//!
//! Graph-based feature extractors in learned image compression rebuild their
//! graph on every forward pass: each patch (or pixel within a window) is
//! connected to the `k` patches whose features are closest. This crate does
//! that construction for a whole batch at once and returns one flat edge list.
//!
//! - [`distance`]: batched squared-Euclidean distance matrices
//! - [`topk`]: per-row neighbor selection
//! - [`edges`]: batch-global sparse edge lists
//! - [`knn`]: the end-to-end routines, including row chunking for large sets
//! - [`graph`]: [`SparseKnnGraph`], normalization plus knn on `(B, C, H, W)` maps
//!
//! # Critical Nuances
//!
//! ## Node numbering
//!
//! Point `i` of batch element `b` is node `b * N + i`. Edges never cross batch
//! elements, so the batch is one graph with `B` disconnected components.
//!
//! ## Edge direction
//!
//! Row 0 of an [`EdgeIndex`] is the neighbor, row 1 the center. A message
//! passing layer aggregating along `source -> target` therefore pulls
//! neighbor features into each center.
//!
//! ## Self-loops
//!
//! Without self-loops the best-ranked candidate is dropped, which for a set
//! queried against itself is normally the point itself. With self-loops (and
//! nearest ranking) nothing is excluded and every point is its own first neighbor.
//!
//! The drop is by rank, not by index. Distances come from the unclamped
//! `|a|^2 - 2 a.b + |b|^2` expansion, whose f32 cancellation error grows with
//! the squared norms. When a point's nearest-neighbor gap is not well above
//! that error, a neighbor can outrank the point's own entry and the point stays
//! in its own list. Self-removal is reliable only when neighbor gaps are much
//! larger than f32 rounding at the points' scale (normalized features are).
//!
//! ## Dissimilarity graphs
//!
//! `dissimilarity = true` ranks by largest distance. After normalization this
//! links each patch to its least similar patches.

pub mod distance;
pub mod edges;
pub mod error;
pub mod graph;
pub mod knn;
pub mod points;
pub mod topk;

mod batch;

// Re-exports
pub use edges::{flatten_edges, EdgeIndex};
pub use error::{GraphError, Result};
pub use graph::SparseKnnGraph;
pub use knn::{knn_indices, knn_sparse, xy_knn_indices, xy_knn_sparse, KnnParams, CHUNK_POINTS};
pub use topk::NeighborOrder;

//! Batched k-nearest-neighbor graphs.
//!
//! # Pipeline
//!
//! ```text
//! features (B, D, N, 1) -> points (B, N, D) -> distances (B, N, N)
//!     -> neighbor table (B, N, k) -> EdgeIndex (2, B*N*k)
//! ```
//!
//! # Memory
//!
//! The distance matrix is `N^2` floats per batch element. Above
//! [`CHUNK_POINTS`] points the query rows are processed in ranges of that
//! size, each range against the full set, so only `CHUNK_POINTS * N` distances
//! are alive at once. Chunking never changes the result.
//!
//! # Policies
//!
//! | `dissimilarity` | `self_loops` | ranking | requested | kept |
//! |-----------------|--------------|---------|-----------|------|
//! | true            | any          | largest | k         | all  |
//! | false           | true         | smallest| k         | all  |
//! | false           | false        | smallest| k + 1     | drop best |
//!
//! With `self_loops = true` under nearest ranking nothing excludes the point
//! itself, so it normally appears as its own first neighbor.
//!
//! "drop best" removes whichever candidate ranks first. The self-distance is
//! only approximately 0 in f32, so for points whose neighbor gaps are close to
//! the rounding error of their squared norms the point itself can survive the
//! drop (see the crate-level "Self-loops" notes).

use ndarray::{s, Array3, ArrayView3, ArrayView4, Axis};
use tracing::{debug, trace};

use crate::distance::{pairwise_distance, part_pairwise_distance, xy_pairwise_distance};
use crate::edges::{flatten_edges, EdgeIndex};
use crate::error::{GraphError, Result};
use crate::points::points_from_features;
use crate::topk::{select_neighbors, NeighborOrder};

/// Point count above which distances are computed in row chunks.
pub const CHUNK_POINTS: usize = 10_000;

/// Neighbor search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnnParams {
    /// Neighbors per point.
    pub k: usize,
    /// Connect each point to its most distant points instead of its closest.
    pub dissimilarity: bool,
    /// Keep the self-match instead of dropping the best-ranked candidate.
    pub self_loops: bool,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            k: 16,
            dissimilarity: false,
            self_loops: false,
        }
    }
}

impl KnnParams {
    /// Nearest-neighbor parameters with `k` neighbors and no self-loops.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    #[must_use]
    pub fn with_dissimilarity(mut self, dissimilarity: bool) -> Self {
        self.dissimilarity = dissimilarity;
        self
    }

    #[must_use]
    pub fn with_self_loops(mut self, self_loops: bool) -> Self {
        self.self_loops = self_loops;
        self
    }

    /// Ranking direction and whether the best-ranked candidate is dropped.
    #[must_use]
    pub fn selection(&self) -> (NeighborOrder, bool) {
        if self.dissimilarity {
            (NeighborOrder::Farthest, false)
        } else {
            (NeighborOrder::Nearest, !self.self_loops)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(GraphError::InvalidParameter(
                "k must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Neighbor table for a `(batch, points, dims)` point set queried against itself.
///
/// `relative_pos`, when given, is a `(batch, points, points)` bias added to the
/// distances before ranking. Returns `(batch, points, k)` local indices.
pub fn knn_indices(
    points: ArrayView3<'_, f32>,
    params: &KnnParams,
    relative_pos: Option<ArrayView3<'_, f32>>,
) -> Result<Array3<usize>> {
    knn_indices_chunked(points, params, relative_pos, CHUNK_POINTS)
}

/// [`knn_indices`] with an explicit chunk threshold.
pub(crate) fn knn_indices_chunked(
    points: ArrayView3<'_, f32>,
    params: &KnnParams,
    relative_pos: Option<ArrayView3<'_, f32>>,
    chunk: usize,
) -> Result<Array3<usize>> {
    params.validate()?;
    let chunk = chunk.max(1);
    let (batch, n, dims) = points.dim();
    if let Some(bias) = relative_pos {
        check_bias(bias, (batch, n, n))?;
    }
    let (order, drop_first) = params.selection();

    debug!(
        batch,
        points = n,
        dims,
        k = params.k,
        dissimilarity = params.dissimilarity,
        self_loops = params.self_loops,
        chunked = n > chunk,
        "building knn graph"
    );

    if n <= chunk {
        let dist = pairwise_distance(points);
        return select_neighbors(dist.view(), relative_pos, params.k, order, drop_first);
    }

    let mut nn_idx = Array3::zeros((batch, n, params.k));
    let mut start = 0;
    while start < n {
        let end = (start + chunk).min(n);
        trace!(start, end, "knn chunk");

        let dist = part_pairwise_distance(points, start, end)?;
        let bias = relative_pos.map(|bias| bias.slice_move(s![.., start..end, ..]));
        let part = select_neighbors(dist.view(), bias, params.k, order, drop_first)?;
        nn_idx.slice_mut(s![.., start..end, ..]).assign(&part);

        start = end;
    }
    Ok(nn_idx)
}

/// Neighbor table from each query in `x` to the references in `y`.
///
/// `x` is `(batch, nx, dims)`, `y` is `(batch, ny, dims)` and `relative_pos`
/// is `(batch, nx, ny)`. Returns `(batch, nx, k)` indices into `y`. When
/// `self_loops` is false the best-ranked reference is dropped, exactly as for
/// self-queries.
pub fn xy_knn_indices(
    x: ArrayView3<'_, f32>,
    y: ArrayView3<'_, f32>,
    params: &KnnParams,
    relative_pos: Option<ArrayView3<'_, f32>>,
) -> Result<Array3<usize>> {
    params.validate()?;
    let dist = xy_pairwise_distance(x, y)?;
    if let Some(bias) = relative_pos {
        check_bias(bias, dist.dim())?;
    }
    let (order, drop_first) = params.selection();

    debug!(
        batch = x.len_of(Axis(0)),
        queries = x.len_of(Axis(1)),
        references = y.len_of(Axis(1)),
        k = params.k,
        dissimilarity = params.dissimilarity,
        "building cross-set knn graph"
    );

    select_neighbors(dist.view(), relative_pos, params.k, order, drop_first)
}

/// Sparse knn graph of a `(batch, dims, points, 1)` feature map.
///
/// The edge list has `batch * points * k` edges; see [`EdgeIndex`].
pub fn knn_sparse(
    x: ArrayView4<'_, f32>,
    params: &KnnParams,
    relative_pos: Option<ArrayView3<'_, f32>>,
) -> Result<EdgeIndex> {
    let points = points_from_features(x)?;
    let nn_idx = knn_indices(points.view(), params, relative_pos)?;
    Ok(flatten_edges(nn_idx.view(), points.len_of(Axis(1))))
}

/// Sparse cross-set knn graph: centers from `x`, neighbors from `y`.
///
/// Both are `(batch, dims, points, 1)` feature maps with the same batch size
/// and dims. Center nodes are offset by `x`'s point count, neighbor nodes by
/// `y`'s.
pub fn xy_knn_sparse(
    x: ArrayView4<'_, f32>,
    y: ArrayView4<'_, f32>,
    params: &KnnParams,
    relative_pos: Option<ArrayView3<'_, f32>>,
) -> Result<EdgeIndex> {
    let x_points = points_from_features(x)?;
    let y_points = points_from_features(y)?;
    let nn_idx = xy_knn_indices(x_points.view(), y_points.view(), params, relative_pos)?;
    Ok(flatten_edges(nn_idx.view(), y_points.len_of(Axis(1))))
}

fn check_bias(bias: ArrayView3<'_, f32>, expected: (usize, usize, usize)) -> Result<()> {
    if bias.dim() != expected {
        return Err(GraphError::ShapeMismatch {
            what: "relative_pos",
            expected: vec![expected.0, expected.1, expected.2],
            actual: bias.shape().to_vec(),
        });
    }
    Ok(())
}

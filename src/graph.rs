//! `SparseKnnGraph`: dynamic graph construction over feature maps.
//!
//! Feature maps are L2-normalized per spatial position before the neighbor
//! search, so squared distances equal `2 - 2 cos(a, b)` and ranking is by
//! cosine similarity.
//!
//! # Example
//!
//! ```rust
//! use ndarray::Array4;
//! use patchgraph::{KnnParams, SparseKnnGraph};
//!
//! // batch 2, 8 channels, 4x4 window
//! let x = Array4::from_shape_fn((2, 8, 4, 4), |(b, c, h, w)| {
//!     ((b + 3 * c + 5 * h + 7 * w) % 13) as f32
//! });
//!
//! let graph = SparseKnnGraph::new(KnnParams::new(4));
//! let edges = graph.forward(x.view(), None)?;
//! assert_eq!(edges.num_edges(), 2 * 16 * 4);
//! # Ok::<(), patchgraph::GraphError>(())
//! ```

use ndarray::{ArrayView3, ArrayView4, Axis};
use tracing::debug;

use crate::edges::{flatten_edges, EdgeIndex};
use crate::error::Result;
use crate::knn::{knn_indices, xy_knn_indices, KnnParams};
use crate::points::{normalize_points, points_from_spatial};

/// Builds a knn edge list from `(batch, channels, height, width)` feature maps.
#[derive(Debug, Clone)]
pub struct SparseKnnGraph {
    params: KnnParams,
}

impl Default for SparseKnnGraph {
    fn default() -> Self {
        Self::new(KnnParams::new(9))
    }
}

impl SparseKnnGraph {
    #[must_use]
    pub fn new(params: KnnParams) -> Self {
        debug!(
            k = params.k,
            dissimilarity = params.dissimilarity,
            self_loops = params.self_loops,
            "sparse knn graph"
        );
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &KnnParams {
        &self.params
    }

    /// Edge list over all `batch * height * width` positions.
    ///
    /// `relative_pos` is an optional `(batch, h*w, h*w)` bias added to the
    /// distances of the normalized features.
    pub fn forward(
        &self,
        x: ArrayView4<'_, f32>,
        relative_pos: Option<ArrayView3<'_, f32>>,
    ) -> Result<EdgeIndex> {
        let mut points = points_from_spatial(x)?;
        normalize_points(&mut points);
        let nn_idx = knn_indices(points.view(), &self.params, relative_pos)?;
        Ok(flatten_edges(nn_idx.view(), points.len_of(Axis(1))))
    }

    /// Edge list from every position of `x` to its neighbors among the positions of `y`.
    ///
    /// Both maps must share batch size and channel count; their spatial sizes
    /// may differ. `relative_pos` is `(batch, hx*wx, hy*wy)`.
    pub fn forward_cross(
        &self,
        x: ArrayView4<'_, f32>,
        y: ArrayView4<'_, f32>,
        relative_pos: Option<ArrayView3<'_, f32>>,
    ) -> Result<EdgeIndex> {
        let mut x_points = points_from_spatial(x)?;
        let mut y_points = points_from_spatial(y)?;
        normalize_points(&mut x_points);
        normalize_points(&mut y_points);
        let nn_idx = xy_knn_indices(x_points.view(), y_points.view(), &self.params, relative_pos)?;
        Ok(flatten_edges(nn_idx.view(), y_points.len_of(Axis(1))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use ndarray::Array4;

    #[test]
    fn default_uses_nine_neighbors() {
        let g = SparseKnnGraph::default();
        assert_eq!(g.params().k, 9);
        assert!(!g.params().dissimilarity);
        assert!(!g.params().self_loops);
    }

    #[test]
    fn normalization_ignores_feature_scale() {
        // Raw features put position 2 nearest to position 0; by direction
        // position 1 is far closer.
        let x = Array4::from_shape_vec(
            (1, 2, 1, 3),
            vec![
                1.0, 10.0, 1.0, // channel 0
                0.0, 1.0, 3.0, // channel 1
            ],
        )
        .unwrap();
        let g = SparseKnnGraph::new(KnnParams::new(1));
        let e = g.forward(x.view(), None).unwrap();
        assert_eq!(e.neighbors_of(0).unwrap()[0], 1);
        assert_eq!(e.neighbors_of(1).unwrap()[0], 0);
    }

    #[test]
    fn cross_graph_offsets_by_each_map() {
        let x = Array4::from_shape_fn((2, 3, 2, 2), |(b, c, h, w)| (b + c * h + w) as f32 + 1.0);
        let y = Array4::from_shape_fn((2, 3, 3, 3), |(b, c, h, w)| (b * c + h + w) as f32 + 1.0);
        let g = SparseKnnGraph::new(KnnParams::new(2).with_self_loops(true));
        let e = g.forward_cross(x.view(), y.view(), None).unwrap();
        assert_eq!(e.num_edges(), 2 * 4 * 2);
        assert_eq!(e.num_target_nodes(), 8);
        assert_eq!(e.num_source_nodes(), 18);
        for (src, dst) in e.iter() {
            let b = dst / 4;
            assert!((b * 9..(b + 1) * 9).contains(&src));
        }
    }

    #[test]
    fn forward_rejects_too_small_window() {
        let x = Array4::<f32>::ones((1, 4, 2, 2));
        let g = SparseKnnGraph::new(KnnParams::new(4));
        assert!(matches!(
            g.forward(x.view(), None),
            Err(GraphError::NotEnoughPoints {
                requested: 5,
                available: 4
            })
        ));
    }
}

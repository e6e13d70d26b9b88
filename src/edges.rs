//! Sparse edge lists with batch-global node indices.
//!
//! A batch of `B` point sets with `N` points each is treated as one graph of
//! `B * N` nodes: point `i` of batch element `b` becomes node `b * N + i`.

use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayView3};

/// Directed edge list, shape `(2, num_edges)`.
///
/// Row 0 holds neighbor (source) nodes, row 1 center (target) nodes, so
/// messages flow from neighbor into center. Edges are grouped by center: the
/// `k` edges of center `c` occupy columns `c * k .. (c + 1) * k`, best
/// neighbor first.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeIndex {
    edges: Array2<i64>,
    k: usize,
    num_source_nodes: usize,
    num_target_nodes: usize,
}

impl EdgeIndex {
    /// Number of edges (`batch * points * k`).
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.ncols()
    }

    /// Edges per center node.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Size of the source (neighbor) node space, `batch * reference_points`.
    #[must_use]
    pub fn num_source_nodes(&self) -> usize {
        self.num_source_nodes
    }

    /// Size of the target (center) node space, `batch * query_points`.
    #[must_use]
    pub fn num_target_nodes(&self) -> usize {
        self.num_target_nodes
    }

    /// Source node of every edge.
    #[must_use]
    pub fn sources(&self) -> ArrayView1<'_, i64> {
        self.edges.row(0)
    }

    /// Target node of every edge.
    #[must_use]
    pub fn targets(&self) -> ArrayView1<'_, i64> {
        self.edges.row(1)
    }

    /// Iterate `(source, target)` pairs in edge order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.sources()
            .into_iter()
            .zip(self.targets())
            .map(|(s, t)| (*s, *t))
    }

    /// Neighbors of `center`, best first. `None` if `center` is out of range.
    #[must_use]
    pub fn neighbors_of(&self, center: usize) -> Option<ArrayView1<'_, i64>> {
        if center >= self.num_target_nodes {
            return None;
        }
        let start = center * self.k;
        Some(self.edges.slice(s![0, start..start + self.k]))
    }

    #[must_use]
    pub fn as_array(&self) -> ArrayView2<'_, i64> {
        self.edges.view()
    }

    #[must_use]
    pub fn into_array(self) -> Array2<i64> {
        self.edges
    }
}

/// Flatten a `(batch, points, k)` neighbor table into an [`EdgeIndex`].
///
/// Center `(b, i)` becomes node `b * points + i`; its neighbor `j` becomes
/// `b * reference_points + j`. For a set queried against itself
/// `reference_points == points`; for cross-set graphs the two node spaces are
/// offset independently.
#[must_use]
pub fn flatten_edges(nn_idx: ArrayView3<'_, usize>, reference_points: usize) -> EdgeIndex {
    let (batch, points, k) = nn_idx.dim();
    let mut edges = Array2::<i64>::zeros((2, batch * points * k));

    {
        let (mut sources, mut targets) = edges.multi_slice_mut((s![0, ..], s![1, ..]));
        for (((b, i, _), &j), (src, dst)) in nn_idx
            .indexed_iter()
            .zip(sources.iter_mut().zip(targets.iter_mut()))
        {
            *src = (b * reference_points + j) as i64;
            *dst = (b * points + i) as i64;
        }
    }

    EdgeIndex {
        edges,
        k,
        num_source_nodes: batch * reference_points,
        num_target_nodes: batch * points,
    }
}

//! Top-k neighbor selection over distance matrices.
//!
//! Each row of a `(batch, queries, references)` score matrix is ranked
//! independently and the best `k` column indices are kept, best first.
//!
//! # Ordering
//!
//! Scores are compared with [`f32::total_cmp`], then by column index. Two
//! candidates with equal scores therefore always come out lower index first,
//! which makes selection deterministic under ties. NaN scores sort after all
//! finite values for [`NeighborOrder::Nearest`] and before them for
//! [`NeighborOrder::Farthest`].
//!
//! # Self-match dropping
//!
//! With `drop_first`, `k + 1` candidates are ranked and the best one is
//! discarded. For a point set queried against itself the best nearest candidate
//! is usually the point itself, so this removes self-loops without looking at
//! indices. It is not guaranteed: an exact duplicate with a lower index ranks
//! ahead of the point itself, and so does any neighbor whose computed distance
//! falls below the point's f32 self-distance. That candidate is then dropped
//! and the self index survives.

use std::cmp::Ordering;

use ndarray::{Array3, ArrayView1, ArrayView3, ArrayViewMut1, Axis};

use crate::batch::for_each_batch;
use crate::error::{GraphError, Result};

/// Which end of the distance ranking to take neighbors from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NeighborOrder {
    /// Smallest distance first.
    Nearest,
    /// Largest distance first (dissimilarity graphs).
    Farthest,
}

impl NeighborOrder {
    #[inline]
    fn compare(self, a: &(f32, usize), b: &(f32, usize)) -> Ordering {
        let by_score = match self {
            NeighborOrder::Nearest => a.0.total_cmp(&b.0),
            NeighborOrder::Farthest => b.0.total_cmp(&a.0),
        };
        by_score.then(a.1.cmp(&b.1))
    }
}

/// Select `k` neighbor columns per row of `dist`.
///
/// `bias`, when given, must have the same shape as `dist` and is added
/// element-wise before ranking. With `drop_first`, `k + 1` columns are ranked
/// and the best-ranked one is discarded (see the module docs).
///
/// Returns a `(batch, queries, k)` table of column indices.
pub fn select_neighbors(
    dist: ArrayView3<'_, f32>,
    bias: Option<ArrayView3<'_, f32>>,
    k: usize,
    order: NeighborOrder,
    drop_first: bool,
) -> Result<Array3<usize>> {
    let (batch, rows, cols) = dist.dim();
    if k == 0 {
        return Err(GraphError::InvalidParameter(
            "k must be greater than 0".to_string(),
        ));
    }
    let take = if drop_first { k + 1 } else { k };
    if take > cols {
        return Err(GraphError::NotEnoughPoints {
            requested: take,
            available: cols,
        });
    }
    if let Some(bias) = bias {
        if bias.dim() != dist.dim() {
            return Err(GraphError::ShapeMismatch {
                what: "relative_pos",
                expected: dist.shape().to_vec(),
                actual: bias.shape().to_vec(),
            });
        }
    }

    let skip = take - k;
    let mut out = Array3::zeros((batch, rows, k));

    for_each_batch(&mut out, |b, mut slot| {
        let db = dist.index_axis(Axis(0), b);
        let bb = bias.map(|bias| bias.index_axis_move(Axis(0), b));
        let mut scratch = Vec::with_capacity(cols);

        for (r, out_row) in slot.outer_iter_mut().enumerate() {
            let scores = db.row(r);
            let offsets = bb.as_ref().map(|bb| bb.row(r));
            select_row(scores, offsets, take, skip, order, &mut scratch, out_row);
        }
    });
    Ok(out)
}

/// Rank one row and write the kept column indices into `out`.
fn select_row(
    scores: ArrayView1<'_, f32>,
    offsets: Option<ArrayView1<'_, f32>>,
    take: usize,
    skip: usize,
    order: NeighborOrder,
    scratch: &mut Vec<(f32, usize)>,
    mut out: ArrayViewMut1<'_, usize>,
) {
    scratch.clear();
    match offsets {
        Some(offsets) => scratch.extend(
            scores
                .iter()
                .zip(offsets.iter())
                .enumerate()
                .map(|(j, (d, o))| (d + o, j)),
        ),
        None => scratch.extend(scores.iter().enumerate().map(|(j, d)| (*d, j))),
    }

    let cmp = |a: &(f32, usize), b: &(f32, usize)| order.compare(a, b);
    if take < scratch.len() {
        scratch.select_nth_unstable_by(take - 1, cmp);
        scratch.truncate(take);
    }
    scratch.sort_unstable_by(cmp);

    for (slot, (_, j)) in out.iter_mut().zip(scratch.iter().skip(skip)) {
        *slot = *j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn one(rows: ndarray::Array2<f32>) -> Array3<f32> {
        rows.insert_axis(Axis(0))
    }

    #[test]
    fn nearest_takes_smallest() {
        let d = one(array![[0.0, 5.0, 1.0, 3.0], [4.0, 0.0, 2.0, 9.0]]);
        let nn = select_neighbors(d.view(), None, 2, NeighborOrder::Nearest, false).unwrap();
        assert_eq!(nn.index_axis(Axis(0), 0), array![[0_usize, 2], [1, 2]]);
    }

    #[test]
    fn drop_first_removes_best() {
        let d = one(array![[0.0, 5.0, 1.0, 3.0], [4.0, 0.0, 2.0, 9.0]]);
        let nn = select_neighbors(d.view(), None, 2, NeighborOrder::Nearest, true).unwrap();
        assert_eq!(nn.index_axis(Axis(0), 0), array![[2_usize, 3], [2, 0]]);
    }

    #[test]
    fn drop_first_is_by_rank_not_index() {
        // Row 0 is point 0; rounding left its self-distance above a neighbor's.
        let d = one(array![[1e-6, 0.0, 2.0], [0.5, 0.0, 1.0]]);
        let nn = select_neighbors(d.view(), None, 1, NeighborOrder::Nearest, true).unwrap();
        assert_eq!(nn[[0, 0, 0]], 0);
        assert_eq!(nn[[0, 1, 0]], 0);
    }

    #[test]
    fn farthest_takes_largest() {
        let d = one(array![[0.0, 5.0, 1.0, 3.0], [4.0, 0.0, 2.0, 9.0]]);
        let nn = select_neighbors(d.view(), None, 2, NeighborOrder::Farthest, false).unwrap();
        assert_eq!(nn.index_axis(Axis(0), 0), array![[1_usize, 3], [3, 0]]);
    }

    #[test]
    fn ties_prefer_lower_index() {
        let d = one(array![[1.0, 1.0, 1.0, 1.0]]);
        let near = select_neighbors(d.view(), None, 3, NeighborOrder::Nearest, false).unwrap();
        let far = select_neighbors(d.view(), None, 3, NeighborOrder::Farthest, false).unwrap();
        assert_eq!(near.into_raw_vec_and_offset().0, vec![0, 1, 2]);
        assert_eq!(far.into_raw_vec_and_offset().0, vec![0, 1, 2]);
    }

    #[test]
    fn bias_perturbs_ranking() {
        let d = one(array![[3.0, 1.0, 2.0]]);
        let bias = one(array![[0.0, 5.0, 0.0]]);
        let plain = select_neighbors(d.view(), None, 1, NeighborOrder::Nearest, false).unwrap();
        let biased =
            select_neighbors(d.view(), Some(bias.view()), 1, NeighborOrder::Nearest, false)
                .unwrap();
        assert_eq!(plain[[0, 0, 0]], 1);
        assert_eq!(biased[[0, 0, 0]], 2);
    }

    #[test]
    fn nan_ranks_last_for_nearest() {
        let d = one(array![[f32::NAN, 3.0, 1.0]]);
        let nn = select_neighbors(d.view(), None, 2, NeighborOrder::Nearest, false).unwrap();
        assert_eq!(nn.into_raw_vec_and_offset().0, vec![2, 1]);
    }

    #[test]
    fn rejects_zero_k_and_oversized_k() {
        let d = one(array![[0.0, 1.0, 2.0]]);
        assert!(matches!(
            select_neighbors(d.view(), None, 0, NeighborOrder::Nearest, false),
            Err(GraphError::InvalidParameter(_))
        ));
        assert!(matches!(
            select_neighbors(d.view(), None, 3, NeighborOrder::Nearest, true),
            Err(GraphError::NotEnoughPoints {
                requested: 4,
                available: 3
            })
        ));
        // exactly all columns is fine
        assert!(select_neighbors(d.view(), None, 3, NeighborOrder::Nearest, false).is_ok());
    }

    #[test]
    fn rejects_bias_of_wrong_shape() {
        let d = one(array![[0.0, 1.0, 2.0]]);
        let bias = one(array![[0.0, 1.0]]);
        assert!(matches!(
            select_neighbors(d.view(), Some(bias.view()), 1, NeighborOrder::Nearest, false),
            Err(GraphError::ShapeMismatch { .. })
        ));
    }
}

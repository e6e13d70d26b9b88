//! Pairwise squared-Euclidean distances over batched point sets.
//!
//! All three variants use the expansion
//!
//! ```text
//! |a - b|^2 = |a|^2 - 2 a.b + |b|^2
//! ```
//!
//! so the dominant cost is one matrix product per batch element.
//!
//! ## Important nuance
//!
//! The expansion can cancel to tiny negative values (self-distances in
//! particular). Results are **not** clamped: ranking only needs the relative
//! order, and clamping would create ties that the unclamped values do not have.

use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut2, Axis};

use crate::batch::for_each_batch;
use crate::error::{GraphError, Result};
use crate::points::squared_norms;

/// Distances between every pair of points within each batch element.
///
/// `x` is `(batch, points, dims)`; the result is `(batch, points, points)`.
#[must_use]
pub fn pairwise_distance(x: ArrayView3<'_, f32>) -> Array3<f32> {
    let (batch, points, _) = x.dim();
    let norms = squared_norms(x);
    let mut out = Array3::zeros((batch, points, points));

    for_each_batch(&mut out, |b, slot| {
        let xb = x.index_axis(Axis(0), b);
        let nb = norms.index_axis(Axis(0), b);
        expand_into(slot, xb, xb, nb, nb);
    });
    out
}

/// Distances from the query rows `start..end` to every point of the same element.
///
/// Bounds peak memory when the full `points x points` matrix would be too large.
/// The result is `(batch, end - start, points)`.
pub fn part_pairwise_distance(
    x: ArrayView3<'_, f32>,
    start: usize,
    end: usize,
) -> Result<Array3<f32>> {
    let (batch, points, _) = x.dim();
    if start >= end || end > points {
        return Err(GraphError::InvalidParameter(format!(
            "row range {start}..{end} is empty or exceeds {points} points"
        )));
    }

    let norms = squared_norms(x);
    let mut out = Array3::zeros((batch, end - start, points));

    for_each_batch(&mut out, |b, slot| {
        let xb = x.index_axis(Axis(0), b);
        let nb = norms.index_axis(Axis(0), b);
        expand_into(
            slot,
            xb.slice(s![start..end, ..]),
            xb,
            nb.slice(s![start..end]),
            nb,
        );
    });
    Ok(out)
}

/// Distances from every query in `x` to every reference in `y`.
///
/// `x` is `(batch, nx, dims)` and `y` is `(batch, ny, dims)`; the result is
/// `(batch, nx, ny)`.
pub fn xy_pairwise_distance(x: ArrayView3<'_, f32>, y: ArrayView3<'_, f32>) -> Result<Array3<f32>> {
    let (batch, nx, x_dim) = x.dim();
    let (y_batch, ny, y_dim) = y.dim();
    if batch != y_batch {
        return Err(GraphError::BatchMismatch {
            query_batch: batch,
            reference_batch: y_batch,
        });
    }
    if x_dim != y_dim {
        return Err(GraphError::DimensionMismatch {
            query_dim: x_dim,
            reference_dim: y_dim,
        });
    }

    let x_norms = squared_norms(x);
    let y_norms = squared_norms(y);
    let mut out = Array3::zeros((batch, nx, ny));

    for_each_batch(&mut out, |b, slot| {
        expand_into(
            slot,
            x.index_axis(Axis(0), b),
            y.index_axis(Axis(0), b),
            x_norms.index_axis(Axis(0), b),
            y_norms.index_axis(Axis(0), b),
        );
    });
    Ok(out)
}

/// Write `|q|^2 - 2 q.r + |r|^2` for all query/reference pairs into `out`.
fn expand_into(
    mut out: ArrayViewMut2<'_, f32>,
    queries: ArrayView2<'_, f32>,
    references: ArrayView2<'_, f32>,
    query_norms: ArrayView1<'_, f32>,
    reference_norms: ArrayView1<'_, f32>,
) {
    general_mat_mul(-2.0, &queries, &references.t(), 0.0, &mut out);
    out += &query_norms.insert_axis(Axis(1));
    out += &reference_norms.insert_axis(Axis(0));
}

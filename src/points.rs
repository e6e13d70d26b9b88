//! Layout conversions between feature maps and point sets.
//!
//! Feature extractors hand over channel-major maps, `(batch, channels, h, w)`.
//! Neighbor search wants point-major sets, `(batch, points, dims)`, so each
//! point's feature vector is a contiguous row.

use ndarray::{Array3, ArrayView1, ArrayView3, ArrayView4, ArrayViewMut1, Axis};

use crate::error::{GraphError, Result};

/// Lower bound on the norm divisor in [`normalize_points`].
pub const NORM_EPSILON: f32 = 1e-12;

/// Convert a `(batch, dims, points, 1)` feature map into a `(batch, points, dims)` point set.
///
/// The trailing axis must have length 1.
pub fn points_from_features(x: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
    let (batch, dims, points, width) = x.dim();
    if width != 1 {
        return Err(GraphError::ShapeMismatch {
            what: "feature map",
            expected: vec![batch, dims, points, 1],
            actual: vec![batch, dims, points, width],
        });
    }

    let squeezed = x.index_axis(Axis(3), 0);
    Ok(squeezed
        .permuted_axes([0, 2, 1])
        .as_standard_layout()
        .into_owned())
}

/// Convert a `(batch, channels, height, width)` map into a `(batch, height*width, channels)`
/// point set, one point per spatial position in row-major order.
pub fn points_from_spatial(x: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
    let (batch, channels, height, width) = x.dim();
    let flat = x.to_shape((batch, channels, height * width, 1))?;
    points_from_features(flat.view())
}

/// L2-normalize every point's feature vector in place.
///
/// Each vector is divided by `max(|v|, NORM_EPSILON)`, so all-zero vectors
/// stay zero instead of turning into NaN.
pub fn normalize_points(points: &mut Array3<f32>) {
    for mut row in points.rows_mut() {
        let n = row_norm_squared(row.view()).sqrt().max(NORM_EPSILON);
        scale_row(&mut row, 1.0 / n);
    }
}

/// Squared norm of every point, shape `(batch, points)`.
pub(crate) fn squared_norms(points: ArrayView3<'_, f32>) -> ndarray::Array2<f32> {
    points.map_axis(Axis(2), row_norm_squared)
}

fn row_norm_squared(row: ArrayView1<'_, f32>) -> f32 {
    row.dot(&row)
}

fn scale_row(row: &mut ArrayViewMut1<'_, f32>, factor: f32) {
    row.mapv_inplace(|v| v * factor);
}

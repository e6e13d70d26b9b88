//! Per-batch-element dispatch.
//!
//! Every batch element is independent, so the outer loop over the batch axis
//! is the one place where work is split across threads (`parallel` feature).

use ndarray::{Array3, ArrayViewMut2, Axis};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fill `out` one batch element at a time.
///
/// `fill(b, slot)` receives the batch index and the `(rows, cols)` slice of
/// `out` belonging to that element.
pub(crate) fn for_each_batch<T, F>(out: &mut Array3<T>, fill: F)
where
    T: Send + Sync,
    F: Fn(usize, ArrayViewMut2<'_, T>) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(b, slot)| fill(b, slot));

    #[cfg(not(feature = "parallel"))]
    for (b, slot) in out.axis_iter_mut(Axis(0)).enumerate() {
        fill(b, slot);
    }
}

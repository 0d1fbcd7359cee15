//! Length reconciliation for variable-length feature vectors.

use super::FeatureVector;
use ndarray::Array2;

/// Right-pad with `pad` or truncate so the result has exactly `dim` values.
pub fn reconcile(values: &[f64], dim: usize, pad: f64) -> Vec<f64> {
    let mut out = vec![pad; dim];
    let copy = values.len().min(dim);
    out[..copy].copy_from_slice(&values[..copy]);
    out
}

/// Stack a corpus into a rectangular matrix, right-padding every row to the
/// longest vector. An empty corpus gives a 0x0 matrix.
pub fn pad_matrix(corpus: &[FeatureVector], pad: f64) -> Array2<f64> {
    let cols = corpus.iter().map(FeatureVector::len).max().unwrap_or(0);
    let mut m = Array2::from_elem((corpus.len(), cols), pad);
    for (mut row, v) in m.rows_mut().into_iter().zip(corpus) {
        for (slot, x) in row.iter_mut().zip(v.as_slice()) {
            *slot = *x;
        }
    }
    m
}

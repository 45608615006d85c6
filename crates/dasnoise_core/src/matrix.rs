//! Shape checks and summary statistics shared by all stages.

use ndarray::{Array2, ArrayD, ArrayView2, Ix2};

use crate::error::{DasError, Result};
use crate::float_trait::DasFloat;

/// Reject matrices with a zero-length axis.
pub fn ensure_non_empty<F>(matrix: ArrayView2<F>, what: &str) -> Result<()> {
    let (rows, cols) = matrix.dim();
    if rows == 0 || cols == 0 {
        return Err(DasError::shape(format!(
            "{} matrix is empty ({}x{})",
            what, rows, cols
        )));
    }
    Ok(())
}

/// Require identical (channels, samples) shapes.
pub fn ensure_same_shape<F>(reference: ArrayView2<F>, candidate: ArrayView2<F>) -> Result<()> {
    if reference.dim() != candidate.dim() {
        return Err(DasError::shape(format!(
            "reference is {:?} but candidate is {:?}",
            reference.dim(),
            candidate.dim()
        )));
    }
    Ok(())
}

/// Convert a dynamically-dimensioned array (as produced by file loaders)
/// into a signal matrix. Anything that is not exactly 2-D is rejected.
pub fn into_signal_matrix<F>(array: ArrayD<F>) -> Result<Array2<F>> {
    let ndim = array.ndim();
    if ndim != 2 {
        return Err(DasError::shape(format!(
            "expected a 2-D (channels x samples) matrix, got {}-D with shape {:?}",
            ndim,
            array.shape()
        )));
    }
    array
        .into_dimensionality::<Ix2>()
        .map_err(|e| DasError::shape(e.to_string()))
}

/// Root-mean-square amplitude, accumulated in f64.
pub fn rms<F: DasFloat>(matrix: ArrayView2<F>) -> f64 {
    let n = matrix.len();
    if n == 0 {
        return 0.0;
    }
    let power: f64 = matrix
        .iter()
        .map(|&x| {
            let v = x.as_f64();
            v * v
        })
        .sum::<f64>()
        / n as f64;
    power.sqrt()
}

/// Minimum and maximum over the finite entries, or None if there are none.
pub fn finite_min_max<F: DasFloat>(matrix: ArrayView2<F>) -> Option<(f64, f64)> {
    matrix
        .iter()
        .map(|&x| x.as_f64())
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    #[test]
    fn test_empty_matrix_rejected() {
        let empty = Array2::<f64>::zeros((0, 5));
        let err = ensure_non_empty(empty.view(), "clean").unwrap_err();
        assert!(matches!(err, DasError::ShapeMismatch(_)));
    }

    #[test]
    fn test_shape_mismatch_detected() {
        let a = Array2::<f32>::zeros((3, 4));
        let b = Array2::<f32>::zeros((4, 3));
        assert!(ensure_same_shape(a.view(), b.view()).is_err());
        assert!(ensure_same_shape(a.view(), a.view()).is_ok());
    }

    #[test]
    fn test_into_signal_matrix_rejects_3d() {
        let cube = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
        let err = into_signal_matrix(cube).unwrap_err();
        assert!(matches!(err, DasError::ShapeMismatch(_)));

        let flat = ArrayD::<f64>::zeros(IxDyn(&[6]));
        assert!(into_signal_matrix(flat).is_err());
    }

    #[test]
    fn test_into_signal_matrix_keeps_values() {
        let dynamic = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let matrix = into_signal_matrix(dynamic).unwrap();
        assert_eq!(matrix, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_rms_and_min_max() {
        let m = array![[3.0f64, -3.0], [3.0, f64::NAN]];
        assert_eq!(finite_min_max(m.view()), Some((-3.0, 3.0)));

        let clean = array![[3.0f64, -3.0], [3.0, -3.0]];
        assert!((rms(clean.view()) - 3.0).abs() < 1e-12);
    }
}

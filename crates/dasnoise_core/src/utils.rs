use std::cmp::Ordering;

use crate::float_trait::DasFloat;

/// Normal-consistency constant of the median absolute deviation.
pub const MAD_SCALE: f64 = 0.6745;

/// Median of a slice using partial sorting (reorders the slice).
/// Even lengths average the two middle elements. Empty slices give zero.
pub fn median_of_slice<F: DasFloat>(data: &mut [F]) -> F {
    let len = data.len();
    if len == 0 {
        return F::zero();
    }
    let mid = len / 2;

    // select_nth_unstable finds the median in O(n)
    let (left, &mut upper, _) =
        data.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    if len % 2 == 1 {
        upper
    } else {
        // Everything left of mid is <= upper, so the lower middle is its max.
        let lower = left
            .iter()
            .copied()
            .fold(F::neg_infinity(), |acc, x| if x > acc { x } else { acc });
        (lower + upper) / F::from_f64_c(2.0)
    }
}

/// Robust noise sigma from wavelet detail coefficients: `median(|d|) / 0.6745`.
///
/// Detail coefficients of a noisy signal are zero-mean, so the deviation is
/// taken about zero rather than about the sample median.
pub fn mad_sigma<F: DasFloat>(detail: &[F]) -> f64 {
    if detail.is_empty() {
        return 0.0;
    }
    let mut magnitudes: Vec<f64> = detail.iter().map(|d| d.as_f64().abs()).collect();
    median_of_slice(&mut magnitudes) / MAD_SCALE
}

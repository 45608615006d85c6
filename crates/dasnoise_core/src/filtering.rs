//! Separable convolution primitives shared by the Gaussian, moving-average
//! and SSIM computations.
//!
//! Axis conventions: axis 0 is the channel axis (rows), axis 1 is the sample
//! axis (columns). "Along samples" means convolving each row.
//!
//! ## SIMD Optimization Notes
//!
//! - Each lane is copied into a pre-padded buffer so the hot loop is branchless
//! - The padded buffer is reused across lanes in the sequential path
//! - Large matrices are processed lane-parallel with rayon

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::float_trait::DasFloat;

/// Minimum lane count for parallel processing.
/// Set high to avoid rayon overhead for smaller matrices.
const PARALLEL_LANE_THRESHOLD: usize = 512;

/// Largest kernel half-width any filter will build.
pub const MAX_KERNEL_RADIUS: usize = 4096;

/// Boundary extension used when a kernel overhangs the matrix edge.
///
/// The choice materially affects the first and last few rows/columns of a
/// filtered matrix, so every filter takes it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// Half-sample symmetric: `d c b a | a b c d | d c b a`.
    #[default]
    Reflect,
    /// Replicate the edge sample: `a a a a | a b c d | d d d d`.
    Nearest,
    /// Zero padding: `0 0 0 0 | a b c d | 0 0 0 0`.
    Zero,
}

impl BoundaryMode {
    /// Map a possibly out-of-range index onto the lane.
    /// Returns None when the extension is zero padding.
    ///
    /// Reflection is periodic with period `2 * len`, so it stays valid for
    /// kernels wider than the lane itself.
    #[inline(always)]
    pub fn resolve(self, idx: isize, len: usize) -> Option<usize> {
        let n = len as isize;
        if (0..n).contains(&idx) {
            return Some(idx as usize);
        }
        match self {
            BoundaryMode::Reflect => {
                let m = idx.rem_euclid(2 * n);
                let folded = if m < n { m } else { 2 * n - 1 - m };
                Some(folded as usize)
            }
            BoundaryMode::Nearest => Some(idx.clamp(0, n - 1) as usize),
            BoundaryMode::Zero => None,
        }
    }
}

/// Compute 1D Gaussian kernel with given sigma.
/// Kernel size is ceil(4 * sigma) * 2 + 1, normalized to unit sum.
pub fn gaussian_kernel_1d<F: DasFloat>(sigma: F) -> Vec<F> {
    if sigma <= F::zero() {
        return vec![F::one()];
    }

    let radius = (F::GAUSSIAN_TRUNCATE * sigma)
        .ceil()
        .to_usize()
        .unwrap_or(0);
    let size = 2 * radius + 1;
    let mut kernel = vec![F::zero(); size];

    let two_sigma2 = F::from_f64_c(2.0) * sigma * sigma;
    let mut sum = F::zero();

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = F::usize_as(i) - F::usize_as(radius);
        let val = (-(x * x) / two_sigma2).exp();
        *k = val;
        sum += val;
    }

    let inv_sum = F::one() / sum;
    for val in kernel.iter_mut() {
        *val *= inv_sum;
    }

    kernel
}

/// Uniform (box) kernel of the given length.
pub fn box_kernel_1d<F: DasFloat>(len: usize) -> Vec<F> {
    let len = len.max(1);
    vec![F::one() / F::usize_as(len); len]
}

/// Fill a pre-allocated padded buffer with the lane plus its boundary extension.
#[inline]
fn fill_padded_lane<F: DasFloat>(
    input: &[F],
    radius: usize,
    mode: BoundaryMode,
    padded: &mut Vec<F>,
) {
    let n = input.len();
    padded.clear();
    padded.reserve(n + 2 * radius);

    for i in 0..radius {
        let idx = i as isize - radius as isize;
        padded.push(mode.resolve(idx, n).map_or(F::zero(), |j| input[j]));
    }
    padded.extend_from_slice(input);
    for i in 0..radius {
        let idx = (n + i) as isize;
        padded.push(mode.resolve(idx, n).map_or(F::zero(), |j| input[j]));
    }
}

/// Apply 1D correlation to a padded buffer (no bounds checking needed).
/// Kernels used here are symmetric, so this equals convolution.
#[inline]
fn convolve_1d_padded<F: DasFloat>(padded: &[F], kernel: &[F], output: &mut [F]) {
    let klen = kernel.len();
    for (i, out) in output.iter_mut().enumerate() {
        let mut sum = F::zero();
        for k in 0..klen {
            sum += padded[i + k] * kernel[k];
        }
        *out = sum;
    }
}

/// Convolve every row of `input` with `kernel` (filtering along the sample axis).
pub fn convolve_rows<F: DasFloat>(
    input: ArrayView2<F>,
    kernel: &[F],
    mode: BoundaryMode,
) -> Array2<F> {
    let (rows, cols) = input.dim();
    let radius = kernel.len() / 2;
    let mut output = Array2::zeros((rows, cols));

    if rows == 0 || cols == 0 {
        return output;
    }

    if rows >= PARALLEL_LANE_THRESHOLD {
        let output_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        let input_rows: Vec<_> = input.axis_iter(Axis(0)).collect();

        output_rows
            .into_par_iter()
            .zip(input_rows.into_par_iter())
            .for_each(|(mut out_row, in_row)| {
                let lane: Vec<F> = in_row.iter().copied().collect();
                let mut padded = Vec::with_capacity(cols + 2 * radius);
                fill_padded_lane(&lane, radius, mode, &mut padded);
                let mut out_lane = vec![F::zero(); cols];
                convolve_1d_padded(&padded, kernel, &mut out_lane);
                for (dst, src) in out_row.iter_mut().zip(out_lane) {
                    *dst = src;
                }
            });
    } else {
        let mut lane = Vec::with_capacity(cols);
        let mut padded = Vec::with_capacity(cols + 2 * radius);
        let mut out_lane = vec![F::zero(); cols];

        for r in 0..rows {
            lane.clear();
            lane.extend(input.row(r).iter().copied());
            fill_padded_lane(&lane, radius, mode, &mut padded);
            convolve_1d_padded(&padded, kernel, &mut out_lane);
            for (dst, &src) in output.row_mut(r).iter_mut().zip(out_lane.iter()) {
                *dst = src;
            }
        }
    }

    output
}

/// Convolve every column of `input` with `kernel` (filtering along the channel axis).
pub fn convolve_cols<F: DasFloat>(
    input: ArrayView2<F>,
    kernel: &[F],
    mode: BoundaryMode,
) -> Array2<F> {
    // Columns of the input are rows of its transpose.
    convolve_rows(input.t(), kernel, mode).reversed_axes()
}

/// Separable filter: `sample_kernel` along rows, then `channel_kernel` along columns.
/// A single-tap kernel of weight one is skipped.
pub fn separable_filter<F: DasFloat>(
    input: ArrayView2<F>,
    channel_kernel: &[F],
    sample_kernel: &[F],
    mode: BoundaryMode,
) -> Array2<F> {
    let is_identity = |k: &[F]| k.len() == 1 && k[0] == F::one();

    let along_samples = if is_identity(sample_kernel) {
        input.to_owned()
    } else {
        convolve_rows(input, sample_kernel, mode)
    };

    if is_identity(channel_kernel) {
        along_samples
    } else {
        convolve_cols(along_samples.view(), channel_kernel, mode)
    }
}

/// Local mean over a `channel_window x sample_window` box.
pub fn uniform_filter_2d<F: DasFloat>(
    input: ArrayView2<F>,
    channel_window: usize,
    sample_window: usize,
    mode: BoundaryMode,
) -> Array2<F> {
    separable_filter(
        input,
        &box_kernel_1d::<F>(channel_window),
        &box_kernel_1d::<F>(sample_window),
        mode,
    )
}

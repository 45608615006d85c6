use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DasError, Result};
use crate::float_trait::DasFloat;

const DEFAULT_SPATIAL_SIGMA: f64 = 10.0;
const DEFAULT_INTENSITY_SIGMA: f64 = 20.0;
const DEFAULT_WINDOW: usize = 10;

/// Each output row costs a full window per sample, so rows are farmed out
/// to rayon much earlier than in the separable filters.
const PARALLEL_MIN_ROWS: usize = 32;

/// Edge-preserving smoothing weighted by distance and amplitude difference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilateralParams {
    /// Spatial Gaussian width in samples/channels. Default: 10.0
    pub spatial_sigma: f64,
    /// Range Gaussian width in signal units. Default: 20.0
    pub intensity_sigma: f64,
    /// Neighbourhood size; even sizes are widened by one. Default: 10
    pub window: usize,
}

impl Default for BilateralParams {
    fn default() -> Self {
        Self {
            spatial_sigma: DEFAULT_SPATIAL_SIGMA,
            intensity_sigma: DEFAULT_INTENSITY_SIGMA,
            window: DEFAULT_WINDOW,
        }
    }
}

impl BilateralParams {
    pub fn validate(&self) -> Result<()> {
        if !self.spatial_sigma.is_finite() || self.spatial_sigma <= 0.0 {
            return Err(DasError::invalid(format!(
                "bilateral spatial_sigma must be finite and > 0, got {}",
                self.spatial_sigma
            )));
        }
        if !self.intensity_sigma.is_finite() || self.intensity_sigma <= 0.0 {
            return Err(DasError::invalid(format!(
                "bilateral intensity_sigma must be finite and > 0, got {}",
                self.intensity_sigma
            )));
        }
        if self.window == 0 {
            return Err(DasError::invalid("bilateral window must be > 0"));
        }
        Ok(())
    }

    /// Window actually used: the next odd size.
    pub fn effective_window(&self) -> usize {
        self.window | 1
    }
}

fn bilateral_row<F: DasFloat>(
    noisy: &ArrayView2<F>,
    r: usize,
    half: usize,
    spatial: &Array2<F>,
    inv_two_range2: F,
    out_row: &mut [F],
) {
    let (rows, cols) = noisy.dim();
    let r0 = r.saturating_sub(half);
    let r1 = (r + half).min(rows - 1);

    for (c, out) in out_row.iter_mut().enumerate() {
        let c0 = c.saturating_sub(half);
        let c1 = (c + half).min(cols - 1);
        let center = noisy[[r, c]];

        let mut weighted = F::zero();
        let mut norm = F::zero();
        for i in r0..=r1 {
            let si = i + half - r;
            for j in c0..=c1 {
                let v = noisy[[i, j]];
                let diff = v - center;
                let w = spatial[[si, j + half - c]] * (-(diff * diff) * inv_two_range2).exp();
                weighted += w * v;
                norm += w;
            }
        }

        // The centre always contributes weight one, so norm > 0
        *out = weighted / norm;
    }
}

pub fn bilateral_filter<F: DasFloat>(noisy: ArrayView2<F>, params: &BilateralParams) -> Array2<F> {
    let (rows, cols) = noisy.dim();
    // Neighbours past the matrix edge are skipped, so a window wider than
    // the matrix itself gives the same result as this one
    let window = params.effective_window().min(2 * rows.max(cols) + 1);
    let half = window / 2;

    let two_spatial2 = 2.0 * params.spatial_sigma * params.spatial_sigma;
    let spatial = Array2::from_shape_fn((window, window), |(i, j)| {
        let di = i as f64 - half as f64;
        let dj = j as f64 - half as f64;
        F::from_f64_c((-(di * di + dj * dj) / two_spatial2).exp())
    });
    let inv_two_range2 =
        F::from_f64_c(1.0 / (2.0 * params.intensity_sigma * params.intensity_sigma));

    let mut output = Array2::zeros((rows, cols));
    if rows == 0 || cols == 0 {
        return output;
    }

    if rows >= PARALLEL_MIN_ROWS {
        let out_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        out_rows
            .into_par_iter()
            .enumerate()
            .for_each(|(r, mut out_row)| {
                let mut lane = vec![F::zero(); cols];
                bilateral_row(&noisy, r, half, &spatial, inv_two_range2, &mut lane);
                for (dst, src) in out_row.iter_mut().zip(lane) {
                    *dst = src;
                }
            });
    } else {
        let mut lane = vec![F::zero(); cols];
        for r in 0..rows {
            bilateral_row(&noisy, r, half, &spatial, inv_two_range2, &mut lane);
            for (dst, &src) in output.row_mut(r).iter_mut().zip(lane.iter()) {
                *dst = src;
            }
        }
    }

    output
}

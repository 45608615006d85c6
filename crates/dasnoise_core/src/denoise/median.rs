use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DasError, Result};
use crate::filtering::BoundaryMode;
use crate::float_trait::DasFloat;
use crate::utils::median_of_slice;

use super::{check_odd_window, PARALLEL_ROW_THRESHOLD};

/// Default neighbourhood size.
const DEFAULT_WINDOW: usize = 3;

/// Most samples a single median neighbourhood may hold (e.g. 255 x 255).
pub const MAX_NEIGHBOURHOOD: usize = 1 << 16;

/// Rank-order filter; removes isolated spikes while keeping edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedianParams {
    /// Odd window length along the sample axis. Default: 3
    pub window: usize,
    /// Odd window length along the channel axis. Defaults to `window`.
    pub channel_window: Option<usize>,
    pub boundary: BoundaryMode,
}

impl Default for MedianParams {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            channel_window: None,
            boundary: BoundaryMode::default(),
        }
    }
}

impl MedianParams {
    pub fn validate(&self) -> Result<()> {
        check_odd_window("median window", self.window)?;
        if let Some(w) = self.channel_window {
            check_odd_window("median channel_window", w)?;
        }
        let ch_window = self.channel_window.unwrap_or(self.window);
        if ch_window * self.window > MAX_NEIGHBOURHOOD {
            return Err(DasError::invalid(format!(
                "median neighbourhood {}x{} exceeds {} samples",
                ch_window, self.window, MAX_NEIGHBOURHOOD
            )));
        }
        Ok(())
    }
}

/// Fill one output row with neighbourhood medians.
fn median_row<F: DasFloat>(
    noisy: &ArrayView2<F>,
    r: usize,
    (ch_radius, s_radius): (usize, usize),
    boundary: BoundaryMode,
    buffer: &mut Vec<F>,
    out_row: &mut [F],
) {
    let (rows, cols) = noisy.dim();
    for (c, out) in out_row.iter_mut().enumerate() {
        buffer.clear();
        for dr in -(ch_radius as isize)..=(ch_radius as isize) {
            let rr = boundary.resolve(r as isize + dr, rows);
            for dc in -(s_radius as isize)..=(s_radius as isize) {
                let cc = boundary.resolve(c as isize + dc, cols);
                let v = match (rr, cc) {
                    (Some(i), Some(j)) => noisy[[i, j]],
                    _ => F::zero(),
                };
                buffer.push(v);
            }
        }
        *out = median_of_slice(buffer);
    }
}

pub fn median_filter<F: DasFloat>(noisy: ArrayView2<F>, params: &MedianParams) -> Array2<F> {
    let (rows, cols) = noisy.dim();
    let ch_window = params.channel_window.unwrap_or(params.window);
    let radii = (ch_window / 2, params.window / 2);
    let boundary = params.boundary;
    let mut output = Array2::zeros((rows, cols));

    if rows >= PARALLEL_ROW_THRESHOLD {
        let out_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        out_rows
            .into_par_iter()
            .enumerate()
            .for_each(|(r, mut out_row)| {
                let mut buffer = Vec::with_capacity(ch_window * params.window);
                let mut lane = vec![F::zero(); cols];
                median_row(&noisy, r, radii, boundary, &mut buffer, &mut lane);
                for (dst, src) in out_row.iter_mut().zip(lane) {
                    *dst = src;
                }
            });
    } else {
        let mut buffer = Vec::with_capacity(ch_window * params.window);
        let mut lane = vec![F::zero(); cols];
        for r in 0..rows {
            median_row(&noisy, r, radii, boundary, &mut buffer, &mut lane);
            for (dst, &src) in output.row_mut(r).iter_mut().zip(lane.iter()) {
                *dst = src;
            }
        }
    }

    output
}

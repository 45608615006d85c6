//! VisuShrink wavelet denoising.
//!
//! Detail coefficients are shrunk towards zero by the universal threshold
//! `T = sigma * multiplier * sqrt(2 ln n)`, where `sigma` is estimated from
//! the finest detail band as `median(|d|) / 0.6745`. Approximation
//! coefficients pass through untouched.

use log::debug;
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DasError, Result};
use crate::float_trait::DasFloat;
use crate::transforms::{max_level, wavedec, wavedec2, waverec, waverec2, FilterBank, WaveletFamily};
use crate::utils::mad_sigma;

use super::PARALLEL_ROW_THRESHOLD;

const DEFAULT_LEVEL: usize = 3;
const DEFAULT_SIGMA_MULTIPLIER: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// `sign(x) * max(|x| - T, 0)`
    #[default]
    Soft,
    /// Zero coefficients with `|x| <= T`, keep the rest unchanged.
    Hard,
}

/// How the matrix is decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveletLayout {
    /// Each channel is decomposed independently along samples.
    #[default]
    Rows,
    /// Separable 2-D decomposition of the whole matrix.
    Matrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveletParams {
    /// Default: db4
    pub wavelet: WaveletFamily,
    /// Requested decomposition depth, clamped to what the data supports. Default: 3
    pub level: usize,
    pub threshold_mode: ThresholdMode,
    /// Scales the universal threshold. 0 disables shrinkage. Default: 1.0
    pub sigma_multiplier: f64,
    /// Known noise level; skips the MAD estimate when set.
    pub noise_sigma: Option<f64>,
    pub layout: WaveletLayout,
}

impl Default for WaveletParams {
    fn default() -> Self {
        Self {
            wavelet: WaveletFamily::default(),
            level: DEFAULT_LEVEL,
            threshold_mode: ThresholdMode::default(),
            sigma_multiplier: DEFAULT_SIGMA_MULTIPLIER,
            noise_sigma: None,
            layout: WaveletLayout::default(),
        }
    }
}

impl WaveletParams {
    pub fn validate(&self) -> Result<()> {
        if self.level == 0 {
            return Err(DasError::invalid("wavelet level must be > 0"));
        }
        if !self.sigma_multiplier.is_finite() || self.sigma_multiplier < 0.0 {
            return Err(DasError::invalid(format!(
                "wavelet sigma_multiplier must be finite and >= 0, got {}",
                self.sigma_multiplier
            )));
        }
        if let Some(s) = self.noise_sigma {
            if !s.is_finite() || s < 0.0 {
                return Err(DasError::invalid(format!(
                    "wavelet noise_sigma must be finite and >= 0, got {}",
                    s
                )));
            }
        }
        Ok(())
    }
}

/// Universal threshold for `n` coefficients.
pub fn universal_threshold(sigma: f64, multiplier: f64, n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    sigma * multiplier * (2.0 * (n as f64).ln()).sqrt()
}

#[inline]
fn shrink<F: DasFloat>(x: F, t: F, mode: ThresholdMode) -> F {
    if x.abs() <= t {
        return F::zero();
    }
    match mode {
        ThresholdMode::Soft => x - t * x.signum(),
        ThresholdMode::Hard => x,
    }
}

fn shrink_all<'a, F: DasFloat>(coeffs: impl Iterator<Item = &'a mut F>, t: F, mode: ThresholdMode) {
    for c in coeffs {
        *c = shrink(*c, t, mode);
    }
}

pub fn wavelet_denoise<F: DasFloat>(noisy: ArrayView2<F>, params: &WaveletParams) -> Array2<F> {
    let bank = FilterBank::<F>::new(params.wavelet);
    match params.layout {
        WaveletLayout::Rows => denoise_rows(noisy, params, &bank),
        WaveletLayout::Matrix => denoise_matrix(noisy, params, &bank),
    }
}

fn denoise_lane<F: DasFloat>(
    lane: &[F],
    params: &WaveletParams,
    bank: &FilterBank<F>,
    level: usize,
) -> Vec<F> {
    let mut dec = wavedec(lane, bank, level);
    let sigma = match (params.noise_sigma, dec.details.first()) {
        (Some(s), _) => s,
        (None, Some(finest)) => mad_sigma(finest),
        (None, None) => 0.0,
    };
    let t = F::from_f64_c(universal_threshold(
        sigma,
        params.sigma_multiplier,
        lane.len(),
    ));
    for detail in dec.details.iter_mut() {
        shrink_all(detail.iter_mut(), t, params.threshold_mode);
    }
    waverec(&dec, bank)
}

fn denoise_rows<F: DasFloat>(
    noisy: ArrayView2<F>,
    params: &WaveletParams,
    bank: &FilterBank<F>,
) -> Array2<F> {
    let (rows, cols) = noisy.dim();
    let level = params.level.min(max_level(cols, bank.len()));
    if level < params.level {
        debug!(
            "Wavelet level {} clamped to {} for {} samples ({})",
            params.level, level, cols, params.wavelet
        );
    }
    if level == 0 {
        return noisy.to_owned();
    }

    let mut output = Array2::zeros((rows, cols));
    let process = |in_row: ndarray::ArrayView1<F>, mut out_row: ndarray::ArrayViewMut1<F>| {
        let lane: Vec<F> = in_row.iter().copied().collect();
        let denoised = denoise_lane(&lane, params, bank, level);
        for (dst, src) in out_row.iter_mut().zip(denoised) {
            *dst = src;
        }
    };

    if rows >= PARALLEL_ROW_THRESHOLD {
        let out_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        let in_rows: Vec<_> = noisy.axis_iter(Axis(0)).collect();
        in_rows
            .into_par_iter()
            .zip(out_rows.into_par_iter())
            .for_each(|(i, o)| process(i, o));
    } else {
        for (i, o) in noisy.axis_iter(Axis(0)).zip(output.axis_iter_mut(Axis(0))) {
            process(i, o);
        }
    }

    output
}

fn denoise_matrix<F: DasFloat>(
    noisy: ArrayView2<F>,
    params: &WaveletParams,
    bank: &FilterBank<F>,
) -> Array2<F> {
    let (rows, cols) = noisy.dim();
    let supported = max_level(rows, bank.len()).min(max_level(cols, bank.len()));
    let level = params.level.min(supported);
    if level < params.level {
        debug!(
            "Wavelet level {} clamped to {} for {:?} matrix ({})",
            params.level,
            level,
            (rows, cols),
            params.wavelet
        );
    }
    if level == 0 {
        return noisy.to_owned();
    }

    let mut dec = wavedec2(noisy, bank, level);
    let sigma = match (params.noise_sigma, dec.details.first()) {
        (Some(s), _) => s,
        (None, Some(finest)) => {
            let coeffs: Vec<F> = finest
                .bands()
                .iter()
                .flat_map(|band| band.iter().copied())
                .collect();
            mad_sigma(&coeffs)
        }
        (None, None) => 0.0,
    };
    let t = F::from_f64_c(universal_threshold(
        sigma,
        params.sigma_multiplier,
        rows * cols,
    ));
    debug!("Wavelet 2-D sigma {:.6}, threshold {:.6}", sigma, t.as_f64());

    for level_bands in dec.details.iter_mut() {
        for band in level_bands.bands_mut() {
            shrink_all(band.iter_mut(), t, params.threshold_mode);
        }
    }
    waverec2(&dec, bank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::mse;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::{Distribution, Normal};

    fn chirp(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let t = c as f64 / cols as f64;
            (2.0 * std::f64::consts::PI * (3.0 + r as f64 * 0.5) * t).sin()
        })
    }

    fn add_noise(clean: &Array2<f64>, sigma: f64, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, sigma).unwrap();
        clean.mapv(|v| v + normal.sample(&mut rng))
    }

    fn smooth_field(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let u = 2.0 * std::f64::consts::PI * c as f64 / cols as f64;
            let v = 2.0 * std::f64::consts::PI * r as f64 / rows as f64;
            (2.0 * u).sin() * v.cos()
        })
    }

    fn total_variation(m: &Array2<f64>) -> f64 {
        let (rows, cols) = m.dim();
        let mut tv = 0.0;
        for r in 0..rows {
            for c in 1..cols {
                tv += (m[[r, c]] - m[[r, c - 1]]).abs();
            }
        }
        tv
    }

    #[test]
    fn test_shrink_modes() {
        assert_eq!(shrink(3.0f64, 1.0, ThresholdMode::Soft), 2.0);
        assert_eq!(shrink(-3.0f64, 1.0, ThresholdMode::Soft), -2.0);
        assert_eq!(shrink(0.5f64, 1.0, ThresholdMode::Soft), 0.0);
        assert_eq!(shrink(3.0f64, 1.0, ThresholdMode::Hard), 3.0);
        assert_eq!(shrink(-1.0f64, 1.0, ThresholdMode::Hard), 0.0);
    }

    #[test]
    fn test_zero_threshold_round_trip() {
        let input = add_noise(&chirp(4, 101), 0.3, 1);
        for family in WaveletFamily::ALL {
            for layout in [WaveletLayout::Rows, WaveletLayout::Matrix] {
                let params = WaveletParams {
                    wavelet: family,
                    level: 4,
                    sigma_multiplier: 0.0,
                    layout,
                    ..Default::default()
                };
                let out = wavelet_denoise(input.view(), &params);
                for (x, y) in input.iter().zip(out.iter()) {
                    assert_abs_diff_eq!(x, y, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_reduces_gaussian_noise() {
        let clean = chirp(8, 512);
        let noisy = add_noise(&clean, 0.2, 2);
        let out = wavelet_denoise(noisy.view(), &WaveletParams::default());

        let before = mse(clean.view(), noisy.view()).unwrap();
        let after = mse(clean.view(), out.view()).unwrap();
        assert!(after < before * 0.7, "mse {} -> {}", before, after);
    }

    #[test]
    fn test_matrix_layout_reduces_noise() {
        let clean = smooth_field(64, 128);
        let noisy = add_noise(&clean, 0.2, 3);
        let params = WaveletParams {
            layout: WaveletLayout::Matrix,
            wavelet: WaveletFamily::Sym4,
            ..Default::default()
        };
        let out = wavelet_denoise(noisy.view(), &params);
        let before = mse(clean.view(), noisy.view()).unwrap();
        let after = mse(clean.view(), out.view()).unwrap();
        assert!(after < before * 0.5, "mse {} -> {}", before, after);
    }

    #[test]
    fn test_short_rows_pass_through() {
        let input = Array2::from_shape_fn((2, 5), |(r, c)| (r + c) as f64);
        let out = wavelet_denoise(input.view(), &WaveletParams::default());
        assert_eq!(out, input);
    }

    #[test]
    fn test_known_noise_sigma_overrides_estimate() {
        let input = add_noise(&chirp(2, 256), 0.1, 4);
        let params = WaveletParams {
            noise_sigma: Some(1e6),
            ..Default::default()
        };
        let out = wavelet_denoise(input.view(), &params);
        // Every detail coefficient is zeroed, leaving a smooth approximation
        assert!(total_variation(&out) < total_variation(&input) * 0.5);
    }

    #[test]
    fn test_validation() {
        let params = WaveletParams {
            level: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        let params = WaveletParams {
            sigma_multiplier: -1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(WaveletParams::default().validate().is_ok());
    }

    #[test]
    fn test_universal_threshold() {
        assert_eq!(universal_threshold(1.0, 1.0, 1), 0.0);
        assert_abs_diff_eq!(
            universal_threshold(0.5, 2.0, 100),
            (2.0 * 100f64.ln()).sqrt(),
            epsilon = 1e-12
        );
    }
}

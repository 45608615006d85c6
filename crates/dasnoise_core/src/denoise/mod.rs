//! Denoiser registry.
//!
//! Every algorithm maps a noisy (channels, samples) matrix to a recovered
//! matrix of the same shape. [`DenoiseSpec`] selects the algorithm and carries
//! its parameters; [`denoise`] validates and dispatches.
//!
//! ## Algorithms
//!
//! - **Gaussian**: separable Gaussian smoothing
//! - **MovingAverage**: box-car mean along samples (optionally channels)
//! - **Median**: rank-order filter over a rectangular window
//! - **Wavelet**: VisuShrink thresholding of an orthogonal DWT
//! - **Bilateral**: distance and amplitude weighted mean

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use log::debug;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{DasError, Result};
use crate::filtering::MAX_KERNEL_RADIUS;
use crate::float_trait::DasFloat;
use crate::matrix::ensure_non_empty;

pub mod bilateral;
pub mod gaussian;
pub mod median;
pub mod moving_average;
pub mod wavelet;

pub use bilateral::{bilateral_filter, BilateralParams};
pub use gaussian::{gaussian_filter, GaussianParams};
pub use median::{median_filter, MedianParams};
pub use moving_average::{moving_average, MovingAverageParams};
pub use wavelet::{wavelet_denoise, ThresholdMode, WaveletLayout, WaveletParams};

/// Minimum row count before per-row work is spread over rayon.
pub(crate) const PARALLEL_ROW_THRESHOLD: usize = 256;

/// Widest odd window a filter accepts.
pub const MAX_WINDOW: usize = 2 * MAX_KERNEL_RADIUS + 1;

pub(crate) fn check_odd_window(name: &str, window: usize) -> Result<()> {
    if window == 0 || window % 2 == 0 {
        return Err(DasError::invalid(format!(
            "{} must be a positive odd number, got {}",
            name, window
        )));
    }
    if window > MAX_WINDOW {
        return Err(DasError::invalid(format!(
            "{} must be at most {}, got {}",
            name, MAX_WINDOW, window
        )));
    }
    Ok(())
}

/// Algorithm selection plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DenoiseSpec {
    Gaussian(GaussianParams),
    MovingAverage(MovingAverageParams),
    Median(MedianParams),
    Wavelet(WaveletParams),
    Bilateral(BilateralParams),
}

impl Default for DenoiseSpec {
    fn default() -> Self {
        DenoiseSpec::Wavelet(WaveletParams::default())
    }
}

impl DenoiseSpec {
    pub fn method(&self) -> DenoiseMethod {
        match self {
            DenoiseSpec::Gaussian(_) => DenoiseMethod::Gaussian,
            DenoiseSpec::MovingAverage(_) => DenoiseMethod::MovingAverage,
            DenoiseSpec::Median(_) => DenoiseMethod::Median,
            DenoiseSpec::Wavelet(_) => DenoiseMethod::Wavelet,
            DenoiseSpec::Bilateral(_) => DenoiseMethod::Bilateral,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            DenoiseSpec::Gaussian(p) => p.validate(),
            DenoiseSpec::MovingAverage(p) => p.validate(),
            DenoiseSpec::Median(p) => p.validate(),
            DenoiseSpec::Wavelet(p) => p.validate(),
            DenoiseSpec::Bilateral(p) => p.validate(),
        }
    }
}

/// Algorithm names without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenoiseMethod {
    Gaussian,
    MovingAverage,
    Median,
    Wavelet,
    Bilateral,
}

impl DenoiseMethod {
    pub const ALL: [DenoiseMethod; 5] = [
        DenoiseMethod::Gaussian,
        DenoiseMethod::MovingAverage,
        DenoiseMethod::Median,
        DenoiseMethod::Wavelet,
        DenoiseMethod::Bilateral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DenoiseMethod::Gaussian => "gaussian",
            DenoiseMethod::MovingAverage => "moving_average",
            DenoiseMethod::Median => "median",
            DenoiseMethod::Wavelet => "wavelet",
            DenoiseMethod::Bilateral => "bilateral",
        }
    }

    /// The method with its default parameters.
    pub fn default_spec(self) -> DenoiseSpec {
        match self {
            DenoiseMethod::Gaussian => DenoiseSpec::Gaussian(GaussianParams::default()),
            DenoiseMethod::MovingAverage => {
                DenoiseSpec::MovingAverage(MovingAverageParams::default())
            }
            DenoiseMethod::Median => DenoiseSpec::Median(MedianParams::default()),
            DenoiseMethod::Wavelet => DenoiseSpec::Wavelet(WaveletParams::default()),
            DenoiseMethod::Bilateral => DenoiseSpec::Bilateral(BilateralParams::default()),
        }
    }
}

impl fmt::Display for DenoiseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DenoiseMethod {
    type Err = DasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gaussian" => Ok(DenoiseMethod::Gaussian),
            "moving_average" | "uniform" => Ok(DenoiseMethod::MovingAverage),
            "median" => Ok(DenoiseMethod::Median),
            "wavelet" => Ok(DenoiseMethod::Wavelet),
            "bilateral" => Ok(DenoiseMethod::Bilateral),
            _ => Err(DasError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Validate `spec` and run the selected algorithm on `noisy`.
pub fn denoise<F: DasFloat>(noisy: ArrayView2<F>, spec: &DenoiseSpec) -> Result<Array2<F>> {
    spec.validate()?;
    ensure_non_empty(noisy, "noisy")?;

    let start = Instant::now();
    let recovered = match spec {
        DenoiseSpec::Gaussian(p) => gaussian_filter(noisy, p),
        DenoiseSpec::MovingAverage(p) => moving_average(noisy, p),
        DenoiseSpec::Median(p) => median_filter(noisy, p),
        DenoiseSpec::Wavelet(p) => wavelet_denoise(noisy, p),
        DenoiseSpec::Bilateral(p) => bilateral_filter(noisy, p),
    };
    debug!(
        "{} denoise of {:?} took {:.2?}",
        spec.method(),
        noisy.dim(),
        start.elapsed()
    );

    Ok(recovered)
}

//! Reference-based quality metrics: PSNR, SSIM and relative error.
//!
//! All statistics are accumulated in f64 regardless of the sample type.
//!
//! ## Data range
//!
//! PSNR and the SSIM stabilisation constants need the dynamic range `L` of
//! the signal. It is resolved in order:
//! 1. `MetricConfig::data_range` when set
//! 2. `max - min` of the reference, if positive
//! 3. `max - min` over reference and candidate together, if positive
//! 4. `1.0`

use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{DasError, Result};
use crate::filtering::{uniform_filter_2d, BoundaryMode};
use crate::float_trait::DasFloat;
use crate::matrix::{ensure_non_empty, ensure_same_shape, finite_min_max};

// =============================================================================
// Constants
// =============================================================================

/// Default SSIM window side.
pub const DEFAULT_SSIM_WINDOW: usize = 7;

/// SSIM luminance stabiliser.
pub const DEFAULT_K1: f64 = 0.01;

/// SSIM contrast stabiliser.
pub const DEFAULT_K2: f64 = 0.03;

// =============================================================================
// Types
// =============================================================================

/// Norm used by the relative error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorNorm {
    /// Frobenius norm.
    #[default]
    L2,
    /// Sum of absolute values.
    L1,
    /// Largest absolute value.
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Fixed dynamic range; derived from the data when None.
    pub data_range: Option<f64>,
    /// SSIM window side (odd). Default: 7
    pub ssim_window: usize,
    pub k1: f64,
    pub k2: f64,
    pub error_norm: ErrorNorm,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            data_range: None,
            ssim_window: DEFAULT_SSIM_WINDOW,
            k1: DEFAULT_K1,
            k2: DEFAULT_K2,
            error_norm: ErrorNorm::default(),
        }
    }
}

impl MetricConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(range) = self.data_range {
            if !range.is_finite() || range <= 0.0 {
                return Err(DasError::invalid(format!(
                    "data_range must be finite and > 0, got {}",
                    range
                )));
            }
        }
        if self.ssim_window == 0 || self.ssim_window % 2 == 0 {
            return Err(DasError::invalid(format!(
                "ssim_window must be a positive odd number, got {}",
                self.ssim_window
            )));
        }
        for (name, k) in [("k1", self.k1), ("k2", self.k2)] {
            if !k.is_finite() || k <= 0.0 {
                return Err(DasError::invalid(format!(
                    "{} must be finite and > 0, got {}",
                    name, k
                )));
            }
        }
        Ok(())
    }
}

/// Quality of one candidate against one clean reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Peak signal-to-noise ratio in dB; `+inf` for a perfect match.
    #[serde(with = "non_finite")]
    pub psnr: f64,
    /// Mean structural similarity in `[-1, 1]`.
    pub ssim: f64,
    /// `|candidate - reference| / |reference|`; `+inf` for a zero reference.
    #[serde(with = "non_finite")]
    pub relative_error: f64,
}

/// JSON has no infinities, so non-finite values travel as strings.
mod non_finite {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => match text.to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid metric value '{}'", other))),
            },
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn check_pair<F>(reference: ArrayView2<F>, candidate: ArrayView2<F>) -> Result<()> {
    ensure_same_shape(reference, candidate)?;
    ensure_non_empty(reference, "reference")
}

fn to_f64<F: DasFloat>(m: ArrayView2<F>) -> Array2<f64> {
    m.mapv(|v| v.as_f64())
}

/// Dynamic range used by PSNR and SSIM. See the module docs for the order.
pub fn resolve_data_range<F: DasFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
    config: &MetricConfig,
) -> f64 {
    if let Some(range) = config.data_range {
        return range;
    }
    let ref_bounds = finite_min_max(reference);
    if let Some((lo, hi)) = ref_bounds {
        if hi - lo > 0.0 {
            return hi - lo;
        }
    }
    let joint = match (ref_bounds, finite_min_max(candidate)) {
        (Some((a, b)), Some((c, d))) => Some((a.min(c), b.max(d))),
        (Some(bounds), None) | (None, Some(bounds)) => Some(bounds),
        (None, None) => None,
    };
    match joint {
        Some((lo, hi)) if hi - lo > 0.0 => hi - lo,
        _ => 1.0,
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Mean squared error.
pub fn mse<F: DasFloat>(reference: ArrayView2<F>, candidate: ArrayView2<F>) -> Result<f64> {
    check_pair(reference, candidate)?;
    Ok(mse_unchecked(reference, candidate))
}

fn mse_unchecked<F: DasFloat>(reference: ArrayView2<F>, candidate: ArrayView2<F>) -> f64 {
    let mut sum = 0.0;
    Zip::from(reference).and(candidate).for_each(|&r, &c| {
        let d = c.as_f64() - r.as_f64();
        sum += d * d;
    });
    sum / reference.len() as f64
}

fn psnr_from_mse(mse: f64, data_range: f64) -> f64 {
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (data_range * data_range / mse).log10()
}

/// Peak signal-to-noise ratio in dB.
pub fn psnr<F: DasFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
    config: &MetricConfig,
) -> Result<f64> {
    config.validate()?;
    check_pair(reference, candidate)?;
    let range = resolve_data_range(reference, candidate, config);
    Ok(psnr_from_mse(mse_unchecked(reference, candidate), range))
}

/// Mean structural similarity.
pub fn ssim<F: DasFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
    config: &MetricConfig,
) -> Result<f64> {
    config.validate()?;
    check_pair(reference, candidate)?;
    let range = resolve_data_range(reference, candidate, config);
    Ok(ssim_unchecked(reference, candidate, range, config))
}

fn ssim_unchecked<F: DasFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
    data_range: f64,
    config: &MetricConfig,
) -> f64 {
    let (rows, cols) = reference.dim();

    // Largest odd window that fits inside the matrix
    let mut win = config.ssim_window.min(rows.min(cols));
    if win % 2 == 0 {
        win -= 1;
    }
    let np = (win * win) as f64;
    let cov_norm = if np > 1.0 { np / (np - 1.0) } else { 1.0 };

    let x = to_f64(reference);
    let y = to_f64(candidate);
    let mode = BoundaryMode::Reflect;
    let local_mean = |m: &Array2<f64>| uniform_filter_2d(m.view(), win, win, mode);

    let ux = local_mean(&x);
    let uy = local_mean(&y);
    let uxx = local_mean(&(&x * &x));
    let uyy = local_mean(&(&y * &y));
    let uxy = local_mean(&(&x * &y));

    let c1 = (config.k1 * data_range).powi(2);
    let c2 = (config.k2 * data_range).powi(2);
    let pad = (win - 1) / 2;

    let mut sum = 0.0;
    let mut count = 0usize;
    for r in pad..rows - pad {
        for c in pad..cols - pad {
            let mx = ux[[r, c]];
            let my = uy[[r, c]];
            let vx = cov_norm * (uxx[[r, c]] - mx * mx);
            let vy = cov_norm * (uyy[[r, c]] - my * my);
            let vxy = cov_norm * (uxy[[r, c]] - mx * my);

            let a1 = 2.0 * mx * my + c1;
            let a2 = 2.0 * vxy + c2;
            let b1 = mx * mx + my * my + c1;
            let b2 = vx + vy + c2;
            sum += (a1 * a2) / (b1 * b2);
            count += 1;
        }
    }

    // Each local term is a product of two ratios bounded by one in magnitude
    let mean = sum / count as f64;
    debug_assert!(
        mean.is_nan() || (-1.0 - 1e-9..=1.0 + 1e-9).contains(&mean),
        "SSIM {} outside [-1, 1]",
        mean
    );
    mean
}

/// Norm of `candidate - reference` relative to the norm of `reference`.
pub fn relative_error<F: DasFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
    norm: ErrorNorm,
) -> Result<f64> {
    check_pair(reference, candidate)?;

    let mut diff_acc = 0.0f64;
    let mut ref_acc = 0.0f64;
    Zip::from(reference).and(candidate).for_each(|&r, &c| {
        let r = r.as_f64();
        let d = (c.as_f64() - r).abs();
        match norm {
            ErrorNorm::L2 => {
                diff_acc += d * d;
                ref_acc += r * r;
            }
            ErrorNorm::L1 => {
                diff_acc += d;
                ref_acc += r.abs();
            }
            ErrorNorm::Max => {
                diff_acc = diff_acc.max(d);
                ref_acc = ref_acc.max(r.abs());
            }
        }
    });
    if norm == ErrorNorm::L2 {
        diff_acc = diff_acc.sqrt();
        ref_acc = ref_acc.sqrt();
    }

    if ref_acc == 0.0 {
        return Ok(if diff_acc == 0.0 { 0.0 } else { f64::INFINITY });
    }
    Ok(diff_acc / ref_acc)
}

/// Score `candidate` against `reference` with the default configuration.
pub fn evaluate<F: DasFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
) -> Result<MetricResult> {
    evaluate_with(reference, candidate, &MetricConfig::default())
}

/// Score `candidate` against `reference`.
pub fn evaluate_with<F: DasFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
    config: &MetricConfig,
) -> Result<MetricResult> {
    config.validate()?;
    check_pair(reference, candidate)?;

    let range = resolve_data_range(reference, candidate, config);
    Ok(MetricResult {
        psnr: psnr_from_mse(mse_unchecked(reference, candidate), range),
        ssim: ssim_unchecked(reference, candidate, range, config),
        relative_error: relative_error(reference, candidate, config.error_norm)?,
    })
}

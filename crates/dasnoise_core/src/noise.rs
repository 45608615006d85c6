//! Noise models applied to a clean signal matrix.
//!
//! Each model is a pure function of the clean matrix, its parameters and a
//! seed. With `Some(seed)` the output is bit-for-bit reproducible: draws are
//! taken in row-major order from `StdRng::seed_from_u64(seed)`. With `None`
//! the generator is seeded from OS entropy and runs are not reproducible.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use rand::prelude::*;
use rand_distr::{Bernoulli, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{DasError, Result};
use crate::float_trait::DasFloat;
use crate::matrix::{ensure_non_empty, finite_min_max, rms};

// =============================================================================
// Constants
// =============================================================================

/// Salt/pepper levels sit this fraction of the signal range beyond its extremes.
const SALT_PEPPER_OVERSHOOT: f64 = 0.1;

/// Default share of salt among corrupted samples.
pub const DEFAULT_SALT_RATIO: f64 = 0.5;

fn default_salt_ratio() -> f64 {
    DEFAULT_SALT_RATIO
}

// =============================================================================
// Noise Models
// =============================================================================

/// Intensity of additive Gaussian noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseLevel {
    /// Target signal-to-noise ratio in decibels, relative to the clean RMS.
    SnrDb(f64),
    /// Absolute standard deviation in signal units.
    Sigma(f64),
}

/// Noise model and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoiseSpec {
    /// Additive zero-mean Gaussian noise.
    Gaussian { level: NoiseLevel },
    /// Each sample is replaced, with `probability`, by a uniform draw from `[low, high)`.
    Impulse { probability: f64, low: f64, high: f64 },
    /// Each sample is replaced, with `probability`, by a salt level above the
    /// signal maximum (share `salt_ratio`) or a pepper level below its minimum.
    SaltPepper {
        probability: f64,
        #[serde(default = "default_salt_ratio")]
        salt_ratio: f64,
    },
}

impl Default for NoiseSpec {
    fn default() -> Self {
        NoiseSpec::Gaussian {
            level: NoiseLevel::SnrDb(20.0),
        }
    }
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(DasError::invalid(format!(
            "{} must be within [0, 1], got {}",
            name, p
        )));
    }
    Ok(())
}

impl NoiseSpec {
    /// Validate parameters without touching any data.
    pub fn validate(&self) -> Result<()> {
        match *self {
            NoiseSpec::Gaussian { level } => match level {
                NoiseLevel::SnrDb(db) if !db.is_finite() || db <= 0.0 => Err(DasError::invalid(
                    format!("snr_db must be finite and > 0, got {}", db),
                )),
                NoiseLevel::Sigma(s) if !s.is_finite() || s < 0.0 => Err(DasError::invalid(
                    format!("sigma must be finite and >= 0, got {}", s),
                )),
                _ => Ok(()),
            },
            NoiseSpec::Impulse {
                probability,
                low,
                high,
            } => {
                check_probability("probability", probability)?;
                if !low.is_finite() || !high.is_finite() {
                    return Err(DasError::invalid(format!(
                        "impulse amplitude bounds must be finite, got [{}, {})",
                        low, high
                    )));
                }
                if low >= high {
                    return Err(DasError::invalid(format!(
                        "impulse amplitude range [{}, {}) is empty",
                        low, high
                    )));
                }
                if !(high - low).is_finite() {
                    return Err(DasError::invalid(format!(
                        "impulse amplitude range [{}, {}) is too wide",
                        low, high
                    )));
                }
                Ok(())
            }
            NoiseSpec::SaltPepper {
                probability,
                salt_ratio,
            } => {
                check_probability("probability", probability)?;
                check_probability("salt_ratio", salt_ratio)
            }
        }
    }

    /// Short human-readable label, used in logs and report tables.
    pub fn label(&self) -> String {
        match *self {
            NoiseSpec::Gaussian {
                level: NoiseLevel::SnrDb(db),
            } => format!("gaussian snr={}dB", db),
            NoiseSpec::Gaussian {
                level: NoiseLevel::Sigma(s),
            } => format!("gaussian sigma={}", s),
            NoiseSpec::Impulse {
                probability,
                low,
                high,
            } => format!("impulse p={} [{}, {})", probability, low, high),
            NoiseSpec::SaltPepper {
                probability,
                salt_ratio,
            } => format!("salt_pepper p={} salt={}", probability, salt_ratio),
        }
    }
}

// =============================================================================
// Generators
// =============================================================================

/// Gaussian sigma that yields `snr_db` against the RMS of `clean`.
///
/// `sigma = rms / 10^(snr_db / 20)`, equivalently noise power equals signal
/// power divided by `10^(snr_db / 10)`.
pub fn noise_sigma_for_snr<F: DasFloat>(clean: ArrayView2<F>, snr_db: f64) -> f64 {
    rms(clean) / 10f64.powf(snr_db / 20.0)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Apply one noise model to `clean`, returning a new matrix.
pub fn generate<F: DasFloat>(
    clean: ArrayView2<F>,
    spec: &NoiseSpec,
    seed: Option<u64>,
) -> Result<Array2<F>> {
    spec.validate()?;
    ensure_non_empty(clean, "clean")?;
    let mut rng = make_rng(seed);
    apply(clean, spec, &mut rng)
}

/// Apply one noise model drawing from a caller-supplied generator.
pub fn generate_with_rng<F: DasFloat, R: Rng + ?Sized>(
    clean: ArrayView2<F>,
    spec: &NoiseSpec,
    rng: &mut R,
) -> Result<Array2<F>> {
    spec.validate()?;
    ensure_non_empty(clean, "clean")?;
    apply(clean, spec, rng)
}

/// Apply a sequence of noise models in order.
///
/// Stage `i` of a seeded chain draws from `seed + i` (wrapping), so a
/// one-element chain matches [`generate`] with the same seed. All stages are
/// validated before any noise is drawn. An empty chain returns a copy.
pub fn generate_chain<F: DasFloat>(
    clean: ArrayView2<F>,
    specs: &[NoiseSpec],
    seed: Option<u64>,
) -> Result<Array2<F>> {
    for spec in specs {
        spec.validate()?;
    }
    ensure_non_empty(clean, "clean")?;

    let mut current = clean.to_owned();
    for (i, spec) in specs.iter().enumerate() {
        let mut rng = make_rng(seed.map(|s| s.wrapping_add(i as u64)));
        current = apply(current.view(), spec, &mut rng)?;
    }
    Ok(current)
}

/// Pure zero-mean Gaussian noise field of the given (channels, samples) shape.
pub fn noise_only<F: DasFloat>(
    shape: (usize, usize),
    sigma: f64,
    seed: Option<u64>,
) -> Result<Array2<F>> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(DasError::invalid(format!(
            "sigma must be finite and >= 0, got {}",
            sigma
        )));
    }
    if shape.0 == 0 || shape.1 == 0 {
        return Err(DasError::shape(format!(
            "noise field shape {:?} is empty",
            shape
        )));
    }
    let zeros = Array2::<F>::zeros(shape);
    let mut rng = make_rng(seed);
    add_gaussian(zeros.view(), sigma, &mut rng)
}

fn apply<F: DasFloat, R: Rng + ?Sized>(
    clean: ArrayView2<F>,
    spec: &NoiseSpec,
    rng: &mut R,
) -> Result<Array2<F>> {
    debug!("Applying {} to {:?} matrix", spec.label(), clean.dim());
    match *spec {
        NoiseSpec::Gaussian { level } => {
            let sigma = match level {
                NoiseLevel::Sigma(s) => s,
                NoiseLevel::SnrDb(db) => {
                    let sigma = noise_sigma_for_snr(clean, db);
                    if sigma == 0.0 {
                        warn!("Clean signal has zero RMS; SNR-based noise is empty");
                    }
                    debug!("SNR {} dB resolves to sigma {:.6}", db, sigma);
                    sigma
                }
            };
            add_gaussian(clean, sigma, rng)
        }
        NoiseSpec::Impulse {
            probability,
            low,
            high,
        } => {
            let hit = Bernoulli::new(probability).map_err(|e| DasError::invalid(e.to_string()))?;
            let amplitude = Uniform::new(low, high);
            Ok(Array2::from_shape_fn(clean.dim(), |idx| {
                if hit.sample(rng) {
                    F::from_f64_c(amplitude.sample(rng))
                } else {
                    clean[idx]
                }
            }))
        }
        NoiseSpec::SaltPepper {
            probability,
            salt_ratio,
        } => {
            let hit = Bernoulli::new(probability).map_err(|e| DasError::invalid(e.to_string()))?;
            let (min, max) = finite_min_max(clean).unwrap_or((0.0, 0.0));
            // Flat signals still get distinct salt and pepper levels
            let span = if max > min { max - min } else { 1.0 };
            let overshoot = SALT_PEPPER_OVERSHOOT * span;
            let salt = F::from_f64_c(max + overshoot);
            let pepper = F::from_f64_c(min - overshoot);
            Ok(Array2::from_shape_fn(clean.dim(), |idx| {
                if hit.sample(rng) {
                    if rng.gen::<f64>() < salt_ratio {
                        salt
                    } else {
                        pepper
                    }
                } else {
                    clean[idx]
                }
            }))
        }
    }
}

fn add_gaussian<F: DasFloat, R: Rng + ?Sized>(
    clean: ArrayView2<F>,
    sigma: f64,
    rng: &mut R,
) -> Result<Array2<F>> {
    if sigma == 0.0 {
        return Ok(clean.to_owned());
    }
    let normal = Normal::new(0.0, sigma).map_err(|e| DasError::invalid(e.to_string()))?;
    Ok(Array2::from_shape_fn(clean.dim(), |idx| {
        clean[idx] + F::from_f64_c(normal.sample(rng))
    }))
}

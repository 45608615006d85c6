use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{DasError, Result};
use crate::filtering::{gaussian_kernel_1d, separable_filter, BoundaryMode, MAX_KERNEL_RADIUS};
use crate::float_trait::DasFloat;

/// Default smoothing width in samples.
const DEFAULT_SIGMA: f64 = 1.0;

/// Kernel radius is ceil(4 * sigma), so this keeps it within MAX_KERNEL_RADIUS.
pub const MAX_SIGMA: f64 = (MAX_KERNEL_RADIUS / 4) as f64;

/// Separable Gaussian smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianParams {
    /// Standard deviation along the sample axis. Default: 1.0
    pub sigma: f64,
    /// Standard deviation along the channel axis. Defaults to `sigma`; 0 skips the axis.
    pub sigma_channels: Option<f64>,
    pub boundary: BoundaryMode,
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_SIGMA,
            sigma_channels: None,
            boundary: BoundaryMode::default(),
        }
    }
}

impl GaussianParams {
    pub fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 || self.sigma > MAX_SIGMA {
            return Err(DasError::invalid(format!(
                "gaussian sigma must be within (0, {}], got {}",
                MAX_SIGMA, self.sigma
            )));
        }
        if let Some(s) = self.sigma_channels {
            if !s.is_finite() || s < 0.0 || s > MAX_SIGMA {
                return Err(DasError::invalid(format!(
                    "gaussian sigma_channels must be within [0, {}], got {}",
                    MAX_SIGMA, s
                )));
            }
        }
        Ok(())
    }
}

pub fn gaussian_filter<F: DasFloat>(noisy: ArrayView2<F>, params: &GaussianParams) -> Array2<F> {
    let sample_kernel = gaussian_kernel_1d(F::from_f64_c(params.sigma));
    let channel_kernel =
        gaussian_kernel_1d(F::from_f64_c(params.sigma_channels.unwrap_or(params.sigma)));
    separable_filter(noisy, &channel_kernel, &sample_kernel, params.boundary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_impulse_response_sums_to_one() {
        let mut input = Array2::<f64>::zeros((21, 21));
        input[[10, 10]] = 1.0;
        let out = gaussian_filter(input.view(), &GaussianParams::default());
        assert_abs_diff_eq!(out.sum(), 1.0, epsilon = 1e-12);
        assert!(out[[10, 10]] < 1.0);
        assert_abs_diff_eq!(out[[9, 10]], out[[11, 10]], epsilon = 1e-15);
        assert_abs_diff_eq!(out[[10, 9]], out[[9, 10]], epsilon = 1e-15);
    }

    #[test]
    fn test_zero_channel_sigma_keeps_rows_independent() {
        let mut input = Array2::<f64>::zeros((3, 9));
        input[[1, 4]] = 1.0;
        let params = GaussianParams {
            sigma_channels: Some(0.0),
            ..Default::default()
        };
        let out = gaussian_filter(input.view(), &params);
        assert!(out.row(0).iter().all(|&v| v == 0.0));
        assert!(out.row(2).iter().all(|&v| v == 0.0));
        assert_abs_diff_eq!(out.row(1).sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_validation() {
        let bad = GaussianParams {
            sigma: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = GaussianParams {
            sigma_channels: Some(-1.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(GaussianParams::default().validate().is_ok());
    }

    #[test]
    fn test_oversized_sigma_rejected() {
        for params in [
            GaussianParams {
                sigma: 1e9,
                ..Default::default()
            },
            GaussianParams {
                sigma_channels: Some(MAX_SIGMA * 2.0),
                ..Default::default()
            },
        ] {
            assert!(matches!(params.validate(), Err(DasError::InvalidParameter(_))));
        }

        let widest = GaussianParams {
            sigma: MAX_SIGMA,
            sigma_channels: Some(0.0),
            ..Default::default()
        };
        assert!(widest.validate().is_ok());
        assert_eq!(
            gaussian_kernel_1d(MAX_SIGMA).len(),
            2 * MAX_KERNEL_RADIUS + 1
        );
    }
}

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filtering::{uniform_filter_2d, BoundaryMode};
use crate::float_trait::DasFloat;

use super::check_odd_window;

/// Default averaging window in samples.
const DEFAULT_WINDOW: usize = 5;

/// Box-car smoothing along samples, optionally across channels as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageParams {
    /// Odd window length along the sample axis. Default: 5
    pub window: usize,
    /// Odd window length along the channel axis; None averages each channel alone.
    pub channel_window: Option<usize>,
    pub boundary: BoundaryMode,
}

impl Default for MovingAverageParams {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            channel_window: None,
            boundary: BoundaryMode::default(),
        }
    }
}

impl MovingAverageParams {
    pub fn validate(&self) -> Result<()> {
        check_odd_window("moving_average window", self.window)?;
        if let Some(w) = self.channel_window {
            check_odd_window("moving_average channel_window", w)?;
        }
        Ok(())
    }
}

pub fn moving_average<F: DasFloat>(noisy: ArrayView2<F>, params: &MovingAverageParams) -> Array2<F> {
    uniform_filter_2d(
        noisy,
        params.channel_window.unwrap_or(1),
        params.window,
        params.boundary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_window_one_is_identity() {
        let input = array![[1.0f64, -2.0, 3.0], [4.0, 5.0, -6.0]];
        let params = MovingAverageParams {
            window: 1,
            ..Default::default()
        };
        assert_eq!(moving_average(input.view(), &params), input);
    }

    #[test]
    fn test_sample_axis_only_by_default() {
        let input = array![[0.0f64, 0.0, 3.0, 0.0, 0.0], [9.0, 9.0, 9.0, 9.0, 9.0]];
        let params = MovingAverageParams {
            window: 3,
            ..Default::default()
        };
        let out = moving_average(input.view(), &params);
        assert_abs_diff_eq!(out[[0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[[0, 2]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[[0, 0]], 0.0, epsilon = 1e-12);
        // Rows are not mixed
        assert!(out.row(1).iter().all(|&v| (v - 9.0).abs() < 1e-12));
    }

    #[test]
    fn test_channel_window_mixes_rows() {
        let input = array![[0.0f64, 0.0, 0.0], [3.0, 3.0, 3.0], [0.0, 0.0, 0.0]];
        let params = MovingAverageParams {
            window: 1,
            channel_window: Some(3),
            ..Default::default()
        };
        let out = moving_average(input.view(), &params);
        assert_abs_diff_eq!(out[[1, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_even_or_zero_window_rejected() {
        for window in [0, 4] {
            let params = MovingAverageParams {
                window,
                ..Default::default()
            };
            assert!(params.validate().is_err());
        }
        let params = MovingAverageParams {
            channel_window: Some(2),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}

//! Noise → denoise → evaluate, for one configuration or a parallel batch.

use std::time::{Duration, Instant};

use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::denoise::{denoise, DenoiseSpec};
use crate::error::Result;
use crate::float_trait::DasFloat;
use crate::matrix::{ensure_non_empty, ensure_same_shape};
use crate::metrics::{evaluate_with, MetricConfig, MetricResult};
use crate::noise::{generate_chain, NoiseSpec};

/// Everything needed to run the three core stages once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Noise models applied in order. Default: Gaussian at 20 dB SNR
    pub noise: Vec<NoiseSpec>,
    pub denoise: DenoiseSpec,
    /// Fixed seed for reproducible noise; None draws from OS entropy.
    pub seed: Option<u64>,
    pub metrics: MetricConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            noise: vec![NoiseSpec::default()],
            denoise: DenoiseSpec::default(),
            seed: None,
            metrics: MetricConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        for spec in &self.noise {
            spec.validate()?;
        }
        self.denoise.validate()?;
        self.metrics.validate()
    }
}

/// Matrices and scores produced by one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun<F> {
    pub noisy: Array2<F>,
    pub recovered: Array2<F>,
    /// Noisy matrix against the clean reference (the baseline).
    pub noisy_metrics: MetricResult,
    /// Recovered matrix against the clean reference.
    pub recovered_metrics: MetricResult,
}

impl<F> PipelineRun<F> {
    /// PSNR gained by denoising, in dB.
    pub fn psnr_gain(&self) -> f64 {
        self.recovered_metrics.psnr - self.noisy_metrics.psnr
    }
}

/// One denoiser applied to a shared noisy matrix.
#[derive(Debug, Clone)]
pub struct DenoiseOutcome<F> {
    pub spec: DenoiseSpec,
    pub recovered: Array2<F>,
    pub metrics: MetricResult,
    pub elapsed: Duration,
}

/// Run noise generation, denoising and evaluation against `clean`.
pub fn run_pipeline<F: DasFloat>(
    clean: ArrayView2<F>,
    config: &PipelineConfig,
) -> Result<PipelineRun<F>> {
    config.validate()?;
    ensure_non_empty(clean, "clean")?;

    let start = Instant::now();
    let noisy = generate_chain(clean, &config.noise, config.seed)?;
    let noise_time = start.elapsed();

    let recovered = denoise(noisy.view(), &config.denoise)?;
    let denoise_time = start.elapsed() - noise_time;

    let noisy_metrics = evaluate_with(clean, noisy.view(), &config.metrics)?;
    let recovered_metrics = evaluate_with(clean, recovered.view(), &config.metrics)?;

    debug!(
        "Pipeline timing: noise {:.2?}, {} {:.2?}, total {:.2?}",
        noise_time,
        config.denoise.method(),
        denoise_time,
        start.elapsed()
    );
    info!(
        "{}: PSNR {:.2} -> {:.2} dB, SSIM {:.4} -> {:.4}",
        config.denoise.method(),
        noisy_metrics.psnr,
        recovered_metrics.psnr,
        noisy_metrics.ssim,
        recovered_metrics.ssim
    );

    Ok(PipelineRun {
        noisy,
        recovered,
        noisy_metrics,
        recovered_metrics,
    })
}

/// Run every configuration against the same clean matrix in parallel.
///
/// Results come back in the order of `configs`; a failing configuration
/// does not affect the others.
pub fn run_batch<F: DasFloat>(
    clean: ArrayView2<F>,
    configs: &[PipelineConfig],
) -> Vec<Result<PipelineRun<F>>> {
    debug!("Running batch of {} pipeline configurations", configs.len());
    configs
        .par_iter()
        .map(|config| run_pipeline(clean, config))
        .collect()
}

/// Apply each denoiser to one shared noisy matrix and score the results.
///
/// Useful for comparing algorithms on identical noise. Results follow the
/// order of `specs`.
pub fn evaluate_denoisers<F: DasFloat>(
    clean: ArrayView2<F>,
    noisy: ArrayView2<F>,
    specs: &[DenoiseSpec],
    metrics: &MetricConfig,
) -> Vec<Result<DenoiseOutcome<F>>> {
    specs
        .par_iter()
        .map(|spec| {
            ensure_same_shape(clean, noisy)?;
            let start = Instant::now();
            let recovered = denoise(noisy, spec)?;
            let elapsed = start.elapsed();
            let result = evaluate_with(clean, recovered.view(), metrics)?;
            Ok(DenoiseOutcome {
                spec: *spec,
                recovered,
                metrics: result,
                elapsed,
            })
        })
        .collect()
}

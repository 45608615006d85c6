//! DAS Noise Workbench Core Library
//!
//! Noise injection, denoising and quality evaluation for Distributed
//! Acoustic Sensing signal matrices (channels × time samples). Every stage
//! is a pure function over `ndarray` matrices plus a parameter bundle, so
//! configurations can be evaluated side by side in parallel.
//!
//! ```text
//! clean ──noise::generate──▶ noisy ──denoise::denoise──▶ recovered
//!   │                          │                             │
//!   └──────────────── metrics::evaluate ◀───────────────────┘
//! ```

pub mod denoise;
pub mod error;
pub mod filtering;
pub mod float_trait;
pub mod matrix;
pub mod metrics;
pub mod noise;
pub mod pipeline;
pub mod transforms;
pub mod utils;

// Re-export commonly used types at the crate root
pub use denoise::{
    denoise, BilateralParams, DenoiseMethod, DenoiseSpec, GaussianParams, MedianParams,
    MovingAverageParams, ThresholdMode, WaveletLayout, WaveletParams,
};
pub use error::{DasError, Result};
pub use filtering::BoundaryMode;
pub use float_trait::DasFloat;
pub use matrix::into_signal_matrix;
pub use metrics::{evaluate, evaluate_with, ErrorNorm, MetricConfig, MetricResult};
pub use noise::{generate, generate_chain, noise_only, NoiseLevel, NoiseSpec};
pub use pipeline::{
    evaluate_denoisers, run_batch, run_pipeline, DenoiseOutcome, PipelineConfig, PipelineRun,
};
pub use transforms::WaveletFamily;

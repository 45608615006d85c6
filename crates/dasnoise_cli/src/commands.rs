//! `run`, `compare` and `sweep` over a loaded [`RunConfig`].

use anyhow::{Context, Result};
use log::info;
use ndarray::Array2;

use dasnoise_core::{
    evaluate_denoisers, evaluate_with, generate_chain, run_batch, run_pipeline, DenoiseMethod,
    DenoiseSpec, NoiseLevel, NoiseSpec, PipelineConfig, PipelineRun,
};

use crate::config::RunConfig;
use crate::report::{self, ComparisonReport, ComparisonRow, SweepReport, SweepRow};

fn load_clean(config: &RunConfig) -> Result<Array2<f64>> {
    config
        .source
        .load()
        .with_context(|| format!("failed to load signal from {:?}", config.source))
}

/// Single pipeline run; writes heatmaps, the recovered TIFF and `report.json`.
pub fn run(config: &RunConfig) -> Result<PipelineRun<f64>> {
    let clean = load_clean(config)?;
    let run = run_pipeline(clean.view(), &config.pipeline).context("pipeline failed")?;
    report::write_run(
        &config.output,
        &config.source,
        &config.pipeline,
        clean.view(),
        &run,
    )
    .context("failed to write run outputs")?;
    Ok(run)
}

/// Every registered denoiser with default parameters, except that the
/// configured denoiser keeps its own parameters.
pub fn comparison_specs(configured: DenoiseSpec) -> Vec<DenoiseSpec> {
    DenoiseMethod::ALL
        .iter()
        .map(|&method| {
            if method == configured.method() {
                configured
            } else {
                method.default_spec()
            }
        })
        .collect()
}

/// All denoisers against one shared noisy matrix; writes `compare.json`.
pub fn compare(config: &RunConfig) -> Result<ComparisonReport> {
    let clean = load_clean(config)?;
    let pipeline = &config.pipeline;
    pipeline.validate()?;

    let noisy = generate_chain(clean.view(), &pipeline.noise, pipeline.seed)
        .context("noise generation failed")?;
    let baseline = evaluate_with(clean.view(), noisy.view(), &pipeline.metrics)?;

    let specs = comparison_specs(pipeline.denoise);
    info!("Comparing {} denoisers", specs.len());
    let outcomes = evaluate_denoisers(clean.view(), noisy.view(), &specs, &pipeline.metrics);
    let rows = specs
        .into_iter()
        .zip(outcomes)
        .map(|(spec, outcome)| ComparisonRow::new(spec, outcome))
        .collect();

    let comparison = ComparisonReport {
        noise: pipeline.noise.clone(),
        seed: pipeline.seed,
        baseline,
        rows,
    };
    write_report(config, "compare.json", &comparison)?;
    Ok(comparison)
}

/// One configuration per level. The first Gaussian stage of the noise chain
/// takes each level in turn; a chain without one gets it prepended.
pub fn sweep_configs(base: &PipelineConfig, levels: &[NoiseLevel]) -> Vec<PipelineConfig> {
    levels
        .iter()
        .map(|&level| {
            let mut config = base.clone();
            let gaussian = config
                .noise
                .iter_mut()
                .find(|spec| matches!(spec, NoiseSpec::Gaussian { .. }));
            match gaussian {
                Some(spec) => *spec = NoiseSpec::Gaussian { level },
                None => config.noise.insert(0, NoiseSpec::Gaussian { level }),
            }
            config
        })
        .collect()
}

/// The configured pipeline at each noise level; writes `sweep.json`.
pub fn sweep(config: &RunConfig, levels: &[NoiseLevel]) -> Result<SweepReport> {
    anyhow::ensure!(!levels.is_empty(), "sweep needs at least one noise level");
    let clean = load_clean(config)?;

    let configs = sweep_configs(&config.pipeline, levels);
    info!("Sweeping {} noise levels", configs.len());
    let rows = levels
        .iter()
        .zip(run_batch(clean.view(), &configs))
        .map(|(&level, run)| SweepRow::new(level, run))
        .collect();

    let sweep = SweepReport {
        denoise: config.pipeline.denoise,
        seed: config.pipeline.seed,
        rows,
    };
    write_report(config, "sweep.json", &sweep)?;
    Ok(sweep)
}

fn write_report<T: serde::Serialize>(config: &RunConfig, name: &str, value: &T) -> Result<()> {
    let dir = &config.output.dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    report::write_json(&path, value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dasnoise_core::{MedianParams, MetricConfig};

    #[test]
    fn test_comparison_specs_keep_configured_params() {
        let configured = DenoiseSpec::Median(MedianParams {
            window: 7,
            ..Default::default()
        });
        let specs = comparison_specs(configured);
        assert_eq!(specs.len(), DenoiseMethod::ALL.len());
        assert!(specs.contains(&configured));
        assert!(!specs.contains(&DenoiseMethod::Median.default_spec()));
        assert!(specs.contains(&DenoiseMethod::Wavelet.default_spec()));
    }

    #[test]
    fn test_sweep_replaces_gaussian_stage() {
        let base = PipelineConfig {
            noise: vec![
                NoiseSpec::SaltPepper {
                    probability: 0.01,
                    salt_ratio: 0.5,
                },
                NoiseSpec::Gaussian {
                    level: NoiseLevel::SnrDb(20.0),
                },
            ],
            denoise: DenoiseSpec::default(),
            seed: Some(3),
            metrics: MetricConfig::default(),
        };
        let configs = sweep_configs(&base, &[NoiseLevel::Sigma(0.1), NoiseLevel::SnrDb(5.0)]);
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].noise.len(), 2);
        assert_eq!(
            configs[0].noise[1],
            NoiseSpec::Gaussian {
                level: NoiseLevel::Sigma(0.1)
            }
        );
        assert_eq!(configs[1].noise[0], base.noise[0]);
        assert_eq!(configs[1].seed, Some(3));
    }

    #[test]
    fn test_sweep_prepends_when_no_gaussian_stage() {
        let base = PipelineConfig {
            noise: vec![NoiseSpec::SaltPepper {
                probability: 0.01,
                salt_ratio: 0.5,
            }],
            ..Default::default()
        };
        let configs = sweep_configs(&base, &[NoiseLevel::SnrDb(10.0)]);
        assert_eq!(
            configs[0].noise[0],
            NoiseSpec::Gaussian {
                level: NoiseLevel::SnrDb(10.0)
            }
        );
        assert_eq!(configs[0].noise.len(), 2);
    }
}

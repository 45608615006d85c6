//! File-level behaviour: loaders, report outputs and config resolution.

use std::fs;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use tempfile::tempdir;

use dasnoise_cli::commands;
use dasnoise_cli::report::write_tiff;
use dasnoise_cli::source::{load_delimited, load_tiff, SourceError};
use dasnoise_cli::{OutputConfig, RunConfig, SignalSource};
use dasnoise_core::{DenoiseMethod, NoiseLevel, NoiseSpec, PipelineConfig};

fn small_synthetic() -> SignalSource {
    SignalSource::Synthetic {
        channels: 12,
        samples: 96,
        events: 2,
        peak_frequency: 0.08,
        seed: Some(21),
    }
}

fn config_in(dir: PathBuf) -> RunConfig {
    RunConfig {
        source: small_synthetic(),
        pipeline: PipelineConfig {
            noise: vec![NoiseSpec::Gaussian {
                level: NoiseLevel::SnrDb(10.0),
            }],
            seed: Some(8),
            ..Default::default()
        },
        output: OutputConfig {
            dir,
            ..Default::default()
        },
    }
}

#[test]
fn delimited_matrix_loads_with_comments_and_blank_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.csv");
    fs::write(&path, "# channel x sample\n1, 2, 3\n\n4,5,6\n").unwrap();

    let m = load_delimited(&path, ',').unwrap();
    assert_eq!(m, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
}

#[test]
fn ragged_delimited_rows_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ragged.csv");
    fs::write(&path, "1,2,3\n4,5\n").unwrap();
    assert!(matches!(
        load_delimited(&path, ','),
        Err(SourceError::InvalidDimensions(_))
    ));
}

#[test]
fn float_tiff_written_then_loaded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.tiff");
    let m = Array2::from_shape_fn((5, 9), |(r, c)| r as f64 * 0.5 - c as f64 * 0.25);

    write_tiff(&path, m.view()).unwrap();
    let loaded = load_tiff(&path).unwrap();
    assert_eq!(loaded.dim(), (5, 9));
    for (a, b) in m.iter().zip(loaded.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let source = SignalSource::Tiff {
        path: PathBuf::from("/nonexistent/run.tiff"),
    };
    assert!(matches!(source.load(), Err(SourceError::Io { .. })));
}

#[test]
fn config_file_paths_resolve_against_its_directory() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data/m.csv"), "0,1\n1,0\n").unwrap();
    let config_path = dir.path().join("run.toml");
    fs::write(
        &config_path,
        "[source]\nkind = \"delimited\"\npath = \"data/m.csv\"\n",
    )
    .unwrap();

    let config = RunConfig::load(&config_path).unwrap();
    let clean = config.source.load().unwrap();
    assert_eq!(clean, array![[0.0, 1.0], [1.0, 0.0]]);
}

#[test]
fn run_writes_heatmaps_matrix_and_report() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let config = config_in(out.clone());

    let run = commands::run(&config).unwrap();
    assert_eq!(run.recovered.dim(), (12, 96));

    for name in [
        "clean.png",
        "noisy.png",
        "recovered.png",
        "residual.png",
        "recovered.tiff",
        "report.json",
    ] {
        assert!(out.join(name).is_file(), "missing {}", name);
    }

    let recovered = load_tiff(&out.join("recovered.tiff")).unwrap();
    assert_eq!(recovered.dim(), (12, 96));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["shape"], serde_json::json!([12, 96]));
    assert_eq!(report["pipeline"]["seed"], 8);
    assert!(report["noisy"]["psnr"].is_number());
    assert!(report["recovered"]["ssim"].is_number());
}

#[test]
fn heatmaps_can_be_disabled() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path().to_path_buf());
    config.output.heatmaps = false;

    commands::run(&config).unwrap();
    assert!(!dir.path().join("clean.png").exists());
    assert!(dir.path().join("report.json").is_file());
}

#[test]
fn run_plots_requested_channel_traces() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path().to_path_buf());
    config.output.heatmaps = false;
    config.output.trace_channels = vec![0, 11];

    commands::run(&config).unwrap();
    for name in ["trace_0.png", "trace_11.png"] {
        let img = image::open(dir.path().join(name)).unwrap();
        assert_eq!((img.width(), img.height()), (96, 256));
    }
    assert!(!dir.path().join("trace_1.png").exists());
}

#[test]
fn out_of_range_trace_channel_writes_nothing() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let mut config = config_in(out.clone());
    config.output.trace_channels = vec![12];

    assert!(commands::run(&config).is_err());
    assert!(!out.exists());
}

#[test]
fn compare_scores_every_denoiser() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path().to_path_buf());

    let report = commands::compare(&config).unwrap();
    assert_eq!(report.rows.len(), DenoiseMethod::ALL.len());
    for row in &report.rows {
        assert!(row.error.is_none(), "{}: {:?}", row.method, row.error);
        assert!(row.metrics.is_some());
    }
    assert!(dir.path().join("compare.json").is_file());
}

#[test]
fn sweep_orders_rows_by_level() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path().to_path_buf());
    let levels = [
        NoiseLevel::SnrDb(30.0),
        NoiseLevel::SnrDb(15.0),
        NoiseLevel::SnrDb(5.0),
    ];

    let report = commands::sweep(&config, &levels).unwrap();
    let psnr: Vec<f64> = report
        .rows
        .iter()
        .map(|row| row.noisy.map(|m| m.psnr).unwrap())
        .collect();
    assert!(psnr[0] > psnr[1] && psnr[1] > psnr[2]);
    assert!(dir.path().join("sweep.json").is_file());

    assert!(commands::sweep(&config, &[]).is_err());
}

#[test]
fn bundled_sample_config_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/synthetic.toml");
    let config = RunConfig::load(&path).unwrap();
    assert_eq!(config.pipeline.noise.len(), 2);
    assert_eq!(config.pipeline.denoise.method(), DenoiseMethod::Wavelet);
}

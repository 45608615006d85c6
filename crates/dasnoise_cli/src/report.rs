//! Heatmaps, matrix export and metric reports.
//!
//! Heatmaps follow the usual DAS waterfall orientation: channels run along
//! the x axis and time runs down the y axis.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use dasnoise_core::{
    DenoiseOutcome, DenoiseSpec, MetricResult, NoiseLevel, NoiseSpec, PipelineConfig, PipelineRun,
};
use image::{Rgb, RgbImage};
use log::{debug, info};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use thiserror::Error;
use tiff::encoder::{colortype::Gray32Float, TiffEncoder};

use crate::colormap::Colormap;
use crate::config::OutputConfig;
use crate::source::SignalSource;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("TIFF encoding failed: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("trace channel {channel} out of range for {channels} channels")]
    TraceChannel { channel: usize, channels: usize },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// =============================================================================
// Heatmaps
// =============================================================================

/// Largest finite magnitude across `matrices`; 1.0 when all are zero.
pub fn symmetric_limit(matrices: &[ArrayView2<f64>]) -> f64 {
    let limit = matrices
        .iter()
        .flat_map(|m| m.iter())
        .filter(|v| v.is_finite())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if limit > 0.0 {
        limit
    } else {
        1.0
    }
}

/// Render `matrix` with values in `[-limit, limit]` spread over the colormap.
/// Axes longer than `max_dim` are decimated by striding.
pub fn render_heatmap(
    matrix: ArrayView2<f64>,
    limit: f64,
    colormap: Colormap,
    max_dim: usize,
) -> RgbImage {
    let (channels, samples) = matrix.dim();
    let max_dim = max_dim.max(1);
    let ch_step = channels.div_ceil(max_dim).max(1);
    let s_step = samples.div_ceil(max_dim).max(1);
    let width = channels.div_ceil(ch_step) as u32;
    let height = samples.div_ceil(s_step) as u32;

    let lut = colormap.generate_lut();
    let scale = 0.5 / limit;

    let mut img = RgbImage::new(width, height);
    for (x, ch) in (0..channels).step_by(ch_step).enumerate() {
        for (y, s) in (0..samples).step_by(s_step).enumerate() {
            let v = matrix[[ch, s]];
            let t = if v.is_finite() { 0.5 + v * scale } else { 0.5 };
            let idx = (t.clamp(0.0, 1.0) * 255.0).round() as usize;
            img.put_pixel(x as u32, y as u32, Rgb(lut[idx]));
        }
    }
    img
}

fn save_heatmap(
    path: &Path,
    matrix: ArrayView2<f64>,
    limit: f64,
    output: &OutputConfig,
) -> Result<(), ReportError> {
    render_heatmap(matrix, limit, output.colormap, output.max_dim).save(path)?;
    debug!("Wrote heatmap {}", path.display());
    Ok(())
}

// =============================================================================
// Channel Traces
// =============================================================================

/// Height of a trace plot in pixels.
pub const TRACE_HEIGHT: u32 = 256;

pub const TRACE_CLEAN: Rgb<u8> = Rgb([0, 0, 0]);
pub const TRACE_NOISY: Rgb<u8> = Rgb([170, 170, 170]);
pub const TRACE_RECOVERED: Rgb<u8> = Rgb([214, 39, 40]);

const TRACE_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TRACE_AXIS: Rgb<u8> = Rgb([220, 220, 220]);

fn trace_row(v: f64, limit: f64) -> u32 {
    let t = if v.is_finite() { 0.5 - 0.5 * v / limit } else { 0.5 };
    (t.clamp(0.0, 1.0) * (TRACE_HEIGHT - 1) as f64).round() as u32
}

/// Plot each series as a polyline over time, later series drawn on top.
/// Values in `[-limit, limit]` span the full height; samples beyond
/// `max_dim` are decimated by striding.
pub fn render_trace(
    series: &[(ArrayView1<f64>, Rgb<u8>)],
    limit: f64,
    max_dim: usize,
) -> RgbImage {
    let samples = series.iter().map(|(s, _)| s.len()).max().unwrap_or(0);
    let step = samples.div_ceil(max_dim.max(1)).max(1);
    let width = samples.div_ceil(step).max(1) as u32;

    let mut img = RgbImage::from_pixel(width, TRACE_HEIGHT, TRACE_BACKGROUND);
    let zero = trace_row(0.0, limit);
    for x in 0..width {
        img.put_pixel(x, zero, TRACE_AXIS);
    }

    for (values, color) in series {
        let mut prev: Option<u32> = None;
        for (x, s) in (0..values.len()).step_by(step).enumerate() {
            let y = trace_row(values[s], limit);
            // Vertical run joins this column to the previous point
            let (lo, hi) = match prev {
                Some(p) => (p.min(y), p.max(y)),
                None => (y, y),
            };
            for yy in lo..=hi {
                img.put_pixel(x as u32, yy, *color);
            }
            prev = Some(y);
        }
    }
    img
}

fn check_trace_channels(channels: &[usize], available: usize) -> Result<(), ReportError> {
    match channels.iter().find(|&&ch| ch >= available) {
        Some(&channel) => Err(ReportError::TraceChannel {
            channel,
            channels: available,
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Matrix Export
// =============================================================================

/// Write a matrix as a single-page 32-bit float TIFF (rows = channels).
pub fn write_tiff(path: &Path, matrix: ArrayView2<f64>) -> Result<(), ReportError> {
    let (rows, cols) = matrix.dim();
    let file = File::create(path).map_err(io_error(path))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let data: Vec<f32> = matrix.iter().map(|&v| v as f32).collect();
    encoder.write_image::<Gray32Float>(cols as u32, rows as u32, &data)?;
    Ok(())
}

/// Pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(io_error(path))?;
    Ok(())
}

// =============================================================================
// Run Report
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub source: &'a SignalSource,
    /// (channels, samples)
    pub shape: (usize, usize),
    pub pipeline: &'a PipelineConfig,
    pub noisy: MetricResult,
    pub recovered: MetricResult,
    /// Omitted when either PSNR is infinite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psnr_gain_db: Option<f64>,
}

/// Write heatmaps, the recovered matrix and `report.json` into `output.dir`.
/// Returns the paths written.
pub fn write_run(
    output: &OutputConfig,
    source: &SignalSource,
    pipeline: &PipelineConfig,
    clean: ArrayView2<f64>,
    run: &PipelineRun<f64>,
) -> Result<Vec<PathBuf>, ReportError> {
    check_trace_channels(&output.trace_channels, clean.nrows())?;
    let dir = output.dir.as_path();
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let mut written = Vec::new();

    if output.heatmaps {
        let limit = symmetric_limit(&[clean.view(), run.noisy.view(), run.recovered.view()]);
        for (name, matrix) in [
            ("clean.png", clean.view()),
            ("noisy.png", run.noisy.view()),
            ("recovered.png", run.recovered.view()),
        ] {
            let path = dir.join(name);
            save_heatmap(&path, matrix, limit, output)?;
            written.push(path);
        }

        let residual: Array2<f64> = &run.recovered - &clean;
        let path = dir.join("residual.png");
        let residual_limit = symmetric_limit(&[residual.view()]);
        save_heatmap(&path, residual.view(), residual_limit, output)?;
        written.push(path);
    }

    if !output.trace_channels.is_empty() {
        let limit = symmetric_limit(&[clean.view(), run.noisy.view(), run.recovered.view()]);
        for &ch in &output.trace_channels {
            let series = [
                (run.noisy.index_axis(Axis(0), ch), TRACE_NOISY),
                (clean.index_axis(Axis(0), ch), TRACE_CLEAN),
                (run.recovered.index_axis(Axis(0), ch), TRACE_RECOVERED),
            ];
            let path = dir.join(format!("trace_{}.png", ch));
            render_trace(&series, limit, output.max_dim).save(&path)?;
            debug!("Wrote trace {}", path.display());
            written.push(path);
        }
    }

    let tiff_path = dir.join("recovered.tiff");
    write_tiff(&tiff_path, run.recovered.view())?;
    written.push(tiff_path);

    let gain = run.psnr_gain();
    let report = RunReport {
        source,
        shape: clean.dim(),
        pipeline,
        noisy: run.noisy_metrics,
        recovered: run.recovered_metrics,
        psnr_gain_db: gain.is_finite().then_some(gain),
    };
    let json_path = dir.join("report.json");
    write_json(&json_path, &report)?;
    written.push(json_path);

    info!("Wrote {} files to {}", written.len(), dir.display());
    Ok(written)
}

// =============================================================================
// Text Tables
// =============================================================================

fn fmt_db(v: f64) -> String {
    if v.is_finite() {
        format!("{:.2}", v)
    } else if v > 0.0 {
        "inf".to_string()
    } else {
        v.to_string()
    }
}

fn fmt_ratio(v: f64) -> String {
    if v.is_finite() {
        format!("{:.4}", v)
    } else {
        v.to_string()
    }
}

fn metric_row(label: &str, m: &MetricResult, extra: &str) -> String {
    format!(
        "{:<28} {:>9} {:>8} {:>10} {}\n",
        label,
        fmt_db(m.psnr),
        fmt_ratio(m.ssim),
        fmt_ratio(m.relative_error),
        extra
    )
}

fn table_header(first: &str) -> String {
    format!(
        "{:<28} {:>9} {:>8} {:>10}\n",
        first, "PSNR(dB)", "SSIM", "RelErr"
    )
}

/// Noisy baseline versus recovered for a single run.
pub fn format_run_summary(run: &PipelineRun<f64>) -> String {
    let mut out = table_header("stage");
    out.push_str(&metric_row("noisy", &run.noisy_metrics, ""));
    out.push_str(&metric_row("recovered", &run.recovered_metrics, ""));
    out
}

// =============================================================================
// Comparison and Sweep Reports
// =============================================================================

/// One denoiser scored against the shared noisy matrix.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub method: String,
    pub spec: DenoiseSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComparisonRow {
    pub fn new(spec: DenoiseSpec, outcome: dasnoise_core::Result<DenoiseOutcome<f64>>) -> Self {
        let method = spec.method().to_string();
        match outcome {
            Ok(o) => Self {
                method,
                spec,
                metrics: Some(o.metrics),
                elapsed_ms: Some(o.elapsed.as_secs_f64() * 1e3),
                error: None,
            },
            Err(e) => Self {
                method,
                spec,
                metrics: None,
                elapsed_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub noise: Vec<NoiseSpec>,
    pub seed: Option<u64>,
    /// Noisy matrix against the clean reference.
    pub baseline: MetricResult,
    pub rows: Vec<ComparisonRow>,
}

/// One noise level run through the configured denoiser.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRow {
    pub level: NoiseLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noisy: Option<MetricResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered: Option<MetricResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepRow {
    pub fn new(level: NoiseLevel, run: dasnoise_core::Result<PipelineRun<f64>>) -> Self {
        match run {
            Ok(r) => Self {
                level,
                noisy: Some(r.noisy_metrics),
                recovered: Some(r.recovered_metrics),
                error: None,
            },
            Err(e) => Self {
                level,
                noisy: None,
                recovered: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub denoise: DenoiseSpec,
    pub seed: Option<u64>,
    pub rows: Vec<SweepRow>,
}

fn level_label(level: &NoiseLevel) -> String {
    match level {
        NoiseLevel::SnrDb(db) => format!("snr {} dB", db),
        NoiseLevel::Sigma(s) => format!("sigma {}", s),
    }
}

/// One row per denoiser, after the noisy baseline.
pub fn format_comparison(report: &ComparisonReport) -> String {
    let mut out = table_header("method");
    out.push_str(&metric_row("(noisy baseline)", &report.baseline, ""));
    for row in &report.rows {
        match (&row.metrics, &row.error) {
            (Some(m), _) => {
                let elapsed = row
                    .elapsed_ms
                    .map(|ms| format!("{:.1} ms", ms))
                    .unwrap_or_default();
                out.push_str(&metric_row(&row.method, m, &elapsed));
            }
            (None, error) => out.push_str(&format!(
                "{:<28} failed: {}\n",
                row.method,
                error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    out
}

/// One row per noise level: noisy and recovered PSNR/SSIM.
pub fn format_sweep(report: &SweepReport) -> String {
    let mut out = format!(
        "{:<28} {:>11} {:>11} {:>9} {:>9}\n",
        "noise", "noisy PSNR", "rec. PSNR", "noisy SS", "rec. SS"
    );
    for row in &report.rows {
        let label = level_label(&row.level);
        match (&row.noisy, &row.recovered) {
            (Some(n), Some(r)) => out.push_str(&format!(
                "{:<28} {:>11} {:>11} {:>9} {:>9}\n",
                label,
                fmt_db(n.psnr),
                fmt_db(r.psnr),
                fmt_ratio(n.ssim),
                fmt_ratio(r.ssim)
            )),
            _ => out.push_str(&format!(
                "{:<28} failed: {}\n",
                label,
                row.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_symmetric_limit() {
        let a = array![[0.5, -2.0], [1.0, f64::NAN]];
        let b = array![[0.1, 0.2]];
        assert_eq!(symmetric_limit(&[a.view(), b.view()]), 2.0);
        let zeros = Array2::<f64>::zeros((2, 2));
        assert_eq!(symmetric_limit(&[zeros.view()]), 1.0);
    }

    #[test]
    fn test_heatmap_orientation_and_colors() {
        // 2 channels x 3 samples -> 2 wide, 3 tall
        let m = array![[-1.0, 0.0, 1.0], [0.0, 0.0, 0.0]];
        let img = render_heatmap(m.view(), 1.0, Colormap::Grayscale, 100);
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(0, 2).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 1).0, Colormap::Grayscale.map(128.0 / 255.0));
    }

    #[test]
    fn test_heatmap_decimation() {
        let m = Array2::<f64>::zeros((10, 1000));
        let img = render_heatmap(m.view(), 1.0, Colormap::Seismic, 256);
        assert_eq!(img.dimensions(), (10, 250));
    }

    #[test]
    fn test_trace_joins_points_vertically() {
        let flat = array![0.0, 0.0];
        let step = array![1.0, -1.0];
        let img = render_trace(
            &[(flat.view(), TRACE_CLEAN), (step.view(), TRACE_RECOVERED)],
            1.0,
            100,
        );
        assert_eq!(img.dimensions(), (2, TRACE_HEIGHT));
        // +limit at the top, -limit at the bottom
        assert_eq!(*img.get_pixel(0, 0), TRACE_RECOVERED);
        assert_eq!(*img.get_pixel(1, TRACE_HEIGHT - 1), TRACE_RECOVERED);
        // The drop from +1 to -1 covers the whole second column
        for y in 0..TRACE_HEIGHT {
            assert_eq!(*img.get_pixel(1, y), TRACE_RECOVERED);
        }
        assert_eq!(*img.get_pixel(0, trace_row(0.0, 1.0)), TRACE_CLEAN);
        assert_eq!(*img.get_pixel(0, TRACE_HEIGHT - 1), TRACE_BACKGROUND);
    }

    #[test]
    fn test_trace_decimation() {
        let long = Array2::<f64>::zeros((1, 1000));
        let img = render_trace(&[(long.row(0), TRACE_NOISY)], 1.0, 256);
        assert_eq!(img.width(), 250);
    }

    #[test]
    fn test_trace_channel_range_checked() {
        assert!(check_trace_channels(&[0, 3], 4).is_ok());
        assert!(matches!(
            check_trace_channels(&[1, 4], 4),
            Err(ReportError::TraceChannel {
                channel: 4,
                channels: 4
            })
        ));
    }

    #[test]
    fn test_fmt_non_finite() {
        assert_eq!(fmt_db(f64::INFINITY), "inf");
        assert_eq!(fmt_db(20.0), "20.00");
    }

    #[test]
    fn test_failed_rows_are_reported() {
        let spec = DenoiseSpec::default();
        let row = ComparisonRow::new(
            spec,
            Err(dasnoise_core::DasError::InvalidParameter("window".to_string())),
        );
        assert!(row.metrics.is_none());
        let report = ComparisonReport {
            noise: vec![NoiseSpec::default()],
            seed: Some(1),
            baseline: MetricResult {
                psnr: 12.0,
                ssim: 0.5,
                relative_error: 0.3,
            },
            rows: vec![row],
        };
        let table = format_comparison(&report);
        assert!(table.contains("(noisy baseline)"));
        assert!(table.contains("wavelet"));
        assert!(table.contains("failed: invalid parameter: window"));
    }

    #[test]
    fn test_sweep_table_labels() {
        let report = SweepReport {
            denoise: DenoiseSpec::default(),
            seed: None,
            rows: vec![SweepRow {
                level: NoiseLevel::SnrDb(10.0),
                noisy: Some(MetricResult {
                    psnr: 20.0,
                    ssim: 0.4,
                    relative_error: 0.3,
                }),
                recovered: Some(MetricResult {
                    psnr: f64::INFINITY,
                    ssim: 1.0,
                    relative_error: 0.0,
                }),
                error: None,
            }],
        };
        let table = format_sweep(&report);
        assert!(table.contains("snr 10 dB"));
        assert!(table.contains("inf"));
    }
}

//! Signal sources: where the clean (channels, samples) matrix comes from.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::Array2;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

const DEFAULT_CHANNELS: usize = 64;
const DEFAULT_SAMPLES: usize = 1024;
const DEFAULT_EVENTS: usize = 3;
/// Ricker peak frequency in cycles per sample.
const DEFAULT_PEAK_FREQUENCY: f64 = 0.05;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("delimited text error: {0}")]
    Delimited(#[from] csv::Error),
    #[error("HDF5 error: {0}")]
    Hdf5(String),
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
    #[error("unsupported data: {0}")]
    UnsupportedData(String),
    #[error("invalid source parameter: {0}")]
    InvalidParameter(String),
    #[error("{0} support was not compiled in (enable the `{0}` feature)")]
    FeatureDisabled(&'static str),
}

fn default_delimiter() -> char {
    ','
}

fn default_channels() -> usize {
    DEFAULT_CHANNELS
}

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

fn default_events() -> usize {
    DEFAULT_EVENTS
}

fn default_peak_frequency() -> f64 {
    DEFAULT_PEAK_FREQUENCY
}

/// Origin of the clean signal matrix.
///
/// Every file source yields rows = channels and columns = time samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalSource {
    /// Single-page grayscale TIFF; image rows are channels.
    Tiff { path: PathBuf },
    /// Text matrix, one channel per line.
    Delimited {
        path: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// 2-D dataset inside an HDF5 file (including MATLAB v7.3 `.mat` files).
    Hdf5 {
        path: PathBuf,
        dataset: String,
        /// MATLAB writes column-major data, so its matrices arrive transposed.
        #[serde(default)]
        transpose: bool,
    },
    /// Ricker wavelets travelling across the array with linear moveout.
    Synthetic {
        #[serde(default = "default_channels")]
        channels: usize,
        #[serde(default = "default_samples")]
        samples: usize,
        #[serde(default = "default_events")]
        events: usize,
        #[serde(default = "default_peak_frequency")]
        peak_frequency: f64,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Default for SignalSource {
    fn default() -> Self {
        SignalSource::Synthetic {
            channels: DEFAULT_CHANNELS,
            samples: DEFAULT_SAMPLES,
            events: DEFAULT_EVENTS,
            peak_frequency: DEFAULT_PEAK_FREQUENCY,
            seed: None,
        }
    }
}

impl SignalSource {
    /// Pick a file source from the path extension.
    pub fn from_path(path: &Path, dataset: Option<&str>) -> Result<Self, SourceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let path = path.to_path_buf();
        match ext.as_str() {
            "tif" | "tiff" => Ok(SignalSource::Tiff { path }),
            "csv" | "txt" => Ok(SignalSource::Delimited {
                path,
                delimiter: default_delimiter(),
            }),
            "tsv" => Ok(SignalSource::Delimited {
                path,
                delimiter: '\t',
            }),
            "h5" | "hdf5" | "mat" => {
                let dataset = dataset.ok_or_else(|| {
                    SourceError::InvalidParameter(format!(
                        "{} needs a dataset name (--dataset)",
                        path.display()
                    ))
                })?;
                Ok(SignalSource::Hdf5 {
                    path,
                    dataset: dataset.to_string(),
                    // MATLAB stores arrays column-major
                    transpose: ext == "mat",
                })
            }
            other => Err(SourceError::UnsupportedData(format!(
                "cannot infer a loader for extension '{}'",
                other
            ))),
        }
    }

    /// Rebase relative file paths onto `base` (the config file's directory).
    pub fn resolve_relative(&mut self, base: &Path) {
        let path = match self {
            SignalSource::Tiff { path }
            | SignalSource::Delimited { path, .. }
            | SignalSource::Hdf5 { path, .. } => path,
            SignalSource::Synthetic { .. } => return,
        };
        if path.is_relative() {
            *path = base.join(&*path);
        }
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        match self {
            SignalSource::Delimited { delimiter, .. } if !delimiter.is_ascii() => {
                Err(SourceError::InvalidParameter(format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    delimiter
                )))
            }
            SignalSource::Hdf5 { dataset, .. } if dataset.is_empty() => Err(
                SourceError::InvalidParameter("hdf5 dataset name is empty".to_string()),
            ),
            SignalSource::Synthetic {
                channels,
                samples,
                peak_frequency,
                ..
            } => {
                if *channels == 0 || *samples == 0 {
                    return Err(SourceError::InvalidParameter(format!(
                        "synthetic matrix must be non-empty, got {}x{}",
                        channels, samples
                    )));
                }
                if !peak_frequency.is_finite() || *peak_frequency <= 0.0 || *peak_frequency > 0.5
                {
                    return Err(SourceError::InvalidParameter(format!(
                        "peak_frequency must be within (0, 0.5] cycles/sample, got {}",
                        peak_frequency
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Load the clean matrix.
    pub fn load(&self) -> Result<Array2<f64>, SourceError> {
        self.validate()?;
        let matrix = match self {
            SignalSource::Tiff { path } => load_tiff(path)?,
            SignalSource::Delimited { path, delimiter } => load_delimited(path, *delimiter)?,
            SignalSource::Hdf5 {
                path,
                dataset,
                transpose,
            } => load_hdf5(path, dataset, *transpose)?,
            SignalSource::Synthetic {
                channels,
                samples,
                events,
                peak_frequency,
                seed,
            } => synthetic_moveout(*channels, *samples, *events, *peak_frequency, *seed),
        };

        let (rows, cols) = matrix.dim();
        if rows == 0 || cols == 0 {
            return Err(SourceError::InvalidDimensions(format!(
                "signal matrix is empty ({}x{})",
                rows, cols
            )));
        }
        info!("Loaded {}x{} signal matrix", rows, cols);
        Ok(matrix)
    }
}

fn open(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a single-page grayscale TIFF of any integer or float sample type.
pub fn load_tiff(path: &Path) -> Result<Array2<f64>, SourceError> {
    let reader = BufReader::new(open(path)?);
    let mut decoder = Decoder::new(reader)?;

    let (width, height) = decoder.dimensions()?;
    let color_type = decoder.colortype()?;
    if !matches!(color_type, ColorType::Gray(_)) {
        return Err(SourceError::UnsupportedData(format!(
            "TIFF color type {:?}; only single-channel grayscale is supported",
            color_type
        )));
    }

    let values: Vec<f64> = match decoder.read_image()? {
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
    };

    if decoder.more_images() {
        return Err(SourceError::InvalidDimensions(
            "multi-page TIFF; expected a single 2-D page".to_string(),
        ));
    }

    debug!("TIFF {} is {}x{} ({:?})", path.display(), height, width, color_type);
    Array2::from_shape_vec((height as usize, width as usize), values)
        .map_err(|e| SourceError::InvalidDimensions(e.to_string()))
}

/// Load a delimited text matrix. Blank lines and `#` comments are skipped.
pub fn load_delimited(path: &Path, delimiter: char) -> Result<Array2<f64>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter as u8)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(BufReader::new(open(path)?));

    let mut values = Vec::new();
    let mut cols = None;
    let mut rows = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        match cols {
            None => cols = Some(record.len()),
            Some(n) if n != record.len() => {
                return Err(SourceError::InvalidDimensions(format!(
                    "row {} has {} values, expected {}",
                    line + 1,
                    record.len(),
                    n
                )));
            }
            Some(_) => {}
        }
        for field in record.iter() {
            let value: f64 = field.parse().map_err(|_| {
                SourceError::UnsupportedData(format!(
                    "row {}: '{}' is not a number",
                    line + 1,
                    field
                ))
            })?;
            values.push(value);
        }
        rows += 1;
    }

    Array2::from_shape_vec((rows, cols.unwrap_or(0)), values)
        .map_err(|e| SourceError::InvalidDimensions(e.to_string()))
}

/// Load a 2-D dataset from an HDF5 file.
#[cfg(feature = "hdf5")]
pub fn load_hdf5(path: &Path, dataset_path: &str, transpose: bool) -> Result<Array2<f64>, SourceError> {
    use hdf5_metno::File as H5File;
    use ndarray::Ix2;

    let file = H5File::open(path).map_err(|e| SourceError::Hdf5(e.to_string()))?;
    let dataset = file
        .dataset(dataset_path)
        .map_err(|e| SourceError::Hdf5(e.to_string()))?;

    let shape = dataset.shape();
    if shape.len() != 2 {
        return Err(SourceError::InvalidDimensions(format!(
            "expected a 2-D dataset, got {}-D with shape {:?}",
            shape.len(),
            shape
        )));
    }

    // Try the common sample types in turn
    let data: Array2<f64> = if let Ok(arr) = dataset.read::<f64, Ix2>() {
        arr
    } else if let Ok(arr) = dataset.read::<f32, Ix2>() {
        arr.mapv(f64::from)
    } else if let Ok(arr) = dataset.read::<i16, Ix2>() {
        arr.mapv(f64::from)
    } else if let Ok(arr) = dataset.read::<i32, Ix2>() {
        arr.mapv(f64::from)
    } else if let Ok(arr) = dataset.read::<u16, Ix2>() {
        arr.mapv(f64::from)
    } else {
        return Err(SourceError::UnsupportedData(
            "could not read dataset as f64, f32, i16, i32 or u16".to_string(),
        ));
    };

    Ok(if transpose {
        data.reversed_axes().as_standard_layout().into_owned()
    } else {
        data
    })
}

#[cfg(not(feature = "hdf5"))]
pub fn load_hdf5(
    _path: &Path,
    _dataset_path: &str,
    _transpose: bool,
) -> Result<Array2<f64>, SourceError> {
    Err(SourceError::FeatureDisabled("hdf5"))
}

/// Ricker wavelet with peak frequency `f` (cycles/sample) at lag `tau` samples.
fn ricker(tau: f64, f: f64) -> f64 {
    let a = (std::f64::consts::PI * f * tau).powi(2);
    (1.0 - 2.0 * a) * (-a).exp()
}

/// Synthetic DAS record: `events` Ricker arrivals, each with a random onset,
/// linear moveout across channels and amplitude.
pub fn synthetic_moveout(
    channels: usize,
    samples: usize,
    events: usize,
    peak_frequency: f64,
    seed: Option<u64>,
) -> Array2<f64> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    // (onset sample, moveout in samples per channel, amplitude)
    let arrivals: Vec<(f64, f64, f64)> = (0..events)
        .map(|_| {
            let onset = rng.gen_range(0.1..0.6) * samples as f64;
            let moveout = rng.gen_range(-1.0..1.0) * samples as f64 / (2.0 * channels as f64);
            let amplitude = rng.gen_range(0.5..1.0);
            (onset, moveout, amplitude)
        })
        .collect();

    Array2::from_shape_fn((channels, samples), |(ch, s)| {
        arrivals
            .iter()
            .map(|&(onset, moveout, amplitude)| {
                let arrival = onset + moveout * ch as f64;
                amplitude * ricker(s as f64 - arrival, peak_frequency)
            })
            .sum()
    })
}

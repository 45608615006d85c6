//! TOML run configuration.
//!
//! ```toml
//! [source]
//! kind = "synthetic"
//! channels = 64
//! samples = 1024
//!
//! [pipeline]
//! seed = 42
//!
//! [[pipeline.noise]]
//! type = "gaussian"
//! level = { snr_db = 10.0 }
//!
//! [pipeline.denoise]
//! method = "wavelet"
//! wavelet = "db4"
//!
//! [output]
//! dir = "out"
//! trace_channels = [0, 32]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use dasnoise_core::{DasError, PipelineConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::colormap::Colormap;
use crate::source::{SignalSource, SourceError};

const DEFAULT_OUTPUT_DIR: &str = "dasnoise-out";

/// Longest heatmap side in pixels; larger matrices are decimated.
const DEFAULT_MAX_DIM: usize = 2048;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid pipeline settings: {0}")]
    Pipeline(#[from] DasError),
    #[error("invalid source settings: {0}")]
    Source(#[from] SourceError),
    #[error("invalid output settings: {0}")]
    Output(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Write PNG heatmaps next to the report. Default: true
    pub heatmaps: bool,
    pub colormap: Colormap,
    pub max_dim: usize,
    /// Channels to plot as `trace_<ch>.png` (clean, noisy and recovered
    /// samples over time). Default: none
    pub trace_channels: Vec<usize>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            heatmaps: true,
            colormap: Colormap::default(),
            max_dim: DEFAULT_MAX_DIM,
            trace_channels: Vec::new(),
        }
    }
}

/// Everything one `dasnoise` invocation needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub source: SignalSource,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

impl RunConfig {
    /// Read and validate a TOML file. Relative source paths are taken
    /// relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.source.resolve_relative(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()?;
        self.pipeline.validate()?;
        if self.output.max_dim == 0 {
            return Err(ConfigError::Output("max_dim must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dasnoise_core::{DenoiseSpec, NoiseLevel, NoiseSpec, WaveletFamily};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(matches!(config.source, SignalSource::Synthetic { .. }));
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            [source]
            kind = "delimited"
            path = "data/run.csv"
            delimiter = ";"

            [pipeline]
            seed = 7

            [[pipeline.noise]]
            type = "gaussian"
            level = { sigma = 0.2 }

            [[pipeline.noise]]
            type = "salt_pepper"
            probability = 0.01

            [pipeline.denoise]
            method = "wavelet"
            wavelet = "sym4"
            threshold_mode = "hard"
            layout = "matrix"

            [pipeline.metrics]
            error_norm = "l1"
            data_range = 2.0

            [output]
            dir = "results"
            colormap = "viridis"
            heatmaps = false
        "#;
        let config = RunConfig::from_toml_str(text).unwrap();

        assert_eq!(
            config.source,
            SignalSource::Delimited {
                path: PathBuf::from("data/run.csv"),
                delimiter: ';'
            }
        );
        assert_eq!(config.pipeline.seed, Some(7));
        assert_eq!(config.pipeline.noise.len(), 2);
        assert_eq!(
            config.pipeline.noise[0],
            NoiseSpec::Gaussian {
                level: NoiseLevel::Sigma(0.2)
            }
        );
        match config.pipeline.denoise {
            DenoiseSpec::Wavelet(p) => {
                assert_eq!(p.wavelet, WaveletFamily::Sym4);
                assert_eq!(p.level, 3);
            }
            other => panic!("unexpected denoiser {:?}", other),
        }
        assert_eq!(config.pipeline.metrics.data_range, Some(2.0));
        assert_eq!(config.output.colormap, Colormap::Viridis);
        assert!(!config.output.heatmaps);
        assert_eq!(config.output.max_dim, DEFAULT_MAX_DIM);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let text = r#"
            [pipeline.denoise]
            method = "median"
            window = 4
        "#;
        assert!(matches!(
            RunConfig::from_toml_str(text),
            Err(ConfigError::Pipeline(DasError::InvalidParameter(_)))
        ));

        let text = r#"
            [pipeline.denoise]
            method = "wiener"
        "#;
        assert!(matches!(
            RunConfig::from_toml_str(text),
            Err(ConfigError::Parse(_))
        ));

        let text = r#"
            [output]
            max_dim = 0
        "#;
        assert!(matches!(
            RunConfig::from_toml_str(text),
            Err(ConfigError::Output(_))
        ));
    }
}

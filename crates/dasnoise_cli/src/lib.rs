//! Front end for the DAS noise workbench: signal loading, TOML
//! configuration, heatmap rendering and report files around
//! [`dasnoise_core`].

pub mod colormap;
pub mod commands;
pub mod config;
pub mod report;
pub mod source;

pub use config::{ConfigError, OutputConfig, RunConfig};
pub use source::{SignalSource, SourceError};

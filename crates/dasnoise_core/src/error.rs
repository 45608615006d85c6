use thiserror::Error;

/// Errors raised by the noise, denoise and metric stages.
///
/// Every stage validates its inputs before touching any data, so an error
/// always means no partial result was produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DasError {
    /// Out-of-range or malformed noise/denoise/metric parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Matrices have incompatible dimensions, are empty, or are not 2-D.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Wavelet family name not in the built-in filter bank table.
    #[error("unsupported wavelet family '{0}'")]
    UnsupportedWavelet(String),

    /// Denoising method name not recognised.
    #[error("unsupported denoising method '{0}'")]
    UnsupportedMethod(String),
}

impl DasError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DasError>;

use thiserror::Error;

/// Everything that can stop a plotting call.
///
/// Empty selections (no free parameters, nothing to pair, too few bin sizes)
/// are not errors; renderers report them through [`crate::Outcome`].
#[derive(Debug, Error)]
pub enum PlotError {
    /// Input arrays whose dimensions do not fit together.
    #[error("shape error: {0}")]
    Shape(String),
    /// Well-shaped input holding values the pipeline cannot use.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A persisted sample array or CSV file that could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
    /// The rendering backend failed; passed through unchanged.
    #[error("rendering backend failed: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlotError>;

pub(crate) fn shape_err<T>(msg: impl Into<String>) -> Result<T> {
    Err(PlotError::Shape(msg.into()))
}

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(PlotError::InvalidInput(msg.into()))
}

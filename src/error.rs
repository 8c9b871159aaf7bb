//! Error taxonomy for the forecasting pipeline
//!
//! Every failure is local to one request/generation: nothing here crashes or
//! halts the orchestrator, and nothing triggers an automatic retry. Retry is
//! user-driven via re-selecting a symbol.

use thiserror::Error;

/// Pipeline failure modes
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Provider returned no usable series (invalid symbol, exhausted rate
    /// limit, malformed body, timeout). Display state is left unchanged.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Fewer closes than the input window requires. Raised before
    /// normalization rather than computing on a padded window.
    #[error("insufficient history: got {got} closes, need {need}")]
    InsufficientHistory { got: usize, need: usize },

    /// Network/resource error acquiring or decoding the inference artifact.
    /// Retryable by re-selection; the single-flight guard prevents duplicate
    /// loads during retry storms.
    #[error("model load failure: {0}")]
    ModelLoadFailure(String),

    /// Shape or decode mismatch from the inference resource.
    #[error("inference failure: {0}")]
    InferenceFailure(String),

    /// A completed step whose generation no longer matches the current
    /// selection. Discarded silently; never surfaced to the display.
    #[error("stale response for generation {generation}")]
    StaleResponse { generation: u64 },
}

impl ForecastError {
    /// Stale results are discarded, not reported; callers use this to pick
    /// debug-level logging over the error path.
    pub fn is_stale(&self) -> bool {
        matches!(self, ForecastError::StaleResponse { .. })
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

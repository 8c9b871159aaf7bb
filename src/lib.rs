//! Trendcast - Daily Close Forecasting Pipeline
//!
//! Fetches a bounded daily-close history for a ticker symbol, normalizes a
//! fixed-length input window against an anchor close, runs a pretrained
//! sequence model over it, and merges history and denormalized forecast into
//! one plot-ready series.
//!
//! # Architecture
//!
//! ```text
//! symbol selection → Orchestrator (generation-fenced state machine)
//!     ↓
//! HistorySource (provider HTTP fetch, ascending bounded series)
//!     ↓
//! window::normalize (last K closes / anchor)
//!     ↓
//! ForecastEngine (single-flight model load, [1, K] inference)
//!     ↓
//! window::denormalize (× anchor)
//!     ↓
//! MergedSeries (labels / actual / predicted, gap-filled)
//!     ↓
//! watch::Receiver<DisplaySnapshot> → display consumers
//! ```
//!
//! The inference resource is loaded lazily, once per process, and shared by
//! every forecast regardless of symbol. Failures never clear previously
//! committed display state; retry is user-driven by re-selecting.
//!
//! # Module Organization
//!
//! - `config` - Environment-driven settings with built-in defaults
//! - `error` - Failure taxonomy shared by every stage
//! - `series` - PricePoint, HistorySeries, MergedSeries
//! - `window` - Input window construction and anchor scaling
//! - `history` - Market-data provider seam and HTTP client
//! - `model` - Inference seams and the ONNX adapter
//! - `engine` - Single-flight model lifecycle and invocation
//! - `orchestrator` - Selection handling, fencing, display snapshots

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod orchestrator;
pub mod series;
pub mod window;

// Re-export commonly used types
pub use config::Config;
pub use engine::ForecastEngine;
pub use error::{ForecastError, Result};
pub use history::{AlphaVantageClient, HistorySource};
pub use model::{HttpModelLoader, InferenceModel, ModelLoader, OnnxModel};
pub use orchestrator::{CommittedForecast, DisplaySnapshot, Orchestrator, PipelinePhase};
pub use series::{HistorySeries, MergedSeries, PricePoint};
pub use window::{denormalize, normalize, InputWindow, NormalizationContext};

/// Wire the production pipeline from configuration.
///
/// Provider client, HTTP model loader, and engine are assembled the same way
/// a display shell would do it by hand; tests swap the seams instead.
pub fn build_orchestrator(config: &Config) -> Orchestrator {
    let source = std::sync::Arc::new(AlphaVantageClient::new(config));
    let loader = std::sync::Arc::new(HttpModelLoader::new(
        config.model_url.clone(),
        config.model_timeout,
    ));
    let engine = ForecastEngine::new(loader);
    Orchestrator::new(source, engine, config.window_len)
}

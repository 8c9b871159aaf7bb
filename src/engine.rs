//! Forecast engine: inference resource lifecycle and invocation
//!
//! Owns the one shared inference resource. Loading is lazy and single-flight:
//! the first caller triggers the load, concurrent callers await that same
//! load, and the result is cached for the rest of the process lifetime. A
//! failed load leaves the cache empty, so the next selection retries.

use crate::error::{ForecastError, Result};
use crate::model::{InferenceModel, ModelLoader};
use crate::window::InputWindow;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct ForecastEngine {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn InferenceModel>>,
}

impl ForecastEngine {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    /// Get the shared inference resource, loading it on first use.
    ///
    /// Concurrent callers during an in-progress load all await that load and
    /// share its outcome. On failure the cache stays empty.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn InferenceModel>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                log::info!("🧠 loading inference resource");
                self.loader.load().await
            })
            .await?;
        Ok(model.clone())
    }

    /// Run one forecast over a normalized window, loading the resource first
    /// if needed.
    ///
    /// H is whatever length the model emits; an empty output is an
    /// `InferenceFailure`.
    pub async fn predict(&self, window: &InputWindow) -> Result<Vec<f64>> {
        let model = self.ensure_loaded().await?;
        let forecast = model.predict(window.values())?;

        if forecast.is_empty() {
            return Err(ForecastError::InferenceFailure(
                "model produced an empty forecast".to_string(),
            ));
        }

        log::debug!(
            "forecast of {} steps from a {}-close window",
            forecast.len(),
            window.len()
        );
        Ok(forecast)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Drop the cached resource so the next call loads afresh. The only
    /// reload path; nothing evicts automatically.
    pub fn invalidate(&mut self) {
        if self.model.take().is_some() {
            log::info!("🧠 inference resource invalidated");
        }
    }
}

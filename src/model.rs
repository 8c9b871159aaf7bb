//! Inference resource seams and the ONNX adapter
//!
//! The pipeline treats the pretrained model as opaque: rank-2 `[1, K]` input
//! in, flat forecast vector out. `InferenceModel` is the invocation seam,
//! `ModelLoader` the acquisition seam; `OnnxModel`/`HttpModelLoader` are the
//! production implementations.

use crate::error::{ForecastError, Result};
use async_trait::async_trait;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A loaded inference resource. Read-only after construction; safe to share
/// across concurrent forecast invocations.
pub trait InferenceModel: Send + Sync {
    /// Run one forecast over a normalized window.
    ///
    /// The output length is the model's horizon H; callers never choose it.
    fn predict(&self, window: &[f64]) -> Result<Vec<f64>>;
}

impl std::fmt::Debug for dyn InferenceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn InferenceModel")
    }
}

/// Acquisition seam for the inference artifact. Invoked at most once per
/// process by the engine's single-flight guard.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn InferenceModel>>;
}

fn load_err(e: impl Display) -> ForecastError {
    ForecastError::ModelLoadFailure(e.to_string())
}

fn infer_err(e: impl Display) -> ForecastError {
    ForecastError::InferenceFailure(e.to_string())
}

/// Lay a window out as the rank-2 `[1, K]` tensor the model expects.
fn to_input_tensor(window: &[f64]) -> Array2<f32> {
    let mut input = Array2::<f32>::zeros((1, window.len()));
    for (i, &value) in window.iter().enumerate() {
        input[[0, i]] = value as f32;
    }
    input
}

/// ONNX-backed inference resource.
///
/// The session is serialized behind a mutex; inference calls from concurrent
/// requests queue rather than interleave.
pub struct OnnxModel {
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxModel {
    /// Build a session from raw artifact bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let session = Session::builder()
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .with_intra_threads(1)
            .map_err(load_err)?
            .commit_from_memory(bytes)
            .map_err(load_err)?;

        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| ForecastError::ModelLoadFailure("model has no outputs".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl InferenceModel for OnnxModel {
    fn predict(&self, window: &[f64]) -> Result<Vec<f64>> {
        let input_tensor = Value::from_array(to_input_tensor(window)).map_err(infer_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ForecastError::InferenceFailure("model session poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![input_tensor]).map_err(infer_err)?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            ForecastError::InferenceFailure(format!("missing model output {}", self.output_name))
        })?;
        let tensor = output.try_extract_tensor::<f32>().map_err(infer_err)?;
        let forecast: Vec<f64> = tensor.1.iter().map(|&v| v as f64).collect();

        if forecast.is_empty() {
            return Err(ForecastError::InferenceFailure(
                "model produced an empty forecast".to_string(),
            ));
        }

        Ok(forecast)
    }
}

/// Fetches the model artifact over HTTP and builds the ONNX session from the
/// response bytes.
pub struct HttpModelLoader {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpModelLoader {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            timeout,
        }
    }
}

#[async_trait]
impl ModelLoader for HttpModelLoader {
    async fn load(&self) -> Result<Arc<dyn InferenceModel>> {
        log::info!("⬇️ fetching model artifact from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| load_err(format!("artifact request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(load_err(format!(
                "artifact fetch returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| load_err(format!("artifact body unreadable: {}", e)))?;

        let model = OnnxModel::from_bytes(&bytes)?;
        log::info!("🧠 model artifact ready ({} bytes)", bytes.len());
        Ok(Arc::new(model))
    }
}

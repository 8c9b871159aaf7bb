//! Selection-driven pipeline orchestration
//!
//! Sequences fetch → normalize → infer → denormalize → merge per symbol
//! selection and fences every step with a generation token. No step is
//! cancellable, so superseded requests run to completion and their results
//! are discarded at the commit point instead.
//!
//! ```text
//! select(symbol)
//!     ↓ generation := current + 1
//! HistorySource::fetch          (Fetching)
//!     ↓ token check
//! window::normalize             (Normalizing)
//!     ↓ token check
//! ForecastEngine::predict       (Inferring, loads the model on first use)
//!     ↓
//! window::denormalize → MergedSeries::merge
//!     ↓ token check
//! commit                        (Merged)
//! ```
//!
//! Display consumers subscribe to a watch channel and receive a
//! `DisplaySnapshot` on every phase change and commit.

use crate::engine::ForecastEngine;
use crate::error::{ForecastError, Result};
use crate::history::HistorySource;
use crate::series::MergedSeries;
use crate::window;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Pipeline phase for UI feedback.
///
/// `Inferring` spans model load and prediction; the load is skipped once the
/// resource is cached. `Error` is terminal per generation; a new selection
/// resets to `Fetching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelinePhase {
    Idle,
    Fetching,
    Normalizing,
    Inferring,
    Merged,
    Error,
}

/// A merged series together with the selection that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedForecast {
    pub generation: u64,
    pub symbol: String,
    pub series: MergedSeries,
}

/// What display consumers see: current phase, current selection, the last
/// committed forecast, and the last error message if the current generation
/// failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySnapshot {
    pub phase: PipelinePhase,
    pub symbol: Option<String>,
    pub forecast: Option<CommittedForecast>,
    pub error: Option<String>,
}

impl DisplaySnapshot {
    fn idle() -> Self {
        Self {
            phase: PipelinePhase::Idle,
            symbol: None,
            forecast: None,
            error: None,
        }
    }
}

/// Generation counter and display state under one lock, so the
/// check-generation-then-mutate step is atomic.
struct DisplayState {
    current_generation: u64,
    phase: PipelinePhase,
    symbol: Option<String>,
    forecast: Option<CommittedForecast>,
    error: Option<String>,
}

impl DisplayState {
    fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            phase: self.phase,
            symbol: self.symbol.clone(),
            forecast: self.forecast.clone(),
            error: self.error.clone(),
        }
    }
}

pub struct Orchestrator {
    source: Arc<dyn HistorySource>,
    engine: Arc<ForecastEngine>,
    window_len: usize,
    state: Mutex<DisplayState>,
    snapshot_tx: watch::Sender<DisplaySnapshot>,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn HistorySource>, engine: ForecastEngine, window_len: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(DisplaySnapshot::idle());
        Self {
            source,
            engine: Arc::new(engine),
            window_len,
            state: Mutex::new(DisplayState {
                current_generation: 0,
                phase: PipelinePhase::Idle,
                symbol: None,
                forecast: None,
                error: None,
            }),
            snapshot_tx,
        }
    }

    /// Subscribe to display snapshots. The receiver immediately holds the
    /// current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Current display snapshot, pull-style.
    pub async fn snapshot(&self) -> DisplaySnapshot {
        self.state.lock().await.snapshot()
    }

    /// Drive the full pipeline for a symbol selection.
    ///
    /// Trims and uppercases the symbol; an empty selection is rejected
    /// without allocating a generation. Returns `Ok` once the merged series
    /// is committed, `Err(StaleResponse)` when a later selection superseded
    /// this one, and the failing step's error otherwise. A failure marks the
    /// `Error` phase but never clears a previously committed forecast.
    pub async fn select(&self, symbol: &str) -> Result<()> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ForecastError::DataUnavailable(
                "empty symbol selected".to_string(),
            ));
        }

        let generation = {
            let mut state = self.state.lock().await;
            state.current_generation += 1;
            state.phase = PipelinePhase::Fetching;
            state.symbol = Some(symbol.clone());
            state.error = None;
            self.publish(&state);
            state.current_generation
        };
        log::info!("🔎 selected {} (generation {})", symbol, generation);

        match self.run_pipeline(generation, symbol).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_stale() => {
                log::debug!("discarding superseded result: {}", err);
                Err(err)
            }
            Err(err) => {
                self.fail(generation, &err).await;
                Err(err)
            }
        }
    }

    async fn run_pipeline(&self, generation: u64, symbol: String) -> Result<()> {
        let series = self.source.fetch(&symbol).await?;
        self.advance(generation, PipelinePhase::Normalizing).await?;

        let (window, ctx) = window::normalize(&series, self.window_len)?;
        self.advance(generation, PipelinePhase::Inferring).await?;

        let forecast = self.engine.predict(&window).await?;
        let denormalized = window::denormalize(&forecast, &ctx);
        let merged = MergedSeries::merge(&series, &denormalized);

        self.commit(generation, symbol, merged).await
    }

    /// Fenced phase transition: only the current generation may move the
    /// display state.
    async fn advance(&self, generation: u64, phase: PipelinePhase) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.current_generation != generation {
            return Err(ForecastError::StaleResponse { generation });
        }
        state.phase = phase;
        self.publish(&state);
        Ok(())
    }

    /// Fenced commit of the finished merged series.
    async fn commit(&self, generation: u64, symbol: String, merged: MergedSeries) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.current_generation != generation {
            return Err(ForecastError::StaleResponse { generation });
        }

        log::info!(
            "✅ committed {} points for {} (generation {})",
            merged.len(),
            symbol,
            generation
        );
        state.phase = PipelinePhase::Merged;
        state.forecast = Some(CommittedForecast {
            generation,
            symbol,
            series: merged,
        });
        self.publish(&state);
        Ok(())
    }

    /// Fenced error transition. A stale failure belongs to a superseded
    /// selection and is dropped without touching the display; a current one
    /// marks the `Error` phase. The committed forecast survives either way.
    async fn fail(&self, generation: u64, err: &ForecastError) {
        let mut state = self.state.lock().await;
        if state.current_generation != generation {
            log::debug!("discarding superseded failure (generation {}): {}", generation, err);
            return;
        }

        log::warn!("⚠️ pipeline failed (generation {}): {}", generation, err);
        state.phase = PipelinePhase::Error;
        state.error = Some(err.to_string());
        self.publish(&state);
    }

    fn publish(&self, state: &DisplayState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InferenceModel, ModelLoader};
    use crate::series::{HistorySeries, PricePoint};
    use async_trait::async_trait;
    use chrono::{Days, NaiveDate};
    use std::collections::HashMap;
    use std::time::Duration;

    struct StubModel {
        ratio: f64,
        horizon: usize,
    }

    impl InferenceModel for StubModel {
        fn predict(&self, _window: &[f64]) -> Result<Vec<f64>> {
            Ok(vec![self.ratio; self.horizon])
        }
    }

    struct StubLoader {
        ratio: f64,
        horizon: usize,
    }

    #[async_trait]
    impl ModelLoader for StubLoader {
        async fn load(&self) -> Result<Arc<dyn InferenceModel>> {
            Ok(Arc::new(StubModel {
                ratio: self.ratio,
                horizon: self.horizon,
            }))
        }
    }

    /// Per-symbol scripted history source with optional response delay.
    /// A script without closes fails with DataUnavailable after its delay.
    struct ScriptedSource {
        scripts: HashMap<String, (Option<Vec<f64>>, Duration)>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                scripts: HashMap::new(),
            }
        }

        fn with(mut self, symbol: &str, closes: Vec<f64>, delay: Duration) -> Self {
            self.scripts.insert(symbol.to_string(), (Some(closes), delay));
            self
        }

        fn with_failure(mut self, symbol: &str, delay: Duration) -> Self {
            self.scripts.insert(symbol.to_string(), (None, delay));
            self
        }
    }

    #[async_trait]
    impl HistorySource for ScriptedSource {
        async fn fetch(&self, symbol: &str) -> Result<HistorySeries> {
            let (closes, delay) = self
                .scripts
                .get(symbol)
                .ok_or_else(|| ForecastError::DataUnavailable(format!("no series for {}", symbol)))?;
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            match closes {
                Some(closes) => Ok(make_series(closes)),
                None => Err(ForecastError::DataUnavailable(format!(
                    "no series for {}",
                    symbol
                ))),
            }
        }
    }

    fn make_series(closes: &[f64]) -> HistorySeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start.checked_add_days(Days::new(i as u64)).unwrap(),
                close,
            })
            .collect();
        HistorySeries::from_unordered(points, 60)
    }

    fn make_closes(n: usize, start: f64) -> Vec<f64> {
        (0..n).map(|i| start + i as f64).collect()
    }

    fn make_engine() -> ForecastEngine {
        ForecastEngine::new(Arc::new(StubLoader {
            ratio: 1.0,
            horizon: 5,
        }))
    }

    fn make_orchestrator(source: ScriptedSource) -> Orchestrator {
        Orchestrator::new(Arc::new(source), make_engine(), 30)
    }

    #[tokio::test]
    async fn test_select_commits_merged_series() {
        let source = ScriptedSource::new().with("IBM", make_closes(60, 100.0), Duration::ZERO);
        let orch = make_orchestrator(source);

        orch.select("ibm ").await.unwrap();

        let snap = orch.snapshot().await;
        assert_eq!(snap.phase, PipelinePhase::Merged);
        assert_eq!(snap.symbol.as_deref(), Some("IBM"));
        assert!(snap.error.is_none());

        let committed = snap.forecast.unwrap();
        assert_eq!(committed.symbol, "IBM");
        assert_eq!(committed.generation, 1);
        assert_eq!(committed.series.labels.len(), 65);
    }

    #[tokio::test]
    async fn test_select_rejects_empty_symbol() {
        let source = ScriptedSource::new();
        let orch = make_orchestrator(source);

        let err = orch.select("   ").await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable(_)));

        // No generation was allocated
        let snap = orch.snapshot().await;
        assert_eq!(snap.phase, PipelinePhase::Idle);
        assert!(snap.symbol.is_none());
    }

    #[tokio::test]
    async fn test_short_history_fails_without_commit() {
        let source = ScriptedSource::new().with("NEW", make_closes(10, 100.0), Duration::ZERO);
        let orch = make_orchestrator(source);

        let err = orch.select("NEW").await.unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientHistory { got: 10, need: 30 }
        ));

        let snap = orch.snapshot().await;
        assert_eq!(snap.phase, PipelinePhase::Error);
        assert!(snap.forecast.is_none());
        assert!(snap.error.unwrap().contains("insufficient history"));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_commit() {
        // 1. A good selection commits
        let source = ScriptedSource::new().with("GOOD", make_closes(60, 100.0), Duration::ZERO);
        let orch = make_orchestrator(source);
        orch.select("GOOD").await.unwrap();

        // 2. A failing selection marks Error but the old forecast stays
        let err = orch.select("BAD").await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable(_)));

        let snap = orch.snapshot().await;
        assert_eq!(snap.phase, PipelinePhase::Error);
        assert_eq!(snap.symbol.as_deref(), Some("BAD"));
        assert_eq!(snap.forecast.unwrap().symbol, "GOOD");
    }

    #[tokio::test]
    async fn test_new_selection_clears_error_message() {
        // 1. A failing selection puts an error message in the snapshot
        let source = ScriptedSource::new().with("GOOD", make_closes(60, 100.0), Duration::ZERO);
        let orch = make_orchestrator(source);
        orch.select("BAD").await.unwrap_err();
        assert!(orch.snapshot().await.error.is_some());

        // 2. The next selection starts with a clean error slot, and a commit
        // leaves it empty
        orch.select("GOOD").await.unwrap();

        let snap = orch.snapshot().await;
        assert_eq!(snap.phase, PipelinePhase::Merged);
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_later_selection_supersedes_earlier() {
        // 1. SLOW's fetch outlives FAST's entire pipeline
        let source = ScriptedSource::new()
            .with("SLOW", make_closes(60, 100.0), Duration::from_millis(200))
            .with("FAST", make_closes(60, 200.0), Duration::ZERO);
        let orch = Arc::new(make_orchestrator(source));

        let slow = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.select("SLOW").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // 2. FAST commits while SLOW is still fetching
        orch.select("FAST").await.unwrap();

        // 3. SLOW finishes later and is discarded by the fence
        let result = slow.await.unwrap();
        assert!(matches!(
            result,
            Err(ForecastError::StaleResponse { generation: 1 })
        ));

        let snap = orch.snapshot().await;
        assert_eq!(snap.phase, PipelinePhase::Merged);
        let committed = snap.forecast.unwrap();
        assert_eq!(committed.symbol, "FAST");
        assert_eq!(committed.generation, 2);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_mark_error() {
        // SLOW's fetch fails only after FAST already committed; the stale
        // failure belongs to generation 1 and must not touch the display
        let source = ScriptedSource::new()
            .with("FAST", make_closes(60, 200.0), Duration::ZERO)
            .with_failure("SLOW", Duration::from_millis(200));
        let orch = Arc::new(make_orchestrator(source));

        let slow = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.select("SLOW").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        orch.select("FAST").await.unwrap();

        let result = slow.await.unwrap();
        assert!(matches!(result, Err(ForecastError::DataUnavailable(_))));

        let snap = orch.snapshot().await;
        assert_eq!(snap.phase, PipelinePhase::Merged);
        assert!(snap.error.is_none());
        assert_eq!(snap.forecast.unwrap().symbol, "FAST");
    }

    #[tokio::test]
    async fn test_watch_subscribers_see_commit() {
        let source = ScriptedSource::new().with("IBM", make_closes(60, 100.0), Duration::ZERO);
        let orch = make_orchestrator(source);

        let mut rx = orch.subscribe();
        assert_eq!(rx.borrow().phase, PipelinePhase::Idle);

        orch.select("IBM").await.unwrap();

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.phase, PipelinePhase::Merged);
        assert!(snap.forecast.is_some());
    }
}

//! Price series data model
//!
//! `HistorySeries` is the bounded, ascending daily-close series every other
//! pipeline stage consumes; `MergedSeries` is the plot-ready alignment of
//! history and forecast handed to display consumers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily close. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Ordered daily-close series, strictly ascending by date, capped at the
/// configured history bound.
///
/// Invariants: no duplicate dates; all closes finite and > 0. Created per
/// fetch and replaced wholesale on each new selection, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySeries {
    points: Vec<PricePoint>,
}

impl HistorySeries {
    /// Build a series from provider-ordered points.
    ///
    /// Sorts ascending by date, drops duplicate dates and points with
    /// non-finite or non-positive closes, then keeps only the most recent
    /// `cap` points. A result shorter than `cap` is valid; emptiness is for
    /// the caller to judge (the provider adapter maps it to
    /// `DataUnavailable`).
    pub fn from_unordered(mut points: Vec<PricePoint>, cap: usize) -> Self {
        points.retain(|p| p.close.is_finite() && p.close > 0.0);
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        // Keep the most recent cap points
        if points.len() > cap {
            points.drain(..points.len() - cap);
        }

        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Oldest point of the full bounded series. This is the normalization
    /// anchor source, regardless of how long the input window is.
    pub fn oldest(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn newest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}

/// Plot-ready alignment of actual history and denormalized forecast.
///
/// All three tracks share one length: `series.len() + forecast.len()`.
/// `actual` is populated for the history slots and absent afterwards;
/// `predicted` is absent over the history slots and populated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSeries {
    pub labels: Vec<String>,
    pub actual: Vec<Option<f64>>,
    pub predicted: Vec<Option<f64>>,
}

impl MergedSeries {
    /// Align a history series with a denormalized forecast.
    ///
    /// Labels are the ISO dates of the series followed by one synthetic
    /// label per forecast step (`"Predicted +1"` .. `"Predicted +H"`).
    /// Pure structural alignment; no numeric transformation.
    pub fn merge(series: &HistorySeries, forecast: &[f64]) -> Self {
        let n = series.len();
        let h = forecast.len();

        let mut labels = Vec::with_capacity(n + h);
        let mut actual = Vec::with_capacity(n + h);
        let mut predicted = Vec::with_capacity(n + h);

        for point in series.points() {
            labels.push(point.date.format("%Y-%m-%d").to_string());
            actual.push(Some(point.close));
            predicted.push(None);
        }

        for (i, &value) in forecast.iter().enumerate() {
            labels.push(format!("Predicted +{}", i + 1));
            actual.push(None);
            predicted.push(Some(value));
        }

        Self {
            labels,
            actual,
            predicted,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

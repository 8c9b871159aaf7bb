//! Input window construction and anchor-based scaling
//!
//! The model consumes ratios, not prices: the last K closes are divided by an
//! anchor close on the way in, and forecast ratios are multiplied by the same
//! anchor on the way out.

use crate::error::{ForecastError, Result};
use crate::series::HistorySeries;

/// Scaling context shared between normalization and denormalization.
///
/// The anchor is the close of the oldest point in the full bounded series,
/// not the first element of the K-point window taken from its tail. Both
/// directions must use the same anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationContext {
    pub anchor: f64,
}

/// Fixed-length normalized model input: the most recent K closes divided by
/// the anchor, order preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct InputWindow {
    values: Vec<f64>,
}

impl InputWindow {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Derive the normalized input window and its scaling context.
///
/// Fails with `InsufficientHistory` when the series holds fewer than `k`
/// closes. Anchor = the full series' oldest close, even when the series is
/// longer than the window.
pub fn normalize(series: &HistorySeries, k: usize) -> Result<(InputWindow, NormalizationContext)> {
    if series.len() < k {
        return Err(ForecastError::InsufficientHistory {
            got: series.len(),
            need: k,
        });
    }

    // Oldest close of the whole bounded series, not of the tail window
    let anchor = match series.oldest() {
        Some(point) => point.close,
        None => {
            return Err(ForecastError::InsufficientHistory { got: 0, need: k });
        }
    };

    let closes = series.closes();
    let values = closes[closes.len() - k..]
        .iter()
        .map(|close| close / anchor)
        .collect();

    Ok((InputWindow { values }, NormalizationContext { anchor }))
}

/// Rescale forecast ratios back to price units. Pure; total for finite input.
pub fn denormalize(forecast: &[f64], ctx: &NormalizationContext) -> Vec<f64> {
    forecast.iter().map(|value| value * ctx.anchor).collect()
}

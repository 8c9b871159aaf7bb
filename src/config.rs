//! Configuration loaded from environment variables
//!
//! Every knob has a default; nothing is required. The `demo` provider key
//! works against the public endpoint with heavy rate limits, so real use
//! sets TRENDCAST_API_KEY.

use std::env;
use std::time::Duration;

const DEFAULT_PROVIDER_URL: &str = "https://www.alphavantage.co/query";
const DEFAULT_MODEL_URL: &str =
    "https://storage.googleapis.com/tfjs-models/tfjs/lstm-stock/model.onnx";

#[derive(Debug, Clone)]
pub struct Config {
    /// Daily time-series endpoint
    pub provider_base_url: String,
    /// Provider API key
    pub api_key: String,
    /// Inference artifact location
    pub model_url: String,
    /// Maximum closes kept per fetch
    pub history_cap: usize,
    /// Input window length fed to the model
    pub window_len: usize,
    /// Bound on one history request
    pub fetch_timeout: Duration,
    /// Bound on the one-time artifact fetch
    pub model_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Honors a local .env file. Unset or unparseable variables fall back to
    /// their defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        Self {
            provider_base_url: env::var("TRENDCAST_PROVIDER_URL")
                .unwrap_or(defaults.provider_base_url),
            api_key: env::var("TRENDCAST_API_KEY").unwrap_or(defaults.api_key),
            model_url: env::var("TRENDCAST_MODEL_URL").unwrap_or(defaults.model_url),
            history_cap: env_usize("TRENDCAST_HISTORY_CAP", defaults.history_cap),
            window_len: env_usize("TRENDCAST_WINDOW_LEN", defaults.window_len),
            fetch_timeout: Duration::from_secs(env_u64(
                "TRENDCAST_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )),
            model_timeout: Duration::from_secs(env_u64(
                "TRENDCAST_MODEL_TIMEOUT_SECS",
                defaults.model_timeout.as_secs(),
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: "demo".to_string(),
            model_url: DEFAULT_MODEL_URL.to_string(),
            history_cap: 60,
            window_len: 30,
            fetch_timeout: Duration::from_secs(10),
            model_timeout: Duration::from_secs(30),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

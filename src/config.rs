//! Run configuration with environment overrides.

use std::time::Duration;

use tracing::warn;

use crate::chart::{ChartConfig, Palette};
use crate::prompts::PromptConstraints;
use crate::retry::RetryPolicy;

pub const ENV_MIN_WORDS: &str = "BIAS_EXPLAINER_MIN_WORDS";
pub const ENV_MAX_WORDS: &str = "BIAS_EXPLAINER_MAX_WORDS";
pub const ENV_MAX_ATTEMPTS: &str = "BIAS_EXPLAINER_MAX_ATTEMPTS";
pub const ENV_LLM_TIMEOUT_SECONDS: &str = "BIAS_EXPLAINER_LLM_TIMEOUT_SECONDS";
pub const ENV_RETRY_DELAY_MS: &str = "BIAS_EXPLAINER_RETRY_DELAY_MS";
pub const ENV_PALETTE: &str = "BIAS_EXPLAINER_PALETTE";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisConfig {
    pub constraints: PromptConstraints,
    pub retry: RetryPolicy,
    pub charts: ChartConfig,
}

impl AnalysisConfig {
    /// Defaults overlaid with any `BIAS_EXPLAINER_*` variables that parse.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = parsed::<usize>(&lookup, ENV_MIN_WORDS) {
            config.constraints.min_words = v;
        }
        if let Some(v) = parsed::<usize>(&lookup, ENV_MAX_WORDS) {
            config.constraints.max_words = v;
        }
        if let Some(v) = parsed::<u32>(&lookup, ENV_MAX_ATTEMPTS) {
            config.retry.max_attempts = v.max(1);
        }
        if let Some(v) = parsed::<u64>(&lookup, ENV_LLM_TIMEOUT_SECONDS) {
            config.retry.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parsed::<u64>(&lookup, ENV_RETRY_DELAY_MS) {
            config.retry.backoff = Duration::from_millis(v);
        }
        if let Some(spec) = lookup(ENV_PALETTE) {
            match Palette::parse(&spec) {
                Ok(palette) => config.charts.palette = palette,
                Err(e) => warn!(key = ENV_PALETTE, error = %e, "Ignoring invalid palette"),
            }
        }

        config
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable config value");
            None
        }
    }
}

//! Engine tuning knobs

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::ExtractorTier;

/// Mk5 belt throughput in items per minute.
pub const DEFAULT_BELT_LIMIT: f64 = 780.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Hard cap on allocation iterations; exceeding it is a timeout.
    pub max_iterations: usize,
    /// Consecutive unchanged iterations before the solver gives up.
    pub stagnation_threshold: usize,
    pub stagnation_tolerance: f64,
    pub cache_ttl_secs: u64,
    /// Upper bound for any single input's effective rate.
    pub max_input_rate: f64,
    /// Belt limit used when a request does not carry its own.
    pub belt_limit: f64,
    /// Step size is `max(1, total inventory / step_divisor)`.
    pub step_divisor: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            stagnation_threshold: 10,
            stagnation_tolerance: 1e-6,
            cache_ttl_secs: 300,
            max_input_rate: 2.0 * ExtractorTier::MAX_BASE_RATE,
            belt_limit: DEFAULT_BELT_LIMIT,
            step_divisor: 200.0,
        }
    }
}

impl PlannerConfig {
    /// Read tunables from a JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One `[[strategy]]` entry of the ranker config file.
///
/// Example:
/// ```toml
/// [[strategy]]
/// type = "momentum"
///
/// [strategy.params]
/// fast = 10
/// slow = 20
/// threshold = 0.02
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier: "momentum", "mean_reversion" or "breakout".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Disabled entries are parsed but never run.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Strategy-specific parameters; anything omitted keeps its default.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_enabled() -> bool {
    true
}

impl StrategyConfig {
    pub fn new(strategy_type: impl Into<String>) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            enabled: true,
            params: HashMap::new(),
        }
    }

    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params
            .get(key)
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
            .unwrap_or(default)
    }

    pub fn param_usize(&self, key: &str, default: usize) -> usize {
        self.params
            .get(key)
            .and_then(|v| v.as_integer())
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .unwrap_or(default)
    }
}

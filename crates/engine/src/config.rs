use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use common::{Error, Result};
use risk::{DiversificationConfig, ExitConfig, RobustnessConfig, SizingConfig};
use strategy::{RegimeConfig, StrategyConfig};

/// Ranking parameters loaded from the TOML file at `RANKER_CONFIG_PATH`.
///
/// Every field is optional in the file.
///
/// Example:
/// ```toml
/// benchmark = "SPY"
/// universe = ["AAPL", "MSFT", "NVDA"]
///
/// [regime]
/// risk_on_below = 0.012
///
/// [[strategy]]
/// type = "momentum"
///
/// [exits]
/// policy = "volatility"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RankerFileConfig {
    /// Symbol whose volatility decides the regime.
    pub benchmark: String,
    /// Symbols evaluated each cycle.
    pub universe: Vec<String>,
    /// Bars fetched per universe symbol.
    pub history_limit: usize,
    /// Bars fetched for the benchmark.
    pub benchmark_limit: usize,
    /// Symbols with fewer bars are skipped.
    pub min_history: usize,
    /// Number of recent picks the diversification filter compares against.
    pub recent_picks: usize,
    /// Signals below this confidence never reach the robustness test.
    pub min_confidence: f64,
    /// Candidates sized below this Kelly fraction are dropped.
    pub min_kelly: f64,
    pub regime: RegimeConfig,
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
    pub diversification: DiversificationConfig,
    pub robustness: RobustnessConfig,
    pub exits: ExitConfig,
    pub sizing: SizingConfig,
}

impl Default for RankerFileConfig {
    fn default() -> Self {
        Self {
            benchmark: "SPY".to_string(),
            universe: ["AAPL", "MSFT", "NVDA", "TSLA", "AMZN"]
                .into_iter()
                .map(String::from)
                .collect(),
            history_limit: 100,
            benchmark_limit: 60,
            min_history: 50,
            recent_picks: 5,
            min_confidence: 0.3,
            min_kelly: 0.01,
            regime: RegimeConfig::default(),
            strategies: Vec::new(),
            diversification: DiversificationConfig::default(),
            robustness: RobustnessConfig::default(),
            exits: ExitConfig::default(),
            sizing: SizingConfig::default(),
        }
    }
}

impl RankerFileConfig {
    /// Load from a TOML file. A missing file yields the defaults; an
    /// unreadable or malformed file exits the process.
    pub fn load(path: &str) -> Self {
        if !Path::new(path).exists() {
            warn!(path, "Ranker config not found, using defaults");
            return Self::default();
        }
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read ranker config at '{path}': {e}"));
        Self::from_toml_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse ranker config at '{path}': {e}"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

pub mod config;
pub mod indicators;
pub mod regime;
pub mod registry;
pub mod strategies;

pub use config::StrategyConfig;
pub use regime::{RegimeClassifier, RegimeConfig};
pub use registry::StrategyRegistry;
pub use strategies::{Breakout, MeanReversion, Momentum, Strategy};

use serde::{Deserialize, Serialize};

use common::{PriceSeries, RegimeState, Signal};

/// The closed set of strategies the ranker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum,
    MeanReversion,
    Breakout,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Momentum,
        StrategyKind::MeanReversion,
        StrategyKind::Breakout,
    ];

    /// Identifier persisted in `daily_pick.strategy` and used in config files.
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Momentum => "momentum",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Breakout => "breakout",
        }
    }

    /// Regimes in which this strategy is allowed to run.
    pub fn eligible_regimes(self) -> &'static [RegimeState] {
        match self {
            StrategyKind::Momentum => &[RegimeState::RiskOn, RegimeState::Neutral],
            StrategyKind::MeanReversion => &[RegimeState::RiskOff, RegimeState::Neutral],
            StrategyKind::Breakout => &[RegimeState::RiskOn],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == s)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// All strategy implementations must satisfy this trait.
pub trait SignalGenerator: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Minimum number of bars needed before a non-flat signal can be emitted.
    fn min_bars(&self) -> usize;

    /// Evaluate the full series and produce a signal for its latest bar.
    ///
    /// Below `min_bars` this returns `Signal::flat()` rather than failing.
    fn generate_signal(&self, series: &PriceSeries) -> Signal;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn is_eligible(&self, regime: RegimeState) -> bool {
        self.kind().eligible_regimes().contains(&regime)
    }
}

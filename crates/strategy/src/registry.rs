use tracing::info;

use common::{Error, RegimeState, Result};

use crate::config::StrategyConfig;
use crate::strategies::{Breakout, MeanReversion, Momentum, Strategy};
use crate::{SignalGenerator, StrategyKind};

/// Holds the active strategy instances for a ranking cycle.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Strategy>,
}

impl Default for StrategyRegistry {
    /// Every known strategy with default parameters.
    fn default() -> Self {
        Self {
            strategies: StrategyKind::ALL.into_iter().map(Strategy::default_for).collect(),
        }
    }
}

impl StrategyRegistry {
    /// Build the registry from config entries. An empty list means "all
    /// strategies with defaults". Unknown or duplicated types are rejected.
    pub fn from_config(configs: &[StrategyConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Ok(Self::default());
        }

        let mut strategies: Vec<Strategy> = Vec::new();
        for cfg in configs {
            let strategy = build_strategy(cfg)?;
            if strategies.iter().any(|s| s.kind() == strategy.kind()) {
                return Err(Error::Config(format!(
                    "strategy '{}' is configured more than once",
                    cfg.strategy_type
                )));
            }
            if !cfg.enabled {
                info!(strategy = %strategy.name(), "Strategy disabled by config");
                continue;
            }
            info!(strategy = %strategy.name(), "Registered strategy");
            strategies.push(strategy);
        }

        Ok(Self { strategies })
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Strategies allowed to run in `regime`, in registration order.
    pub fn eligible(&self, regime: RegimeState) -> impl Iterator<Item = &Strategy> {
        self.strategies.iter().filter(move |s| s.is_eligible(regime))
    }

    pub fn get(&self, kind: StrategyKind) -> Option<&Strategy> {
        self.strategies.iter().find(|s| s.kind() == kind)
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(cfg: &StrategyConfig) -> Result<Strategy> {
    let kind = StrategyKind::parse(&cfg.strategy_type).ok_or_else(|| {
        Error::Config(format!("unknown strategy type '{}'", cfg.strategy_type))
    })?;

    let strategy = match kind {
        StrategyKind::Momentum => {
            let d = Momentum::default();
            let fast = cfg.param_usize("fast", d.fast);
            let slow = cfg.param_usize("slow", d.slow);
            if fast >= slow {
                return Err(Error::Config(format!(
                    "momentum fast period ({fast}) must be less than slow period ({slow})"
                )));
            }
            Strategy::Momentum(Momentum {
                fast,
                slow,
                threshold: cfg.param_f64("threshold", d.threshold),
                confidence_scale: cfg.param_f64("confidence_scale", d.confidence_scale),
            })
        }
        StrategyKind::MeanReversion => {
            let d = MeanReversion::default();
            Strategy::MeanReversion(MeanReversion {
                recent: cfg.param_usize("recent", d.recent),
                baseline: cfg.param_usize("baseline", d.baseline),
                threshold: cfg.param_f64("threshold", d.threshold),
                confidence_divisor: cfg.param_f64("confidence_divisor", d.confidence_divisor),
            })
        }
        StrategyKind::Breakout => {
            let d = Breakout::default();
            let period = cfg.param_usize("period", d.period);
            if period < 2 {
                return Err(Error::Config("breakout period must be >= 2".into()));
            }
            Strategy::Breakout(Breakout {
                period,
                width: cfg.param_f64("width", d.width),
                threshold: cfg.param_f64("threshold", d.threshold),
            })
        }
    };
    Ok(strategy)
}

use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Direction, PriceSeries};
use strategy::indicators::{atr, sample_stdev};

use crate::round_to;

const FALLBACK_STOP_PCT: f64 = 0.02;
const FALLBACK_TARGET_PCT: f64 = 0.04;
const VOLATILITY_FLOOR: f64 = 0.02;

/// How stop and target were actually derived. May differ from the configured
/// policy when a fallback kicked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitBasis {
    Atr,
    Percentage,
    Volatility,
}

impl ExitBasis {
    pub fn label(self) -> &'static str {
        match self {
            ExitBasis::Atr => "ATR",
            ExitBasis::Percentage => "Percentage",
            ExitBasis::Volatility => "Volatility",
        }
    }
}

/// Stop-loss and profit target for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exits {
    pub stop: f64,
    pub target: f64,
    pub basis: ExitBasis,
    pub atr_used: Option<f64>,
    pub volatility_used: Option<f64>,
}

impl Exits {
    /// Fractional distance from entry to stop.
    pub fn risk_pct(&self, entry: f64) -> f64 {
        (entry - self.stop).abs() / entry
    }

    /// Fractional distance from entry to target.
    pub fn reward_pct(&self, entry: f64) -> f64 {
        (self.target - entry).abs() / entry
    }
}

/// Interchangeable exit-level policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExitPolicy {
    /// Stop and target at multiples of the latest ATR.
    Atr {
        period: usize,
        stop_multiplier: f64,
        target_multiplier: f64,
    },
    /// Fixed percentage distances from entry.
    Percentage { stop_pct: f64, target_pct: f64 },
    /// Multiples of recent daily return stdev, scaled by entry.
    Volatility {
        window: usize,
        stop_multiplier: f64,
        target_multiplier: f64,
    },
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy::Atr {
            period: 14,
            stop_multiplier: 1.0,
            target_multiplier: 2.0,
        }
    }
}

impl ExitPolicy {
    /// Compute exits for `entry` in `direction` given the symbol's history.
    /// A flat direction is treated as long.
    pub fn compute_exits(&self, entry: f64, direction: Direction, series: &PriceSeries) -> Exits {
        match *self {
            ExitPolicy::Atr {
                period,
                stop_multiplier,
                target_multiplier,
            } => match atr(series.bars(), period).filter(|v| *v > 0.0) {
                Some(value) => {
                    let (stop, target) = offsets(
                        entry,
                        direction,
                        value * stop_multiplier,
                        value * target_multiplier,
                    );
                    Exits {
                        stop,
                        target,
                        basis: ExitBasis::Atr,
                        atr_used: Some(round_to(value, 2)),
                        volatility_used: None,
                    }
                }
                None => {
                    debug!(symbol = %series.symbol(), "ATR unavailable, using percentage exits");
                    percentage(entry, direction, FALLBACK_STOP_PCT, FALLBACK_TARGET_PCT)
                }
            },
            ExitPolicy::Percentage {
                stop_pct,
                target_pct,
            } => percentage(entry, direction, stop_pct, target_pct),
            ExitPolicy::Volatility {
                window,
                stop_multiplier,
                target_multiplier,
            } => {
                let returns = series.daily_returns();
                let recent = &returns[returns.len().saturating_sub(window)..];
                let vol = match sample_stdev(recent) {
                    Some(vol) if vol.is_finite() && vol > 0.0 => vol,
                    _ => {
                        debug!(symbol = %series.symbol(), "Volatility unavailable, using floor");
                        VOLATILITY_FLOOR
                    }
                };
                let (stop, target) = offsets(
                    entry,
                    direction,
                    entry * vol * stop_multiplier,
                    entry * vol * target_multiplier,
                );
                Exits {
                    stop,
                    target,
                    basis: ExitBasis::Volatility,
                    atr_used: None,
                    volatility_used: Some(round_to(vol, 4)),
                }
            }
        }
    }
}

fn percentage(entry: f64, direction: Direction, stop_pct: f64, target_pct: f64) -> Exits {
    let (stop, target) = offsets(entry, direction, entry * stop_pct, entry * target_pct);
    Exits {
        stop,
        target,
        basis: ExitBasis::Percentage,
        atr_used: None,
        volatility_used: None,
    }
}

/// Apply absolute stop/target distances on the correct side of entry,
/// rounded to cents.
fn offsets(entry: f64, direction: Direction, stop_dist: f64, target_dist: f64) -> (f64, f64) {
    match direction {
        Direction::Short => (round_to(entry + stop_dist, 2), round_to(entry - target_dist, 2)),
        Direction::Long | Direction::Flat => {
            (round_to(entry - stop_dist, 2), round_to(entry + target_dist, 2))
        }
    }
}

/// Which policy the config file selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicyKind {
    #[default]
    Atr,
    Percentage,
    Volatility,
}

/// `[exits]` section of the ranker config. Parameters of the unselected
/// policies are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub policy: ExitPolicyKind,
    pub atr_period: usize,
    pub atr_stop_multiplier: f64,
    pub atr_target_multiplier: f64,
    pub stop_pct: f64,
    pub target_pct: f64,
    pub volatility_window: usize,
    pub volatility_stop_multiplier: f64,
    pub volatility_target_multiplier: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            policy: ExitPolicyKind::Atr,
            atr_period: 14,
            atr_stop_multiplier: 1.0,
            atr_target_multiplier: 2.0,
            stop_pct: 0.02,
            target_pct: 0.04,
            volatility_window: 20,
            volatility_stop_multiplier: 1.5,
            volatility_target_multiplier: 2.5,
        }
    }
}

impl ExitConfig {
    pub fn policy(&self) -> ExitPolicy {
        match self.policy {
            ExitPolicyKind::Atr => ExitPolicy::Atr {
                period: self.atr_period,
                stop_multiplier: self.atr_stop_multiplier,
                target_multiplier: self.atr_target_multiplier,
            },
            ExitPolicyKind::Percentage => ExitPolicy::Percentage {
                stop_pct: self.stop_pct,
                target_pct: self.target_pct,
            },
            ExitPolicyKind::Volatility => ExitPolicy::Volatility {
                window: self.volatility_window,
                stop_multiplier: self.volatility_stop_multiplier,
                target_multiplier: self.volatility_target_multiplier,
            },
        }
    }
}

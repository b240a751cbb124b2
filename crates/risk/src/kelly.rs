use serde::{Deserialize, Serialize};

use crate::round_to;

/// Full Kelly fraction, clamped to `[0, cap]` and rounded to 4 decimals.
///
/// `f* = (b·p − q) / b` with `b = payoff`, `p = win_rate`, `q = 1 − p`.
/// Returns 0 when `win_rate` is outside the open interval (0, 1) or the
/// payoff is not a positive finite number.
pub fn kelly(win_rate: f64, payoff: f64, cap: f64) -> f64 {
    if !(win_rate > 0.0 && win_rate < 1.0) {
        return 0.0;
    }
    if !(payoff > 0.0 && payoff.is_finite()) {
        return 0.0;
    }
    let loss_rate = 1.0 - win_rate;
    let fraction = (payoff * win_rate - loss_rate) / payoff;
    round_to(fraction.max(0.0).min(cap.max(0.0)), 4)
}

/// Kelly scaled by `fraction` (e.g. 0.5 for half-Kelly), rounded to 4 decimals.
pub fn fractional_kelly(win_rate: f64, payoff: f64, fraction: f64, cap: f64) -> f64 {
    round_to(kelly(win_rate, payoff, cap) * fraction, 4)
}

/// Empirical win rate and payoff ratio of a return history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffStats {
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub payoff_ratio: f64,
}

impl PayoffStats {
    const DEFAULT_WIN_RATE: f64 = 0.5;
    const DEFAULT_LEG: f64 = 0.02;

    /// Win rate is the share of strictly positive returns among all returns;
    /// flat days count as non-wins. An empty side of the distribution falls
    /// back to a 2% average move.
    pub fn from_returns(returns: &[f64]) -> Self {
        let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();

        let win_rate = if returns.is_empty() {
            Self::DEFAULT_WIN_RATE
        } else {
            wins.len() as f64 / returns.len() as f64
        };
        let avg_win = if wins.is_empty() {
            Self::DEFAULT_LEG
        } else {
            wins.iter().sum::<f64>() / wins.len() as f64
        };
        let avg_loss = if losses.is_empty() {
            Self::DEFAULT_LEG
        } else {
            (losses.iter().sum::<f64>() / losses.len() as f64).abs()
        };
        let payoff_ratio = if avg_loss > 0.0 { avg_win / avg_loss } else { 1.0 };

        Self {
            win_rate,
            avg_win,
            avg_loss,
            payoff_ratio,
        }
    }
}

/// Position sizing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Upper bound on the Kelly fraction.
    pub cap: f64,
    /// When set, size with this fraction of full Kelly instead of full Kelly.
    pub fraction: Option<f64>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            cap: 0.25,
            fraction: None,
        }
    }
}

impl SizingConfig {
    pub fn kelly_fraction(&self, stats: &PayoffStats) -> f64 {
        match self.fraction {
            Some(f) => fractional_kelly(stats.win_rate, stats.payoff_ratio, f, self.cap),
            None => kelly(stats.win_rate, stats.payoff_ratio, self.cap),
        }
    }

    /// Kelly fraction expressed as a percentage of equity, one decimal.
    pub fn size_pct(kelly_fraction: f64) -> f64 {
        round_to(kelly_fraction * 100.0, 1)
    }
}

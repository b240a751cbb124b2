use serde::{Deserialize, Serialize};

use common::{Direction, PriceSeries, Signal, SignalDetail};

use crate::indicators::sma;
use crate::{SignalGenerator, StrategyKind};

/// Fast-over-slow moving average momentum.
///
/// `score = (SMA(fast) - SMA(slow)) / SMA(slow)`; long above `threshold`,
/// short below `-threshold`. Confidence is `min(1, |score| * confidence_scale)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Momentum {
    pub fast: usize,
    pub slow: usize,
    pub threshold: f64,
    pub confidence_scale: f64,
}

impl Default for Momentum {
    fn default() -> Self {
        Self {
            fast: 10,
            slow: 20,
            threshold: 0.02,
            confidence_scale: 10.0,
        }
    }
}

impl SignalGenerator for Momentum {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn min_bars(&self) -> usize {
        self.slow.max(20)
    }

    fn generate_signal(&self, series: &PriceSeries) -> Signal {
        if series.len() < self.min_bars() {
            return Signal::flat();
        }
        let closes = series.closes();
        let (Some(fast), Some(slow)) = (sma(&closes, self.fast), sma(&closes, self.slow)) else {
            return Signal::flat();
        };
        let score = (fast - slow) / slow;
        if !score.is_finite() {
            return Signal::flat();
        }

        let direction = if score > self.threshold {
            Direction::Long
        } else if score < -self.threshold {
            Direction::Short
        } else {
            Direction::Flat
        };

        Signal {
            direction,
            confidence: (score.abs() * self.confidence_scale).min(1.0),
            detail: SignalDetail::Momentum { score },
        }
    }
}

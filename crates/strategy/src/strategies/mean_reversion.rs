use serde::{Deserialize, Serialize};

use common::{Direction, PriceSeries, Signal, SignalDetail};

use super::tail;
use crate::indicators::{mean, sample_stdev, simple_returns};
use crate::{SignalGenerator, StrategyKind};

/// Contrarian signal on short-term return deviation.
///
/// `deviation = (mean(last recent returns) - mean(last baseline returns)) / stdev(all returns)`.
/// A stretched upside (`deviation > threshold`) is shorted, a stretched
/// downside is bought.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanReversion {
    pub recent: usize,
    pub baseline: usize,
    pub threshold: f64,
    pub confidence_divisor: f64,
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self {
            recent: 5,
            baseline: 20,
            threshold: 1.0,
            confidence_divisor: 2.0,
        }
    }
}

impl MeanReversion {
    /// Deviation of recent returns from the baseline, in units of return stdev.
    pub fn deviation(&self, series: &PriceSeries) -> Option<f64> {
        let returns = simple_returns(&series.closes());
        let recent = mean(tail(&returns, self.recent))?;
        let baseline = mean(tail(&returns, self.baseline))?;
        let stdev = sample_stdev(&returns)?;
        if stdev <= 0.0 {
            return None;
        }
        let deviation = (recent - baseline) / stdev;
        deviation.is_finite().then_some(deviation)
    }
}

impl SignalGenerator for MeanReversion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn min_bars(&self) -> usize {
        self.baseline.max(20)
    }

    fn generate_signal(&self, series: &PriceSeries) -> Signal {
        if series.len() < self.min_bars() {
            return Signal::flat();
        }
        let Some(deviation) = self.deviation(series) else {
            return Signal::flat();
        };

        let direction = if deviation > self.threshold {
            Direction::Short
        } else if deviation < -self.threshold {
            Direction::Long
        } else {
            Direction::Flat
        };

        Signal {
            direction,
            confidence: (deviation.abs() / self.confidence_divisor).min(1.0),
            detail: SignalDetail::MeanReversion { deviation },
        }
    }
}

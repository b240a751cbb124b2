use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{PriceSeries, RegimeState};

use crate::indicators::historical_volatility;

/// Volatility thresholds separating the three regimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Trailing log-return window for the volatility estimate.
    pub window: usize,
    /// Volatility strictly below this is risk-on.
    pub risk_on_below: f64,
    /// Volatility strictly above this is risk-off.
    pub risk_off_above: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            window: 30,
            risk_on_below: 0.012,
            risk_off_above: 0.02,
        }
    }
}

/// Labels the market state from a benchmark series. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Map an annualized volatility onto a regime. Both thresholds are
    /// inclusive on the neutral side; a non-finite input is neutral.
    pub fn classify_volatility(&self, volatility: f64) -> RegimeState {
        if !volatility.is_finite() {
            RegimeState::Neutral
        } else if volatility < self.config.risk_on_below {
            RegimeState::RiskOn
        } else if volatility <= self.config.risk_off_above {
            RegimeState::Neutral
        } else {
            RegimeState::RiskOff
        }
    }

    /// Classify the benchmark. Short history or a failed volatility
    /// computation falls back to `Neutral`.
    pub fn classify(&self, benchmark: &PriceSeries) -> RegimeState {
        if benchmark.len() < self.config.window {
            debug!(bars = benchmark.len(), "Benchmark history too short, regime neutral");
            return RegimeState::Neutral;
        }
        match historical_volatility(&benchmark.closes(), self.config.window) {
            Some(vol) => {
                let regime = self.classify_volatility(vol);
                debug!(volatility = vol, regime = %regime, "Benchmark regime classified");
                regime
            }
            None => {
                debug!("Benchmark volatility unavailable, regime neutral");
                RegimeState::Neutral
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::PriceBar;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new("SPY", bars).unwrap()
    }

    #[test]
    fn volatility_boundaries() {
        let c = RegimeClassifier::default();
        assert_eq!(c.classify_volatility(0.01), RegimeState::RiskOn);
        assert_eq!(c.classify_volatility(0.012), RegimeState::Neutral);
        assert_eq!(c.classify_volatility(0.02), RegimeState::Neutral);
        assert_eq!(c.classify_volatility(0.025), RegimeState::RiskOff);
        assert_eq!(c.classify_volatility(f64::NAN), RegimeState::Neutral);
    }

    #[test]
    fn short_history_is_neutral() {
        let c = RegimeClassifier::default();
        assert_eq!(c.classify(&series(&[100.0; 29])), RegimeState::Neutral);
        // 30 bars give only 29 returns: still not enough for the window
        assert_eq!(c.classify(&series(&[100.0; 30])), RegimeState::Neutral);
    }

    #[test]
    fn calm_benchmark_is_risk_on() {
        let c = RegimeClassifier::default();
        assert_eq!(c.classify(&series(&[100.0; 60])), RegimeState::RiskOn);
    }

    #[test]
    fn wild_benchmark_is_risk_off() {
        let closes: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 100.0 } else { 103.0 })
            .collect();
        let c = RegimeClassifier::default();
        assert_eq!(c.classify(&series(&closes)), RegimeState::RiskOff);
    }
}

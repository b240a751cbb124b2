use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use common::PriceSeries;

/// Pearson correlation of daily returns over the last `window` dates the two
/// series have in common.
///
/// Returns 0 when fewer than `window` common dates exist, when either side
/// has no variance, or when the result is not finite.
pub fn correlation(a: &PriceSeries, b: &PriceSeries, window: usize) -> f64 {
    let b_returns: HashMap<_, _> = b.dated_returns().into_iter().collect();
    let aligned: Vec<(f64, f64)> = a
        .dated_returns()
        .into_iter()
        .filter_map(|(date, ra)| b_returns.get(&date).map(|rb| (ra, *rb)))
        .collect();

    if window < 2 || aligned.len() < window {
        return 0.0;
    }
    let recent = &aligned[aligned.len() - window..];
    let (xs, ys): (Vec<f64>, Vec<f64>) = recent.iter().copied().unzip();
    let value = pearson(&xs, &ys);
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }

    let x_mean: f64 = x.iter().sum::<f64>() / n as f64;
    let y_mean: f64 = y.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for i in 0..n {
        let x_diff = x[i] - x_mean;
        let y_diff = y[i] - y_mean;
        cov += x_diff * y_diff;
        var_x += x_diff * x_diff;
        var_y += y_diff * y_diff;
    }

    if var_x < 1e-16 || var_y < 1e-16 {
        return 0.0;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Diversification parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversificationConfig {
    /// Number of common return dates the correlation is measured over.
    pub window: usize,
    /// Candidates correlated strictly above this with a recent pick are rejected.
    pub max_correlation: f64,
    /// How many distinct recent picks to compare against.
    pub lookback: usize,
}

impl Default for DiversificationConfig {
    fn default() -> Self {
        Self {
            window: 30,
            max_correlation: 0.75,
            lookback: 5,
        }
    }
}

/// Outcome of the diversification check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Diversification {
    Accepted,
    Rejected { against: String, correlation: f64 },
}

/// Rejects symbols that move too closely with recently picked ones.
#[derive(Debug, Clone, Default)]
pub struct DiversificationFilter {
    config: DiversificationConfig,
}

impl DiversificationFilter {
    pub fn new(config: DiversificationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiversificationConfig {
        &self.config
    }

    /// The threshold is exclusive: a correlation equal to the limit passes.
    pub fn exceeds(&self, correlation: f64) -> bool {
        correlation > self.config.max_correlation
    }

    /// Compare `candidate` against the recent-pick snapshot, skipping its own
    /// symbol. The first offending pick is reported.
    pub fn check(&self, candidate: &PriceSeries, recent: &[PriceSeries]) -> Diversification {
        for pick in recent.iter().take(self.config.lookback) {
            if pick.symbol() == candidate.symbol() {
                continue;
            }
            let corr = correlation(candidate, pick, self.config.window);
            debug!(
                symbol = %candidate.symbol(),
                against = %pick.symbol(),
                correlation = corr,
                "Correlation with recent pick"
            );
            if self.exceeds(corr) {
                return Diversification::Rejected {
                    against: pick.symbol().to_string(),
                    correlation: corr,
                };
            }
        }
        Diversification::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::PriceBar;

    fn series_from_returns(symbol: &str, offset_days: i64, returns: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset_days);
        let mut close = 100.0;
        let mut bars = vec![PriceBar {
            date: start,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }];
        for (i, r) in returns.iter().enumerate() {
            close *= 1.0 + r;
            bars.push(PriceBar {
                date: start + chrono::Duration::days(i as i64 + 1),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            });
        }
        PriceSeries::new(symbol, bars).unwrap()
    }

    fn wiggle(n: usize, phase: usize) -> Vec<f64> {
        (0..n).map(|i| ((i + phase) as f64 * 0.7).sin() * 0.01).collect()
    }

    #[test]
    fn threshold_is_exclusive() {
        let f = DiversificationFilter::default();
        assert!(f.exceeds(0.76));
        assert!(!f.exceeds(0.75));
    }

    #[test]
    fn identical_moves_correlate_fully() {
        let a = series_from_returns("A", 0, &wiggle(40, 0));
        let b = series_from_returns("B", 0, &wiggle(40, 0));
        assert!((correlation(&a, &b, 30) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn opposite_moves_correlate_negatively() {
        let r = wiggle(40, 0);
        let neg: Vec<f64> = r.iter().map(|v| -v).collect();
        let a = series_from_returns("A", 0, &r);
        let b = series_from_returns("B", 0, &neg);
        assert!(correlation(&a, &b, 30) < -0.99);
    }

    #[test]
    fn too_few_common_dates_is_zero() {
        let a = series_from_returns("A", 0, &wiggle(40, 0));
        // shifted by 20 days: only 20 common return dates
        let b = series_from_returns("B", 20, &wiggle(40, 0));
        assert_eq!(correlation(&a, &b, 30), 0.0);
    }

    #[test]
    fn flat_series_has_zero_correlation() {
        let a = series_from_returns("A", 0, &wiggle(40, 0));
        let b = series_from_returns("B", 0, &[0.0; 40]);
        assert_eq!(correlation(&a, &b, 30), 0.0);
    }

    #[test]
    fn check_rejects_correlated_and_skips_self() {
        let filter = DiversificationFilter::default();
        let candidate = series_from_returns("A", 0, &wiggle(40, 0));
        let twin = series_from_returns("B", 0, &wiggle(40, 0));
        let own = series_from_returns("A", 0, &wiggle(40, 0));

        assert_eq!(filter.check(&candidate, &[own]), Diversification::Accepted);
        match filter.check(&candidate, &[twin]) {
            Diversification::Rejected { against, correlation } => {
                assert_eq!(against, "B");
                assert!(correlation > 0.99);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn uncorrelated_history_is_accepted() {
        let filter = DiversificationFilter::default();
        let candidate = series_from_returns("A", 0, &wiggle(40, 0));
        let other = series_from_returns("C", 0, &wiggle(40, 2));
        // phase-shifted sine: correlation cos(1.4) ~ 0.17
        assert_eq!(filter.check(&candidate, &[other]), Diversification::Accepted);
    }
}

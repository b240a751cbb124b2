use super::stats::{log_returns, sample_stdev};
use super::TRADING_DAYS;

/// Annualized historical volatility: sample stdev of the trailing `window`
/// log returns, scaled by sqrt(252).
///
/// Needs `window + 1` closes. Returns `None` on short input or a non-finite
/// result (e.g. a zero or negative close).
pub fn historical_volatility(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 || closes.len() < window + 1 {
        return None;
    }
    let returns = log_returns(&closes[closes.len() - window - 1..]);
    let vol = sample_stdev(&returns)? * TRADING_DAYS.sqrt();
    vol.is_finite().then_some(vol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_prices_have_zero_volatility() {
        assert_eq!(historical_volatility(&[100.0; 40], 30), Some(0.0));
    }

    #[test]
    fn needs_window_plus_one_closes() {
        assert!(historical_volatility(&[100.0; 30], 30).is_none());
        assert!(historical_volatility(&[100.0; 31], 30).is_some());
    }

    #[test]
    fn zero_close_is_not_finite() {
        let mut closes = vec![100.0; 40];
        closes[35] = 0.0;
        assert!(historical_volatility(&closes, 30).is_none());
    }

    #[test]
    fn alternating_returns_annualize() {
        // log returns alternate +a / -a, so the sample stdev is about a
        let a: f64 = 0.01;
        let mut closes = vec![100.0];
        for i in 0..30 {
            let last = *closes.last().unwrap();
            closes.push(last * if i % 2 == 0 { a.exp() } else { (-a).exp() });
        }
        let vol = historical_volatility(&closes, 30).unwrap();
        let expected = a * (30.0f64 / 29.0).sqrt() * 252f64.sqrt();
        assert!((vol - expected).abs() < 1e-9, "got {vol}, expected {expected}");
    }
}

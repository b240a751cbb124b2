use super::stats::{sample_stdev, sma};

/// Bollinger bands around a simple moving average of closes.
#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    pub period: usize,
    pub width: f64,
}

/// Band values at the latest bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    /// Sample standard deviation of the window.
    pub stdev: f64,
}

impl BollingerIndicator {
    pub fn new(period: usize, width: f64) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        Self { period, width }
    }

    /// Compute bands from close prices (oldest first).
    /// Returns `None` if there are fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<BollingerBands> {
        let middle = sma(closes, self.period)?;
        let stdev = sample_stdev(&closes[closes.len() - self.period..])?;
        Some(BollingerBands {
            middle,
            upper: middle + self.width * stdev,
            lower: middle - self.width * stdev,
            stdev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_collapse_on_flat_prices() {
        let b = BollingerIndicator::new(20, 2.0).compute(&[10.0; 25]).unwrap();
        assert_eq!(b.stdev, 0.0);
        assert_eq!(b.upper, b.lower);
    }

    #[test]
    fn bands_are_symmetric_around_middle() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 4) as f64).collect();
        let b = BollingerIndicator::new(20, 2.0).compute(&closes).unwrap();
        assert!(((b.upper - b.middle) - (b.middle - b.lower)).abs() < 1e-12);
        assert!((b.upper - b.middle - 2.0 * b.stdev).abs() < 1e-12);
    }

    #[test]
    fn none_with_short_history() {
        assert!(BollingerIndicator::new(20, 2.0).compute(&[1.0; 19]).is_none());
    }
}

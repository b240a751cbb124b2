use serde::{Deserialize, Serialize};

use common::{BreakoutBand, Direction, PriceSeries, Signal, SignalDetail};

use crate::indicators::BollingerIndicator;
use crate::{SignalGenerator, StrategyKind};

/// Bollinger band breakout. The break distance is measured in band stdevs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakout {
    pub period: usize,
    pub width: f64,
    pub threshold: f64,
}

impl Default for Breakout {
    fn default() -> Self {
        Self {
            period: 20,
            width: 2.0,
            threshold: 0.1,
        }
    }
}

impl SignalGenerator for Breakout {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Breakout
    }

    fn min_bars(&self) -> usize {
        self.period.max(20)
    }

    fn generate_signal(&self, series: &PriceSeries) -> Signal {
        if series.len() < self.min_bars() {
            return Signal::flat();
        }
        let closes = series.closes();
        let Some(bands) = BollingerIndicator::new(self.period, self.width).compute(&closes) else {
            return Signal::flat();
        };
        if bands.stdev <= 0.0 || !bands.stdev.is_finite() {
            return Signal::flat();
        }
        let price = closes[closes.len() - 1];
        let upper_break = (price - bands.upper) / bands.stdev;
        let lower_break = (bands.lower - price) / bands.stdev;

        if upper_break > self.threshold {
            Signal {
                direction: Direction::Long,
                confidence: upper_break.min(1.0),
                detail: SignalDetail::Breakout { band: BreakoutBand::Upper },
            }
        } else if lower_break > self.threshold {
            Signal {
                direction: Direction::Short,
                confidence: lower_break.min(1.0),
                detail: SignalDetail::Breakout { band: BreakoutBand::Lower },
            }
        } else {
            Signal {
                direction: Direction::Flat,
                confidence: 0.0,
                detail: SignalDetail::Breakout { band: BreakoutBand::None },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::fixtures::series;

    fn range_then(last: f64) -> Vec<f64> {
        let mut closes: Vec<f64> = (0..29).map(|i| 100.0 + (i % 3) as f64).collect();
        closes.push(last);
        closes
    }

    #[test]
    fn spike_above_band_is_long() {
        let sig = Breakout::default().generate_signal(&series(&range_then(110.0)));
        assert_eq!(sig.direction, Direction::Long);
        assert_eq!(sig.detail, SignalDetail::Breakout { band: BreakoutBand::Upper });
        assert!(sig.confidence > 0.0 && sig.confidence <= 1.0);
    }

    #[test]
    fn drop_below_band_is_short() {
        let sig = Breakout::default().generate_signal(&series(&range_then(90.0)));
        assert_eq!(sig.direction, Direction::Short);
        assert_eq!(sig.detail, SignalDetail::Breakout { band: BreakoutBand::Lower });
    }

    #[test]
    fn inside_bands_is_flat() {
        let sig = Breakout::default().generate_signal(&series(&range_then(101.0)));
        assert_eq!(sig.direction, Direction::Flat);
        assert_eq!(sig.confidence, 0.0);
    }

    #[test]
    fn zero_width_bands_are_flat() {
        let sig = Breakout::default().generate_signal(&series(&[100.0; 25]));
        assert_eq!(sig, Signal::flat());
    }
}

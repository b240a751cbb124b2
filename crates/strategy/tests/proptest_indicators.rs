use chrono::NaiveDate;
use common::{PriceBar, PriceSeries};
use proptest::prelude::*;
use strategy::indicators::atr;
use strategy::{SignalGenerator, StrategyRegistry};

fn bars_from(raw: &[(f64, f64, f64)]) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    raw.iter()
        .enumerate()
        .map(|(i, &(close, up, down))| PriceBar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close * (1.0 + up),
            low: close * (1.0 - down),
            close,
            volume: 1.0,
        })
        .collect()
}

proptest! {
    /// ATR is a mean of non-negative true ranges, so it can never go negative.
    #[test]
    fn atr_is_never_negative(
        raw in prop::collection::vec((1.0f64..10_000.0, 0.0f64..0.2, 0.0f64..0.2), 14..120),
    ) {
        let bars = bars_from(&raw);
        let value = atr(&bars, 14).unwrap();
        prop_assert!(value >= 0.0, "ATR was {value}");
    }

    /// Every strategy keeps confidence within [0, 1] on arbitrary positive prices.
    #[test]
    fn signal_confidence_stays_in_unit_interval(
        raw in prop::collection::vec((0.01f64..100_000.0, 0.0f64..0.1, 0.0f64..0.1), 0..80),
    ) {
        let series = PriceSeries::new("PROP", bars_from(&raw)).unwrap();
        for strategy in StrategyRegistry::default().strategies() {
            let sig = strategy.generate_signal(&series);
            prop_assert!((0.0..=1.0).contains(&sig.confidence),
                "{} confidence {}", strategy.name(), sig.confidence);
        }
    }
}

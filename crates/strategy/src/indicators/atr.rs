use common::PriceBar;

/// True range per bar, oldest first.
///
/// `TR = max(high - low, |high - prev_close|, |low - prev_close|)`. The first
/// bar has no previous close, so its true range is just `high - low`.
pub fn true_ranges(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                Some(prev_close) => hl
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs()),
                None => hl,
            }
        })
        .collect()
}

/// Average True Range at the latest bar: the simple mean of the last `period`
/// true ranges. Returns `None` until `period` bars are available.
pub fn atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let trs = true_ranges(bars);
    let window = &trs[trs.len() - period..];
    let value = window.iter().sum::<f64>() / period as f64;
    value.is_finite().then_some(value)
}

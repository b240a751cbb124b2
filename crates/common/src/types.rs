use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One daily OHLCV bar as stored in `price_history`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered price history for one symbol.
///
/// Bars are strictly ascending by date with no duplicates. The series is a
/// read-only snapshot for the duration of a ranking cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, sorting bars by date. Duplicate dates are rejected.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Result<Self> {
        let symbol = symbol.into();
        bars.sort_by_key(|b| b.date);
        if let Some(w) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(Error::InvalidSeries(format!(
                "{symbol} has duplicate bars for {}",
                w[0].date
            )));
        }
        Ok(Self { symbol, bars })
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Simple close-to-close returns, oldest first. Length is `len() - 1`.
    pub fn daily_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| w[1].close / w[0].close - 1.0)
            .collect()
    }

    /// Close-to-close returns keyed by the date of the later bar.
    pub fn dated_returns(&self) -> Vec<(NaiveDate, f64)> {
        self.bars
            .windows(2)
            .map(|w| (w[1].date, w[1].close / w[0].close - 1.0))
            .collect()
    }

    /// A copy of this series with replaced bars (same symbol, same dates).
    /// Used by stress simulations that perturb prices in place.
    pub fn with_bars(&self, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bars,
        }
    }

    /// The first `n` bars as a new series.
    pub fn prefix(&self, n: usize) -> Self {
        self.with_bars(self.bars[..n.min(self.bars.len())].to_vec())
    }
}

/// Trade direction emitted by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    #[default]
    Flat,
}

impl Direction {
    /// +1 for long, -1 for short, 0 for flat.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Flat => 0.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
            Direction::Flat => write!(f, "flat"),
        }
    }
}

/// Which Bollinger band a breakout crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakoutBand {
    Upper,
    Lower,
    None,
}

impl std::fmt::Display for BreakoutBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakoutBand::Upper => write!(f, "upper"),
            BreakoutBand::Lower => write!(f, "lower"),
            BreakoutBand::None => write!(f, "none"),
        }
    }
}

/// Strategy-specific score that accompanies a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetail {
    Momentum { score: f64 },
    MeanReversion { deviation: f64 },
    Breakout { band: BreakoutBand },
    #[default]
    None,
}

/// Output of one strategy for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub detail: SignalDetail,
}

impl Signal {
    pub fn flat() -> Self {
        Self {
            direction: Direction::Flat,
            confidence: 0.0,
            detail: SignalDetail::None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::Flat
    }
}

/// Coarse market volatility state, computed once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegimeState {
    RiskOn,
    #[default]
    Neutral,
    RiskOff,
}

impl RegimeState {
    /// Human-readable label used in reason bullets ("risk on").
    pub fn label(self) -> &'static str {
        match self {
            RegimeState::RiskOn => "risk on",
            RegimeState::Neutral => "neutral",
            RegimeState::RiskOff => "risk off",
        }
    }
}

impl std::fmt::Display for RegimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegimeState::RiskOn => write!(f, "risk_on"),
            RegimeState::Neutral => write!(f, "neutral"),
            RegimeState::RiskOff => write!(f, "risk_off"),
        }
    }
}

/// Top-confidence chart pattern reported by the external pattern scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignal {
    pub pattern: String,
    pub confidence: f64,
}

/// A scored trade idea for one (symbol, strategy) pair. Lives for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub strategy: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub kelly_fraction: f64,
    pub size_pct: f64,
    pub win_rate: f64,
    pub payoff_ratio: f64,
    pub signal_confidence: f64,
    pub expected_return: f64,
    pub sharpe_ratio: f64,
    pub composite_score: f64,
    /// At most five, in priority order.
    pub reason_bullets: Vec<String>,
}

/// The persisted recommendation for a date. At most one row per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPick {
    pub date: NaiveDate,
    pub symbol: String,
    pub strategy: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub expected_return: f64,
    pub sharpe_ratio: f64,
    pub kelly_fraction: f64,
    pub size_pct: f64,
    pub composite_score: f64,
    pub reason_bullets: Vec<String>,
}

impl DailyPick {
    pub fn from_candidate(date: NaiveDate, c: &Candidate) -> Self {
        Self {
            date,
            symbol: c.symbol.clone(),
            strategy: c.strategy.clone(),
            direction: c.direction,
            entry: c.entry,
            stop: c.stop,
            target: c.target,
            expected_return: c.expected_return,
            sharpe_ratio: c.sharpe_ratio,
            kelly_fraction: c.kelly_fraction,
            size_pct: c.size_pct,
            composite_score: c.composite_score,
            reason_bullets: c.reason_bullets.clone(),
        }
    }
}

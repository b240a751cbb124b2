use std::cmp::Ordering;

use common::{BreakoutBand, Candidate, PatternSignal, RegimeState, SignalDetail};
use risk::ExitBasis;
use strategy::indicators::{sample_stdev, TRADING_DAYS};

const MAX_BULLETS: usize = 5;
const PATTERN_CONFIDENCE_FLOOR: f64 = 0.7;

/// Probability-weighted distance to target minus distance to stop.
pub fn expected_return(win_rate: f64, reward_pct: f64, risk_pct: f64) -> f64 {
    win_rate * reward_pct - (1.0 - win_rate) * risk_pct
}

/// Expected return over annualized volatility of daily returns. Zero when
/// the returns have no dispersion.
pub fn sharpe_ratio(expected_return: f64, daily_returns: &[f64]) -> f64 {
    match sample_stdev(daily_returns) {
        Some(sd) if sd > 0.0 && sd.is_finite() => expected_return / (sd * TRADING_DAYS.sqrt()),
        _ => 0.0,
    }
}

pub fn composite_score(sharpe_ratio: f64, kelly_fraction: f64, signal_confidence: f64) -> f64 {
    sharpe_ratio * kelly_fraction * signal_confidence
}

/// Inputs for the reason bullets of one candidate.
#[derive(Debug, Clone)]
pub struct ReasonInputs<'a> {
    pub pattern: Option<&'a PatternSignal>,
    pub size_pct: f64,
    pub exit_basis: ExitBasis,
    pub reward_risk: f64,
    pub regime: RegimeState,
    pub detail: SignalDetail,
}

/// Human-readable justification, highest priority first, at most five.
pub fn reason_bullets(inputs: &ReasonInputs<'_>) -> Vec<String> {
    let mut bullets = Vec::with_capacity(MAX_BULLETS + 1);

    if let Some(p) = inputs.pattern.filter(|p| p.confidence > PATTERN_CONFIDENCE_FLOOR) {
        bullets.push(format!(
            "High-confidence {} pattern ({:.2})",
            p.pattern.replace('_', " "),
            p.confidence
        ));
    }
    bullets.push(format!("Kelly sizing: {}% of equity", inputs.size_pct));
    bullets.push(format!(
        "{}-based {:.1}:1 R/R ratio",
        inputs.exit_basis.label(),
        inputs.reward_risk
    ));
    bullets.push(format!("Market in {} regime", inputs.regime.label()));
    // every candidate reaching here already passed the diversification filter
    bullets.push("Low correlation with recent picks".to_string());
    if let Some(note) = strategy_note(&inputs.detail) {
        bullets.push(note);
    }

    bullets.truncate(MAX_BULLETS);
    bullets
}

fn strategy_note(detail: &SignalDetail) -> Option<String> {
    match detail {
        SignalDetail::Momentum { score } => Some(format!("Strong momentum signal ({score:.3})")),
        SignalDetail::MeanReversion { deviation } => {
            Some(format!("Mean reversion opportunity ({deviation:.2} std dev)"))
        }
        SignalDetail::Breakout { band } if *band != BreakoutBand::None => {
            Some(format!("Bollinger Band {band} breakout"))
        }
        _ => None,
    }
}

/// Highest composite score wins; ties go to the lower symbol, then the lower
/// strategy name.
pub fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| a.symbol.cmp(&b.symbol))
        .then_with(|| a.strategy.cmp(&b.strategy))
}

pub fn select(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().min_by(|a, b| rank(a, b))
}

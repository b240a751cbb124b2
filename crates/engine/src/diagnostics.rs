use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::{DailyPick, RegimeState};
use risk::RobustnessFailure;
use strategy::StrategyKind;

/// What happened to one symbol, or one (symbol, strategy) pair, in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    FetchFailed { error: String },
    InsufficientHistory { needed: usize, got: usize },
    InvalidPrice { close: f64 },
    Correlated { with: String, correlation: f64 },
    NoSignal,
    WeakSignal { confidence: f64 },
    RobustnessFailed { failure: RobustnessFailure },
    SizeTooSmall { kelly_fraction: f64 },
    DegenerateExits { stop: f64 },
    Accepted { composite_score: f64 },
    TaskFailed { error: String },
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::FetchFailed { error } => write!(f, "price fetch failed: {error}"),
            Outcome::InsufficientHistory { needed, got } => {
                write!(f, "insufficient history: need {needed} bars, got {got}")
            }
            Outcome::InvalidPrice { close } => write!(f, "unusable last close {close}"),
            Outcome::Correlated { with, correlation } => {
                write!(f, "correlated with recent pick {with} ({correlation:.2})")
            }
            Outcome::NoSignal => write!(f, "no signal"),
            Outcome::WeakSignal { confidence } => write!(f, "weak signal ({confidence:.2})"),
            Outcome::RobustnessFailed { failure } => write!(f, "robustness failed: {failure}"),
            Outcome::SizeTooSmall { kelly_fraction } => {
                write!(f, "kelly fraction {kelly_fraction:.4} below minimum")
            }
            Outcome::DegenerateExits { stop } => write!(f, "degenerate exits (stop {stop})"),
            Outcome::Accepted { composite_score } => {
                write!(f, "accepted (score {composite_score:.6})")
            }
            Outcome::TaskFailed { error } => write!(f, "evaluation task failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub symbol: String,
    /// `None` when the outcome applies to the whole symbol.
    pub strategy: Option<StrategyKind>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Diagnostic {
    pub fn symbol(symbol: &str, outcome: Outcome) -> Self {
        Self {
            symbol: symbol.to_string(),
            strategy: None,
            outcome,
        }
    }

    pub fn strategy(symbol: &str, strategy: StrategyKind, outcome: Outcome) -> Self {
        Self {
            symbol: symbol.to_string(),
            strategy: Some(strategy),
            outcome,
        }
    }

    /// Emit the diagnostic as a tracing event at a level matching its severity.
    pub fn log(&self) {
        let strategy = self.strategy.map(|k| k.name()).unwrap_or("-");
        match &self.outcome {
            Outcome::FetchFailed { .. } | Outcome::TaskFailed { .. } => {
                warn!(symbol = %self.symbol, strategy, "{}", self.outcome)
            }
            Outcome::Accepted { composite_score } => info!(
                symbol = %self.symbol,
                strategy,
                score = composite_score,
                "Candidate accepted"
            ),
            _ => debug!(symbol = %self.symbol, strategy, "{}", self.outcome),
        }
    }
}

/// Result of one ranking cycle, printed as JSON by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub seed: u64,
    pub regime: RegimeState,
    pub candidates: usize,
    pub pick: Option<DailyPick>,
    pub persisted: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl CycleReport {
    pub fn accepted(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.outcome, Outcome::Accepted { .. }))
    }
}

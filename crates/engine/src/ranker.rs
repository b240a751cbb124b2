use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::{
    Candidate, DailyPick, MarketData, PatternSignal, PickSink, PriceSeries, RegimeState, Result,
    SignalDetail,
};
use risk::{
    Diversification, DiversificationFilter, ExitBasis, ExitPolicy, PayoffStats,
    RobustnessTester, SeedHierarchy, SizingConfig,
};
use strategy::{RegimeClassifier, SignalGenerator, Strategy, StrategyRegistry};

use crate::config::RankerFileConfig;
use crate::diagnostics::{CycleReport, Diagnostic, Outcome};
use crate::scoring::{self, ReasonInputs};

/// Runs one ranking cycle over the configured universe and persists the best
/// candidate.
pub struct Ranker {
    config: RankerFileConfig,
    registry: StrategyRegistry,
    market: Arc<dyn MarketData>,
    sink: Arc<dyn PickSink>,
    workers: usize,
    seed: u64,
    dry_run: bool,
}

impl Ranker {
    /// Fails only when the `[[strategy]]` entries are invalid.
    pub fn new(
        config: RankerFileConfig,
        market: Arc<dyn MarketData>,
        sink: Arc<dyn PickSink>,
    ) -> Result<Self> {
        let registry = StrategyRegistry::from_config(&config.strategies)?;
        Ok(Self {
            config,
            registry,
            market,
            sink,
            workers: 8,
            seed: 0,
            dry_run: false,
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Master seed for the robustness Monte Carlo.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rank without writing the pick.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run_cycle(&self, date: NaiveDate) -> Result<CycleReport> {
        let run_id = Uuid::new_v4();
        info!(%run_id, %date, symbols = self.config.universe.len(), "Ranking cycle started");

        let regime = self.classify_regime().await;
        let recent = self.recent_snapshot().await;

        let evaluator = Arc::new(Evaluator {
            date,
            regime,
            recent,
            strategies: self.registry.eligible(regime).cloned().collect(),
            min_history: self.config.min_history,
            min_confidence: self.config.min_confidence,
            min_kelly: self.config.min_kelly,
            diversification: DiversificationFilter::new(self.config.diversification.clone()),
            robustness: RobustnessTester::new(self.config.robustness.clone()),
            exits: self.config.exits.policy(),
            sizing: self.config.sizing.clone(),
            seeds: SeedHierarchy::new(self.seed),
        });
        info!(
            %regime,
            strategies = evaluator.strategies.len(),
            recent_picks = evaluator.recent.len(),
            "Cycle context ready"
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(self.config.universe.len());
        for symbol in &self.config.universe {
            let label = symbol.clone();
            let symbol = symbol.clone();
            let market = self.market.clone();
            let evaluator = evaluator.clone();
            let semaphore = semaphore.clone();
            let limit = self.config.history_limit;

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| e.to_string())?;
                let series = match market.price_series(&symbol, limit).await {
                    Ok(series) => series,
                    Err(e) => {
                        return Ok(Evaluation::skipped(Diagnostic::symbol(
                            &symbol,
                            Outcome::FetchFailed {
                                error: e.to_string(),
                            },
                        )))
                    }
                };
                tokio::task::spawn_blocking(move || evaluator.evaluate(&series))
                    .await
                    .map_err(|e| e.to_string())
            });
            handles.push((label, handle));
        }

        // Joined in universe order so diagnostics and candidates are stable.
        let mut drafts = Vec::new();
        let mut diagnostics = Vec::new();
        for (symbol, handle) in handles {
            let result = match handle.await {
                Ok(inner) => inner,
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(evaluation) => {
                    drafts.extend(evaluation.drafts);
                    diagnostics.extend(evaluation.diagnostics);
                }
                Err(error) => {
                    let diag = Diagnostic::symbol(&symbol, Outcome::TaskFailed { error });
                    diag.log();
                    diagnostics.push(diag);
                }
            }
        }

        let candidates = self.finalize(drafts, &evaluator, date).await;
        let pick = scoring::select(&candidates).map(|c| DailyPick::from_candidate(date, c));

        let mut persisted = false;
        match &pick {
            Some(pick) if !self.dry_run => {
                self.sink.upsert_daily_pick(pick).await?;
                persisted = true;
            }
            Some(pick) => {
                info!(symbol = %pick.symbol, strategy = %pick.strategy, "Dry run, pick not persisted")
            }
            None => info!(%date, "No candidates survived, no pick today"),
        }

        if let Some(pick) = &pick {
            info!(
                %date,
                symbol = %pick.symbol,
                strategy = %pick.strategy,
                direction = %pick.direction,
                score = pick.composite_score,
                "Daily pick selected"
            );
        }

        Ok(CycleReport {
            run_id,
            date,
            seed: self.seed,
            regime,
            candidates: candidates.len(),
            pick,
            persisted,
            diagnostics,
        })
    }

    async fn classify_regime(&self) -> RegimeState {
        let classifier = RegimeClassifier::new(self.config.regime.clone());
        match self
            .market
            .price_series(&self.config.benchmark, self.config.benchmark_limit)
            .await
        {
            Ok(series) => classifier.classify(&series),
            Err(e) => {
                warn!(benchmark = %self.config.benchmark, error = %e, "Benchmark fetch failed, regime neutral");
                RegimeState::Neutral
            }
        }
    }

    /// Recent pick symbols and their histories, fetched once per cycle.
    async fn recent_snapshot(&self) -> Vec<PriceSeries> {
        let lookback = self
            .config
            .recent_picks
            .min(self.config.diversification.lookback);
        let symbols = match self.market.recent_picks(lookback).await {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!(error = %e, "Recent picks unavailable, diversification skipped");
                return Vec::new();
            }
        };

        let mut snapshot = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self
                .market
                .price_series(&symbol, self.config.history_limit)
                .await
            {
                Ok(series) => snapshot.push(series),
                Err(e) => warn!(%symbol, error = %e, "Recent pick history unavailable"),
            }
        }
        snapshot
    }

    /// Attach pattern context and reason bullets to the surviving drafts.
    async fn finalize(
        &self,
        drafts: Vec<Draft>,
        evaluator: &Evaluator,
        date: NaiveDate,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(drafts.len());
        let mut patterns: Vec<(String, Option<PatternSignal>)> = Vec::new();

        for draft in drafts {
            let pattern = match patterns.iter().find(|(s, _)| *s == draft.candidate.symbol) {
                Some((_, p)) => p.clone(),
                None => {
                    let p = match self.market.pattern_signal(&draft.candidate.symbol, date).await {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(symbol = %draft.candidate.symbol, error = %e, "Pattern signal unavailable");
                            None
                        }
                    };
                    patterns.push((draft.candidate.symbol.clone(), p.clone()));
                    p
                }
            };

            let mut candidate = draft.candidate;
            candidate.reason_bullets = scoring::reason_bullets(&ReasonInputs {
                pattern: pattern.as_ref(),
                size_pct: candidate.size_pct,
                exit_basis: draft.exit_basis,
                reward_risk: draft.reward_risk,
                regime: evaluator.regime,
                detail: draft.detail,
            });
            candidates.push(candidate);
        }
        candidates
    }
}

/// A candidate before pattern lookup and reason bullets.
#[derive(Debug, Clone)]
struct Draft {
    candidate: Candidate,
    exit_basis: ExitBasis,
    reward_risk: f64,
    detail: SignalDetail,
}

#[derive(Debug, Default)]
struct Evaluation {
    drafts: Vec<Draft>,
    diagnostics: Vec<Diagnostic>,
}

impl Evaluation {
    fn skipped(diagnostic: Diagnostic) -> Self {
        diagnostic.log();
        Self {
            drafts: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }
}

/// Read-only cycle context shared by every per-symbol task.
struct Evaluator {
    date: NaiveDate,
    regime: RegimeState,
    recent: Vec<PriceSeries>,
    strategies: Vec<Strategy>,
    min_history: usize,
    min_confidence: f64,
    min_kelly: f64,
    diversification: DiversificationFilter,
    robustness: RobustnessTester,
    exits: ExitPolicy,
    sizing: SizingConfig,
    seeds: SeedHierarchy,
}

impl Evaluator {
    fn evaluate(&self, series: &PriceSeries) -> Evaluation {
        let symbol = series.symbol();
        if series.len() < self.min_history {
            return Evaluation::skipped(Diagnostic::symbol(
                symbol,
                Outcome::InsufficientHistory {
                    needed: self.min_history,
                    got: series.len(),
                },
            ));
        }
        let close = series.last_close().unwrap_or(f64::NAN);
        if !(close > 0.0 && close.is_finite()) {
            return Evaluation::skipped(Diagnostic::symbol(symbol, Outcome::InvalidPrice { close }));
        }
        let entry = close;

        if let Diversification::Rejected {
            against,
            correlation,
        } = self.diversification.check(series, &self.recent)
        {
            return Evaluation::skipped(Diagnostic::symbol(
                symbol,
                Outcome::Correlated {
                    with: against,
                    correlation,
                },
            ));
        }

        let returns = series.daily_returns();
        let stats = PayoffStats::from_returns(&returns);
        let mut evaluation = Evaluation::default();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let signal = strategy.generate_signal(series);
            if !signal.is_actionable() {
                evaluation.record(Diagnostic::strategy(symbol, kind, Outcome::NoSignal));
                continue;
            }
            if signal.confidence < self.min_confidence {
                evaluation.record(Diagnostic::strategy(
                    symbol,
                    kind,
                    Outcome::WeakSignal {
                        confidence: signal.confidence,
                    },
                ));
                continue;
            }

            let mut rng = self.seeds.rng_for(self.date, symbol, strategy.name());
            let report = self.robustness.test(strategy, series, &mut rng);
            if let Some(failure) = report.failure {
                evaluation.record(Diagnostic::strategy(
                    symbol,
                    kind,
                    Outcome::RobustnessFailed { failure },
                ));
                continue;
            }

            let kelly_fraction = self.sizing.kelly_fraction(&stats);
            if kelly_fraction < self.min_kelly {
                evaluation.record(Diagnostic::strategy(
                    symbol,
                    kind,
                    Outcome::SizeTooSmall { kelly_fraction },
                ));
                continue;
            }

            let exits = self.exits.compute_exits(entry, signal.direction, series);
            debug!(
                symbol,
                strategy = %kind,
                stop = exits.stop,
                target = exits.target,
                basis = exits.basis.label(),
                atr = ?exits.atr_used,
                volatility = ?exits.volatility_used,
                "Exits computed"
            );
            let risk_pct = exits.risk_pct(entry);
            let reward_pct = exits.reward_pct(entry);
            if !(risk_pct > 0.0 && risk_pct.is_finite()) {
                evaluation.record(Diagnostic::strategy(
                    symbol,
                    kind,
                    Outcome::DegenerateExits { stop: exits.stop },
                ));
                continue;
            }

            let expected_return = scoring::expected_return(stats.win_rate, reward_pct, risk_pct);
            let sharpe_ratio = scoring::sharpe_ratio(expected_return, &returns);
            let composite_score =
                scoring::composite_score(sharpe_ratio, kelly_fraction, signal.confidence);

            evaluation.record(Diagnostic::strategy(
                symbol,
                kind,
                Outcome::Accepted { composite_score },
            ));
            evaluation.drafts.push(Draft {
                candidate: Candidate {
                    symbol: symbol.to_string(),
                    strategy: strategy.name().to_string(),
                    direction: signal.direction,
                    entry,
                    stop: exits.stop,
                    target: exits.target,
                    kelly_fraction,
                    size_pct: SizingConfig::size_pct(kelly_fraction),
                    win_rate: stats.win_rate,
                    payoff_ratio: stats.payoff_ratio,
                    signal_confidence: signal.confidence,
                    expected_return,
                    sharpe_ratio,
                    composite_score,
                    reason_bullets: Vec::new(),
                },
                exit_basis: exits.basis,
                reward_risk: reward_pct / risk_pct,
                detail: signal.detail,
            });
        }
        evaluation
    }
}

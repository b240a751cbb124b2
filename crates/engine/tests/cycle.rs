use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use sqlx::sqlite::SqlitePoolOptions;

use common::{
    DailyPick, Direction, Error, MarketData, PatternSignal, PickSink, PriceBar, PriceSeries,
    RegimeState, Result,
};
use engine::{Outcome, Ranker, RankerFileConfig};
use risk::{RobustnessConfig, SyntheticModel};
use store::{MemoryStore, SqliteStore};

const BARS: usize = 100;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn cycle_date() -> NaiveDate {
    start() + Duration::days(BARS as i64)
}

fn bars_from_returns(returns: &[f64]) -> Vec<PriceBar> {
    let mut close = 100.0;
    let mut bars = Vec::with_capacity(returns.len() + 1);
    for i in 0..=returns.len() {
        if i > 0 {
            close *= 1.0 + returns[i - 1];
        }
        bars.push(PriceBar {
            date: start() + Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000_000.0,
        });
    }
    bars
}

fn cycled(pattern: &[f64]) -> Vec<f64> {
    (0..BARS - 1).map(|i| pattern[i % pattern.len()]).collect()
}

fn series(symbol: &str, returns: &[f64]) -> PriceSeries {
    PriceSeries::new(symbol, bars_from_returns(returns)).unwrap()
}

/// Up two days, down one; ends on a down day.
fn trending() -> Vec<f64> {
    cycled(&[0.02, 0.02, -0.01])
}

fn choppy() -> Vec<f64> {
    cycled(&[-0.01, 0.01])
}

fn falling() -> Vec<f64> {
    cycled(&[-0.02, -0.02, 0.01])
}

/// Benchmark whose log returns alternate +/-0.0005: annualized vol ~0.008.
fn calm_benchmark() -> PriceSeries {
    let bars = (0..60)
        .map(|i| {
            let close = if i % 2 == 0 { 100.0 } else { 100.0 * 0.0005f64.exp() };
            PriceBar {
                date: start() + Duration::days(40 + i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            }
        })
        .collect();
    PriceSeries::new("SPY", bars).unwrap()
}

fn config(universe: &[&str]) -> RankerFileConfig {
    RankerFileConfig {
        universe: universe.iter().map(|s| s.to_string()).collect(),
        robustness: RobustnessConfig {
            synthetic: SyntheticModel {
                stdev: 0.01,
                ..SyntheticModel::default()
            },
            ..RobustnessConfig::default()
        },
        ..RankerFileConfig::default()
    }
}

async fn market() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_series(calm_benchmark()).await;
    store.insert_series(series("TREND", &trending())).await;
    store.insert_series(series("CHOP", &choppy())).await;
    store.insert_series(series("FALL", &falling())).await;
    store
}

fn ranker(store: &MemoryStore, cfg: RankerFileConfig) -> Ranker {
    Ranker::new(cfg, Arc::new(store.clone()), Arc::new(store.clone()))
        .unwrap()
        .with_seed(42)
}

#[tokio::test]
async fn trending_symbol_is_picked_via_momentum() {
    let store = market().await;
    let report = ranker(&store, config(&["TREND", "CHOP", "FALL"]))
        .run_cycle(cycle_date())
        .await
        .unwrap();

    assert_eq!(report.regime, RegimeState::RiskOn);
    let pick = report.pick.clone().expect("a pick");
    assert_eq!(pick.symbol, "TREND");
    assert_eq!(pick.strategy, "momentum");
    assert_eq!(pick.direction, Direction::Long);
    assert!(pick.stop < pick.entry && pick.entry < pick.target, "{pick:?}");
    assert!(pick.kelly_fraction > 0.01);
    assert_eq!(pick.size_pct, 25.0);
    assert!(pick.composite_score > 0.0);
    assert!(pick.reason_bullets.len() <= 5);
    assert!(pick
        .reason_bullets
        .contains(&"Market in risk on regime".to_string()));

    assert!(report.persisted);
    assert_eq!(store.pick_for(cycle_date()).await, Some(pick));

    // Neither the choppy nor the falling symbol is worth a position.
    assert!(report.diagnostics.iter().any(|d| d.symbol == "FALL"
        && matches!(d.outcome, Outcome::SizeTooSmall { .. })));
    assert!(report.accepted().all(|d| d.symbol == "TREND"));
}

#[tokio::test]
async fn cycle_is_deterministic_for_a_fixed_seed() {
    let store = market().await;
    let cfg = config(&["TREND", "CHOP", "FALL"]);

    let a = ranker(&store, cfg.clone())
        .with_workers(1)
        .dry_run(true)
        .run_cycle(cycle_date())
        .await
        .unwrap();
    let b = ranker(&store, cfg)
        .with_workers(8)
        .dry_run(true)
        .run_cycle(cycle_date())
        .await
        .unwrap();

    assert_eq!(a.pick, b.pick);
    assert_eq!(a.candidates, b.candidates);
    assert_eq!(a.diagnostics, b.diagnostics);
    assert!(!a.persisted);
    assert_eq!(store.pick_count().await, 0);
}

#[tokio::test]
async fn no_candidates_yields_no_pick() {
    let store = market().await;
    let report = ranker(&store, config(&["CHOP"]))
        .run_cycle(cycle_date())
        .await
        .unwrap();

    assert!(report.pick.is_none());
    assert_eq!(report.candidates, 0);
    assert!(!report.persisted);
    assert_eq!(store.pick_count().await, 0);
}

#[tokio::test]
async fn failed_write_fails_the_cycle() {
    let store = market().await;
    store.fail_writes(true);
    let err = ranker(&store, config(&["TREND"]))
        .run_cycle(cycle_date())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
}

#[tokio::test]
async fn symbol_moving_with_a_recent_pick_is_rejected() {
    let store = market().await;
    store.insert_series(series("TWIN", &trending())).await;
    let earlier = DailyPick {
        date: cycle_date() - Duration::days(1),
        symbol: "TWIN".into(),
        strategy: "momentum".into(),
        direction: Direction::Long,
        entry: 100.0,
        stop: 97.0,
        target: 106.0,
        expected_return: 0.02,
        sharpe_ratio: 0.5,
        kelly_fraction: 0.25,
        size_pct: 25.0,
        composite_score: 0.05,
        reason_bullets: Vec::new(),
    };
    store.upsert_daily_pick(&earlier).await.unwrap();

    let report = ranker(&store, config(&["TREND"]))
        .run_cycle(cycle_date())
        .await
        .unwrap();

    assert!(report.pick.is_none());
    match &report.diagnostics[0].outcome {
        Outcome::Correlated { with, correlation } => {
            assert_eq!(with, "TWIN");
            assert!(*correlation > 0.75);
        }
        other => panic!("expected correlation rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn strong_pattern_leads_the_reason_bullets() {
    let store = market().await;
    store
        .add_pattern(
            "TREND",
            cycle_date(),
            PatternSignal {
                pattern: "ascending_triangle".into(),
                confidence: 0.91,
            },
        )
        .await;

    let report = ranker(&store, config(&["TREND"]))
        .run_cycle(cycle_date())
        .await
        .unwrap();
    let pick = report.pick.unwrap();
    assert_eq!(pick.reason_bullets.len(), 5);
    assert_eq!(
        pick.reason_bullets[0],
        "High-confidence ascending triangle pattern (0.91)"
    );
    assert_eq!(pick.reason_bullets[1], "Kelly sizing: 25% of equity");
}

#[tokio::test]
async fn short_and_unknown_histories_are_skipped() {
    let store = market().await;
    store
        .insert_series(series("NEW", &trending()[..20]))
        .await;

    let report = ranker(&store, config(&["NEW", "GHOST", "TREND"]))
        .run_cycle(cycle_date())
        .await
        .unwrap();

    assert_eq!(report.pick.unwrap().symbol, "TREND");
    let outcome_for = |symbol: &str| {
        report
            .diagnostics
            .iter()
            .find(|d| d.symbol == symbol)
            .map(|d| d.outcome.clone())
    };
    assert_eq!(
        outcome_for("NEW"),
        Some(Outcome::InsufficientHistory { needed: 50, got: 21 })
    );
    assert_eq!(
        outcome_for("GHOST"),
        Some(Outcome::InsufficientHistory { needed: 50, got: 0 })
    );
}

/// Market data source that fails for one symbol.
struct Flaky {
    inner: MemoryStore,
    broken: &'static str,
}

#[async_trait]
impl MarketData for Flaky {
    async fn price_series(&self, symbol: &str, limit: usize) -> Result<PriceSeries> {
        if symbol == self.broken {
            return Err(Error::Other("connection reset".into()));
        }
        self.inner.price_series(symbol, limit).await
    }

    async fn pattern_signal(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<PatternSignal>> {
        self.inner.pattern_signal(symbol, date).await
    }

    async fn recent_picks(&self, limit: usize) -> Result<Vec<String>> {
        self.inner.recent_picks(limit).await
    }
}

#[tokio::test]
async fn fetch_failure_skips_only_that_symbol() {
    let store = market().await;
    let flaky = Flaky {
        inner: store.clone(),
        broken: "CHOP",
    };
    let report = Ranker::new(
        config(&["CHOP", "TREND"]),
        Arc::new(flaky),
        Arc::new(store.clone()),
    )
    .unwrap()
    .with_seed(42)
    .run_cycle(cycle_date())
    .await
    .unwrap();

    assert!(matches!(
        report.diagnostics[0].outcome,
        Outcome::FetchFailed { .. }
    ));
    assert_eq!(report.pick.unwrap().symbol, "TREND");
}

/// Market data source that counts the cycle-wide lookups.
#[derive(Default)]
struct Counting {
    inner: MemoryStore,
    recent_calls: AtomicUsize,
    benchmark_calls: AtomicUsize,
}

#[async_trait]
impl MarketData for Counting {
    async fn price_series(&self, symbol: &str, limit: usize) -> Result<PriceSeries> {
        if symbol == "SPY" {
            self.benchmark_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.price_series(symbol, limit).await
    }

    async fn pattern_signal(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<PatternSignal>> {
        self.inner.pattern_signal(symbol, date).await
    }

    async fn recent_picks(&self, limit: usize) -> Result<Vec<String>> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.recent_picks(limit).await
    }
}

#[tokio::test]
async fn regime_and_recent_picks_are_fetched_once_per_cycle() {
    let store = market().await;
    store.insert_series(series("TWIN", &trending())).await;
    let counting = Arc::new(Counting {
        inner: store.clone(),
        ..Counting::default()
    });

    let report = Ranker::new(
        config(&["TREND", "CHOP", "FALL", "TWIN"]),
        counting.clone(),
        Arc::new(store.clone()),
    )
    .unwrap()
    .with_workers(4)
    .with_seed(42)
    .run_cycle(cycle_date())
    .await
    .unwrap();

    for symbol in ["TREND", "CHOP", "FALL", "TWIN"] {
        assert!(report.diagnostics.iter().any(|d| d.symbol == symbol), "{symbol}");
    }
    assert_eq!(counting.recent_calls.load(Ordering::SeqCst), 1);
    assert_eq!(counting.benchmark_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sqlite_rerun_overwrites_the_days_pick() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = SqliteStore::from_pool(pool);
    db.migrate().await.unwrap();
    db.insert_bars("SPY", calm_benchmark().bars()).await.unwrap();
    db.insert_bars("TREND", &bars_from_returns(&trending()))
        .await
        .unwrap();

    let db = Arc::new(db);
    let ranker = Ranker::new(config(&["TREND"]), db.clone(), db.clone())
        .unwrap()
        .with_seed(42);

    let first = ranker.run_cycle(cycle_date()).await.unwrap();
    let second = ranker.run_cycle(cycle_date()).await.unwrap();
    assert_eq!(first.pick, second.pick);

    let stored = db.fetch_pick(cycle_date()).await.unwrap().unwrap();
    assert_eq!(Some(stored), second.pick);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_pick")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

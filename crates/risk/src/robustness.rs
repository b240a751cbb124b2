use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{PriceBar, PriceSeries};
use strategy::indicators::{mean, population_stdev, sample_stdev, simple_returns, TRADING_DAYS};
use strategy::{SignalGenerator, Strategy};

/// How a return is estimated for one (baseline or stressed) data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnModel {
    /// Normal draw penalised by excess annualized volatility.
    #[default]
    SyntheticVolatility,
    /// Replays the strategy bar by bar and sums the realised next-bar returns.
    SignalReplay,
}

/// Parameters of the synthetic return estimate:
/// `N(mean, stdev) - max(0, vol - vol_threshold) * vol_penalty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticModel {
    pub mean: f64,
    pub stdev: f64,
    pub vol_threshold: f64,
    pub vol_penalty: f64,
}

impl Default for SyntheticModel {
    fn default() -> Self {
        Self {
            mean: 0.08,
            stdev: 0.15,
            vol_threshold: 0.2,
            vol_penalty: 0.5,
        }
    }
}

impl SyntheticModel {
    fn estimate<R: Rng + ?Sized>(&self, series: &PriceSeries, rng: &mut R) -> f64 {
        let returns = simple_returns(&series.closes());
        let vol = sample_stdev(&returns).unwrap_or(0.0) * TRADING_DAYS.sqrt();
        let penalty = (vol - self.vol_threshold).max(0.0) * self.vol_penalty;
        normal(rng, self.mean, self.stdev) - penalty
    }
}

/// Box-Muller standard normal scaled to `N(mean, stdev)`.
fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, stdev: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + stdev * z
}

/// Monte Carlo stress-test parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustnessConfig {
    pub iterations: usize,
    pub min_bars: usize,
    /// Max per-field price slippage, as a fraction.
    pub slippage_max: f64,
    /// Max opening gap relative to the previous close.
    pub gap_max: f64,
    /// Share of bars that receive an opening gap.
    pub gap_fraction: f64,
    /// Minimum stressed/baseline mean return ratio.
    pub min_retention: f64,
    pub outlier_sigma: f64,
    /// Max share of trials allowed beyond `outlier_sigma`.
    pub max_outlier_fraction: f64,
    pub return_model: ReturnModel,
    pub synthetic: SyntheticModel,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            min_bars: 50,
            slippage_max: 0.003,
            gap_max: 0.001,
            gap_fraction: 0.05,
            min_retention: 0.5,
            outlier_sigma: 3.0,
            max_outlier_fraction: 0.1,
            return_model: ReturnModel::SyntheticVolatility,
            synthetic: SyntheticModel::default(),
        }
    }
}

/// Why a candidate did not survive the stress test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RobustnessFailure {
    InsufficientData { needed: usize, got: usize },
    UnprofitableUnderStress { stressed_mean: f64 },
    NonPositiveBaseline { baseline_mean: f64 },
    PoorRetention { retention: f64 },
    TooManyOutliers { outliers: usize, allowed: f64 },
    Calculation { message: String },
}

impl std::fmt::Display for RobustnessFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RobustnessFailure::InsufficientData { needed, got } => {
                write!(f, "insufficient data: need {needed} bars, got {got}")
            }
            RobustnessFailure::UnprofitableUnderStress { stressed_mean } => {
                write!(f, "unprofitable under stress (mean {stressed_mean:.4})")
            }
            RobustnessFailure::NonPositiveBaseline { baseline_mean } => {
                write!(f, "non-positive baseline return ({baseline_mean:.4})")
            }
            RobustnessFailure::PoorRetention { retention } => {
                write!(f, "stressed return retains only {:.0}% of baseline", retention * 100.0)
            }
            RobustnessFailure::TooManyOutliers { outliers, allowed } => {
                write!(f, "{outliers} outlier trials (allowed {allowed:.0})")
            }
            RobustnessFailure::Calculation { message } => write!(f, "calculation error: {message}"),
        }
    }
}

/// Summary of one stress test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    pub trials: usize,
    pub baseline_mean: f64,
    pub stressed_mean: f64,
    pub stressed_stdev: f64,
    pub outliers: usize,
    pub failure: Option<RobustnessFailure>,
}

impl RobustnessReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    fn failed(failure: RobustnessFailure) -> Self {
        Self {
            trials: 0,
            baseline_mean: 0.0,
            stressed_mean: 0.0,
            stressed_stdev: 0.0,
            outliers: 0,
            failure: Some(failure),
        }
    }
}

/// Perturb every OHLC field with random slippage and add opening gaps to a
/// random subset of bars. Dates and volume are untouched.
pub fn stress_series<R: Rng + ?Sized>(
    series: &PriceSeries,
    config: &RobustnessConfig,
    rng: &mut R,
) -> PriceSeries {
    let slip = |price: f64, rng: &mut R| {
        let u = rng.gen::<f64>() * config.slippage_max;
        price * (1.0 + u * random_sign(rng))
    };

    let mut bars: Vec<PriceBar> = series
        .bars()
        .iter()
        .map(|b| PriceBar {
            open: slip(b.open, rng),
            high: slip(b.high, rng),
            low: slip(b.low, rng),
            close: slip(b.close, rng),
            ..*b
        })
        .collect();

    let n = bars.len();
    let gaps = ((n as f64 * config.gap_fraction).floor() as usize).min(n);
    for idx in index::sample(rng, n, gaps).into_vec() {
        if idx == 0 {
            continue;
        }
        let g = rng.gen::<f64>() * config.gap_max;
        let prev_close = bars[idx - 1].close;
        bars[idx].open += prev_close * g * random_sign(rng);
    }

    series.with_bars(bars)
}

fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

/// Runs a strategy against many stressed copies of its price history.
#[derive(Debug, Clone, Default)]
pub struct RobustnessTester {
    config: RobustnessConfig,
}

impl RobustnessTester {
    pub fn new(config: RobustnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RobustnessConfig {
        &self.config
    }

    pub fn test<R: Rng + ?Sized>(
        &self,
        strategy: &Strategy,
        series: &PriceSeries,
        rng: &mut R,
    ) -> RobustnessReport {
        let cfg = &self.config;
        if series.len() < cfg.min_bars {
            return RobustnessReport::failed(RobustnessFailure::InsufficientData {
                needed: cfg.min_bars,
                got: series.len(),
            });
        }
        let iterations = cfg.iterations.max(1);

        let mut baseline = Vec::with_capacity(iterations);
        let mut stressed = Vec::with_capacity(iterations);
        let replay_baseline = match cfg.return_model {
            ReturnModel::SignalReplay => Some(replay(strategy, series)),
            ReturnModel::SyntheticVolatility => None,
        };

        for _ in 0..iterations {
            let stressed_series = stress_series(series, cfg, rng);
            match replay_baseline {
                Some(base) => {
                    baseline.push(base);
                    stressed.push(replay(strategy, &stressed_series));
                }
                None => {
                    baseline.push(cfg.synthetic.estimate(series, rng));
                    stressed.push(cfg.synthetic.estimate(&stressed_series, rng));
                }
            }
        }

        let report = self.evaluate(&baseline, &stressed);
        debug!(
            symbol = %series.symbol(),
            strategy = %strategy.name(),
            baseline = report.baseline_mean,
            stressed = report.stressed_mean,
            outliers = report.outliers,
            passed = report.passed(),
            "Robustness test complete"
        );
        report
    }

    fn evaluate(&self, baseline: &[f64], stressed: &[f64]) -> RobustnessReport {
        let cfg = &self.config;
        let trials = stressed.len();
        let baseline_mean = mean(baseline).unwrap_or(f64::NAN);
        let stressed_mean = mean(stressed).unwrap_or(f64::NAN);
        let stressed_stdev = population_stdev(stressed).unwrap_or(f64::NAN);

        let outliers = if stressed_stdev > 0.0 {
            stressed
                .iter()
                .filter(|r| (*r - stressed_mean).abs() > cfg.outlier_sigma * stressed_stdev)
                .count()
        } else {
            0
        };
        let allowed = cfg.max_outlier_fraction * trials as f64;

        let failure = if !(baseline_mean.is_finite()
            && stressed_mean.is_finite()
            && stressed_stdev.is_finite())
        {
            Some(RobustnessFailure::Calculation {
                message: "non-finite trial returns".to_string(),
            })
        } else if stressed_mean <= 0.0 {
            Some(RobustnessFailure::UnprofitableUnderStress { stressed_mean })
        } else if baseline_mean <= 0.0 {
            Some(RobustnessFailure::NonPositiveBaseline { baseline_mean })
        } else if stressed_mean / baseline_mean < cfg.min_retention {
            Some(RobustnessFailure::PoorRetention {
                retention: stressed_mean / baseline_mean,
            })
        } else if outliers as f64 > allowed {
            Some(RobustnessFailure::TooManyOutliers { outliers, allowed })
        } else {
            None
        };

        RobustnessReport {
            trials,
            baseline_mean,
            stressed_mean,
            stressed_stdev,
            outliers,
            failure,
        }
    }
}

/// Hold each bar's signal for the next bar and sum the signed returns.
fn replay(strategy: &Strategy, series: &PriceSeries) -> f64 {
    let bars = series.bars();
    let start = strategy.min_bars().max(1) - 1;
    let mut total = 0.0;
    for t in start..bars.len().saturating_sub(1) {
        let signal = strategy.generate_signal(&series.prefix(t + 1));
        if !signal.is_actionable() {
            continue;
        }
        let next = bars[t + 1].close / bars[t].close - 1.0;
        total += signal.direction.sign() * next;
    }
    total
}

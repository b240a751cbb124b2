pub mod atr;
pub mod bollinger;
pub mod stats;
pub mod volatility;

pub use atr::{atr, true_ranges};
pub use bollinger::{BollingerBands, BollingerIndicator};
pub use stats::{log_returns, mean, population_stdev, sample_stdev, simple_returns, sma};
pub use volatility::historical_volatility;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{DailyPick, PatternSignal, PriceSeries, Result};

/// Read side of the external price/pattern store.
///
/// `SqliteStore` implements this against the production database.
/// `MemoryStore` implements this for tests and dry runs.
///
/// The ranker only ever reads through this trait; it never writes prices.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// The most recent `limit` bars for `symbol`, ascending by date.
    /// An unknown symbol yields an empty series, not an error.
    async fn price_series(&self, symbol: &str, limit: usize) -> Result<PriceSeries>;

    /// The highest-confidence pattern detected for `symbol` on `date`, if any.
    async fn pattern_signal(&self, symbol: &str, date: NaiveDate)
        -> Result<Option<PatternSignal>>;

    /// The most recent distinct picked symbols, newest first.
    async fn recent_picks(&self, limit: usize) -> Result<Vec<String>>;
}

/// Write side: persists exactly one pick per date.
#[async_trait]
pub trait PickSink: Send + Sync {
    /// Insert or overwrite the pick for `pick.date` in a single atomic write.
    async fn upsert_daily_pick(&self, pick: &DailyPick) -> Result<()>;
}

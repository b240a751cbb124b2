use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::debug;

use common::{DailyPick, Error, MarketData, PatternSignal, PickSink, PriceSeries, Result};

/// In-process store used by tests and dry runs.
///
/// Writes can be made to fail on demand with [`MemoryStore::fail_writes`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    prices: Arc<RwLock<HashMap<String, PriceSeries>>>,
    patterns: Arc<RwLock<HashMap<(String, NaiveDate), Vec<PatternSignal>>>>,
    picks: Arc<RwLock<BTreeMap<NaiveDate, DailyPick>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored history for the series' symbol.
    pub async fn insert_series(&self, series: PriceSeries) {
        self.prices
            .write()
            .await
            .insert(series.symbol().to_string(), series);
    }

    pub async fn add_pattern(&self, symbol: &str, date: NaiveDate, signal: PatternSignal) {
        self.patterns
            .write()
            .await
            .entry((symbol.to_string(), date))
            .or_default()
            .push(signal);
    }

    /// Make every subsequent `upsert_daily_pick` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn pick_for(&self, date: NaiveDate) -> Option<DailyPick> {
        self.picks.read().await.get(&date).cloned()
    }

    pub async fn pick_count(&self) -> usize {
        self.picks.read().await.len()
    }
}

#[async_trait]
impl MarketData for MemoryStore {
    async fn price_series(&self, symbol: &str, limit: usize) -> Result<PriceSeries> {
        let prices = self.prices.read().await;
        let Some(series) = prices.get(symbol) else {
            return Ok(PriceSeries::empty(symbol));
        };
        let bars = series.bars();
        let start = bars.len().saturating_sub(limit);
        Ok(series.with_bars(bars[start..].to_vec()))
    }

    async fn pattern_signal(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<PatternSignal>> {
        let patterns = self.patterns.read().await;
        Ok(patterns
            .get(&(symbol.to_string(), date))
            .and_then(|found| {
                found
                    .iter()
                    .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                    .cloned()
            }))
    }

    async fn recent_picks(&self, limit: usize) -> Result<Vec<String>> {
        let picks = self.picks.read().await;
        let mut symbols: Vec<String> = Vec::new();
        for pick in picks.values().rev() {
            if symbols.len() >= limit {
                break;
            }
            if !symbols.contains(&pick.symbol) {
                symbols.push(pick.symbol.clone());
            }
        }
        Ok(symbols)
    }
}

#[async_trait]
impl PickSink for MemoryStore {
    async fn upsert_daily_pick(&self, pick: &DailyPick) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence(format!(
                "write rejected for {}",
                pick.date
            )));
        }
        debug!(date = %pick.date, symbol = %pick.symbol, "Pick stored in memory");
        self.picks.write().await.insert(pick.date, pick.clone());
        Ok(())
    }
}

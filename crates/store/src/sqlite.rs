use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use common::{
    DailyPick, Direction, Error, MarketData, PatternSignal, PickSink, PriceBar, PriceSeries,
    Result,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// sqlx-backed store over the `price_history`, `pattern_signal` and
/// `daily_pick` tables.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = SqlitePool::connect(database_url).await?;
        Ok(Self { db })
    }

    pub fn from_pool(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Apply the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.db).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Insert or replace bars for `symbol` in one transaction.
    pub async fn insert_bars(&self, symbol: &str, bars: &[PriceBar]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO price_history (symbol, date, open, high, low, close, volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(symbol, date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume
                "#,
            )
            .bind(symbol)
            .bind(bar.date.format(DATE_FORMAT).to_string())
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_pattern(
        &self,
        symbol: &str,
        date: NaiveDate,
        signal: &PatternSignal,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO pattern_signal (symbol, scan_date, pattern, confidence) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(symbol)
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(&signal.pattern)
        .bind(signal.confidence)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn fetch_pick(&self, date: NaiveDate) -> Result<Option<DailyPick>> {
        let row = sqlx::query(
            r#"
            SELECT date, symbol, strategy, direction, entry_price, stop_loss, target_price,
                   expected_return, sharpe_ratio, kelly_fraction, size_pct, composite_score,
                   reason_bullets
            FROM daily_pick
            WHERE date = ?1
            "#,
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| pick_from_row(&r)).transpose()
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| Error::InvalidSeries(format!("bad date '{raw}': {e}")))
}

fn parse_direction(raw: &str) -> Result<Direction> {
    match raw {
        "long" => Ok(Direction::Long),
        "short" => Ok(Direction::Short),
        "flat" => Ok(Direction::Flat),
        other => Err(Error::Other(format!("unknown direction '{other}'"))),
    }
}

fn bar_from_row(row: &SqliteRow) -> Result<PriceBar> {
    let date: String = row.try_get("date")?;
    Ok(PriceBar {
        date: parse_date(&date)?,
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        volume: row.try_get("volume")?,
    })
}

fn pick_from_row(row: &SqliteRow) -> Result<DailyPick> {
    let date: String = row.try_get("date")?;
    let direction: String = row.try_get("direction")?;
    let bullets: String = row.try_get("reason_bullets")?;
    Ok(DailyPick {
        date: parse_date(&date)?,
        symbol: row.try_get("symbol")?,
        strategy: row.try_get("strategy")?,
        direction: parse_direction(&direction)?,
        entry: row.try_get("entry_price")?,
        stop: row.try_get("stop_loss")?,
        target: row.try_get("target_price")?,
        expected_return: row.try_get("expected_return")?,
        sharpe_ratio: row.try_get("sharpe_ratio")?,
        kelly_fraction: row.try_get("kelly_fraction")?,
        size_pct: row.try_get("size_pct")?,
        composite_score: row.try_get("composite_score")?,
        reason_bullets: serde_json::from_str(&bullets)?,
    })
}

#[async_trait]
impl MarketData for SqliteStore {
    async fn price_series(&self, symbol: &str, limit: usize) -> Result<PriceSeries> {
        let rows = sqlx::query(
            r#"
            SELECT date, open, high, low, close, volume
            FROM price_history
            WHERE symbol = ?1
            ORDER BY date DESC
            LIMIT ?2
            "#,
        )
        .bind(symbol)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        let bars = rows.iter().map(bar_from_row).collect::<Result<Vec<_>>>()?;
        debug!(symbol, bars = bars.len(), "Price history loaded");
        PriceSeries::new(symbol, bars)
    }

    async fn pattern_signal(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<PatternSignal>> {
        let row = sqlx::query(
            r#"
            SELECT pattern, confidence
            FROM pattern_signal
            WHERE symbol = ?1 AND scan_date = ?2
            ORDER BY confidence DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(date.format(DATE_FORMAT).to_string())
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| -> Result<PatternSignal> {
            Ok(PatternSignal {
                pattern: r.try_get("pattern")?,
                confidence: r.try_get("confidence")?,
            })
        })
        .transpose()
    }

    async fn recent_picks(&self, limit: usize) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol
            FROM daily_pick
            GROUP BY symbol
            ORDER BY MAX(date) DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("symbol").map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl PickSink for SqliteStore {
    async fn upsert_daily_pick(&self, pick: &DailyPick) -> Result<()> {
        let bullets = serde_json::to_string(&pick.reason_bullets)?;
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO daily_pick (
                date, symbol, strategy, direction, entry_price, stop_loss, target_price,
                expected_return, sharpe_ratio, kelly_fraction, size_pct, composite_score,
                reason_bullets, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(date) DO UPDATE SET
                symbol = excluded.symbol,
                strategy = excluded.strategy,
                direction = excluded.direction,
                entry_price = excluded.entry_price,
                stop_loss = excluded.stop_loss,
                target_price = excluded.target_price,
                expected_return = excluded.expected_return,
                sharpe_ratio = excluded.sharpe_ratio,
                kelly_fraction = excluded.kelly_fraction,
                size_pct = excluded.size_pct,
                composite_score = excluded.composite_score,
                reason_bullets = excluded.reason_bullets,
                created_at = excluded.created_at
            "#,
        )
        .bind(pick.date.format(DATE_FORMAT).to_string())
        .bind(&pick.symbol)
        .bind(&pick.strategy)
        .bind(pick.direction.to_string())
        .bind(pick.entry)
        .bind(pick.stop)
        .bind(pick.target)
        .bind(pick.expected_return)
        .bind(pick.sharpe_ratio)
        .bind(pick.kelly_fraction)
        .bind(pick.size_pct)
        .bind(pick.composite_score)
        .bind(bullets)
        .bind(created_at)
        .execute(&self.db)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;

        info!(date = %pick.date, symbol = %pick.symbol, "Daily pick persisted");
        Ok(())
    }
}

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{Ranker, RankerFileConfig};
use store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let ranker_cfg = RankerFileConfig::load(&cfg.ranker_config_path);
    let seed = cfg.seed.unwrap_or_else(rand::random);
    info!(
        workers = cfg.workers,
        seed,
        dry_run = cfg.dry_run,
        universe = ranker_cfg.universe.len(),
        "Daily ranker starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqliteStore::connect(&cfg.database_url)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("database migration failed")?;
    info!("Database ready");
    let db = Arc::new(db);

    // ── Cycle ─────────────────────────────────────────────────────────────────
    let ranker = Ranker::new(ranker_cfg, db.clone(), db)
        .context("invalid strategy configuration")?
        .with_workers(cfg.workers)
        .with_seed(seed)
        .dry_run(cfg.dry_run);

    let today = Utc::now().date_naive();
    let report = ranker
        .run_cycle(today)
        .await
        .with_context(|| format!("ranking cycle for {today} failed"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

//! Batch condition collection.
//!
//! Fans out over the registry (or a single resort), persists every
//! successful record, then runs the data-quality monitor over the persisted
//! state and logs the run report. Exits 0 whenever a run completed —
//! per-resort failures are part of a normal run — and non-zero only when
//! setup fails before any resort was attempted.

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snow_report_api::cache::Cache;
use snow_report_api::config::{AppConfig, Registry};
use snow_report_api::services::collector::{Collector, FailureTracker, DEFAULT_MAX_WORKERS};
use snow_report_api::services::monitor;

/// Connection pool sized to the fan-out width plus API headroom.
const DB_POOL_MAX_CONNECTIONS: u32 = 30;

#[derive(Debug, Parser)]
#[command(name = "collect-data", about = "Collect current conditions for ski resorts")]
struct Args {
    /// Collect every enabled resort (default when no resort id is given)
    #[arg(long)]
    all: bool,

    /// Collect a single resort by registry id
    #[arg(long, conflicts_with = "all")]
    resort_id: Option<i32>,

    /// Only collect the first N enabled resorts
    #[arg(long)]
    limit: Option<usize>,

    /// Fan-out width
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
    workers: usize,

    /// Skip the post-run data-quality report
    #[arg(long)]
    skip_monitor: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snow_report_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env();

    let registry = match Registry::load(&config.registry_path) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("Failed to load resort registry: {e}");
            std::process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = sqlx::migrate!().run(&pool).await {
        tracing::error!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }

    let cache = match Cache::connect(&config.redis_url, config.cache_ttl_secs).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!("Failed to connect to Redis: {e}");
            std::process::exit(1);
        }
    };

    let collector = Collector::new(pool.clone(), cache, config.openmeteo_api_key.clone());
    let tracker = FailureTracker::new();

    if let Some(resort_id) = args.resort_id {
        let Some(resort) = registry.find_by_id(resort_id) else {
            tracing::error!("Resort id {resort_id} is not in the registry");
            std::process::exit(1);
        };
        tracing::info!("Collecting single resort: {}", resort.name);
        let record = collector.collect_and_save(resort, &tracker).await;
        tracker.log_summary();
        if record.is_none() {
            // The run itself completed; the failure is in the ledger.
            tracing::warn!("Collection produced no record for {}", resort.name);
        }
    } else {
        let mut registry = registry;
        if let Some(limit) = args.limit {
            let mut kept = 0usize;
            registry.resorts.retain(|r| {
                if !r.enabled {
                    return false;
                }
                kept += 1;
                kept <= limit
            });
        }
        let run = collector
            .collect_all(&registry, true, &tracker, args.workers)
            .await;
        tracker.log_summary();
        tracing::info!(
            "Run finished: {}/{} collected in {:.1}s",
            run.success,
            run.total,
            run.duration.as_secs_f64(),
        );
    }

    if !args.skip_monitor {
        match monitor::monitor_all(&pool).await {
            Ok(report) => {
                tracing::info!(
                    "Data quality: {} resorts — {} success / {} warning / {} error, avg score {:.1}",
                    report.summary.total,
                    report.summary.success,
                    report.summary.warning,
                    report.summary.error,
                    report.summary.avg_score,
                );
                for resort in report
                    .resorts
                    .iter()
                    .filter(|r| r.overall_status != monitor::CheckStatus::Success)
                {
                    tracing::warn!(
                        resort_id = resort.resort_id,
                        score = resort.score,
                        "Quality issues for {}",
                        resort.resort_name,
                    );
                }
            }
            Err(e) => tracing::warn!("Data quality monitoring failed: {e}"),
        }
    }
}

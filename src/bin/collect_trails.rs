//! Trail and boundary collection from OpenStreetMap.
//!
//! Runs serially with a pause between resorts: Overpass enforces strict
//! rate limits and a single query can take minutes. Each success replaces
//! the resort's trail set in one transaction and drops the trail cache keys.

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snow_report_api::cache::Cache;
use snow_report_api::config::{AppConfig, Registry};
use snow_report_api::services::fetcher::HttpFetcher;
use snow_report_api::services::overpass::OverpassClient;
use snow_report_api::services::store;

/// Pause between resorts (seconds).
const PAUSE_BETWEEN_RESORTS_SECS: u64 = 5;

#[derive(Debug, Parser)]
#[command(name = "collect-trails", about = "Collect trail geometry for ski resorts")]
struct Args {
    /// Collect a single resort by registry id
    #[arg(long)]
    resort_id: Option<i32>,

    /// Only collect the first N enabled resorts
    #[arg(long)]
    limit: Option<usize>,
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
        .max_connections(5)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };
    let cache = match Cache::connect(&config.redis_url, config.cache_ttl_secs).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!("Failed to connect to Redis: {e}");
            std::process::exit(1);
        }
    };

    let client = OverpassClient::new(HttpFetcher::new());

    let resorts: Vec<_> = match args.resort_id {
        Some(id) => match registry.find_by_id(id) {
            Some(resort) => vec![resort],
            None => {
                tracing::error!("Resort id {id} is not in the registry");
                std::process::exit(1);
            }
        },
        None => {
            let mut enabled: Vec<_> = registry.enabled().collect();
            if let Some(limit) = args.limit {
                enabled.truncate(limit);
            }
            enabled
        }
    };

    tracing::info!("Collecting trails for {} resorts", resorts.len());
    let mut success = 0usize;
    let mut failed = 0usize;

    for (i, resort) in resorts.iter().enumerate() {
        tracing::info!("[{}/{}] {}", i + 1, resorts.len(), resort.name);
        match client.collect(resort).await {
            Ok(collection) => {
                let boundary_points = collection.boundary.as_ref().map(|b| b.len()).unwrap_or(0);
                match store::save_trails(&pool, &cache, resort, &collection).await {
                    Ok(count) => {
                        success += 1;
                        tracing::info!(
                            resort = %resort.name,
                            "Saved {count} trails ({boundary_points} boundary points)"
                        );
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::error!(resort = %resort.name, "Trail save failed: {e}");
                    }
                }
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(resort = %resort.name, "Trail collection failed: {e}");
            }
        }

        if i + 1 < resorts.len() {
            tokio::time::sleep(std::time::Duration::from_secs(PAUSE_BETWEEN_RESORTS_SECS)).await;
        }
    }

    tracing::info!("Trail collection finished: {success} saved, {failed} failed");
}

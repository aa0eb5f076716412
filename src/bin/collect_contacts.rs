//! Contact-info enrichment from the places API.
//!
//! One-off/periodic task: looks each enabled resort up by name near its
//! coordinates and merges address, phone, website and opening hours into
//! the resort row. Requires `GOOGLE_MAPS_API_KEY`.

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snow_report_api::config::{AppConfig, Registry};
use snow_report_api::db::queries;
use snow_report_api::services::fetcher::HttpFetcher;
use snow_report_api::services::google_places::PlacesClient;

#[derive(Debug, Parser)]
#[command(name = "collect-contacts", about = "Enrich resort contact info")]
struct Args {
    /// Enrich a single resort by registry id
    #[arg(long)]
    resort_id: Option<i32>,

    /// Only enrich the first N enabled resorts
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

    let Some(api_key) = config.google_maps_api_key.clone() else {
        tracing::error!("GOOGLE_MAPS_API_KEY is not set; nothing to do");
        std::process::exit(1);
    };

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

    let client = PlacesClient::new(HttpFetcher::new(), api_key);

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

    let mut updated = 0usize;
    for resort in &resorts {
        match client.collect(resort).await {
            Ok(contact) => match queries::update_contact_info(&pool, resort.id, &contact).await {
                Ok(true) => {
                    updated += 1;
                    tracing::info!(resort = %resort.name, "Contact info updated");
                }
                Ok(false) => {
                    tracing::warn!(resort = %resort.name, "Resort row not found; run collect-data first");
                }
                Err(e) => tracing::error!(resort = %resort.name, "Contact save failed: {e}"),
            },
            Err(e) => tracing::warn!(resort = %resort.name, "Places lookup failed: {e}"),
        }
    }

    tracing::info!("Contact enrichment finished: {}/{} updated", updated, resorts.len());
}

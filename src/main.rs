// Snow Report API server
use axum::routing::{delete, get};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use snow_report_api::cache::Cache;
use snow_report_api::config::AppConfig;
use snow_report_api::errors;
use snow_report_api::routes::{self, AppState};
use snow_report_api::services::{monitor, normalizer, store};

/// Maximum number of connections in the database pool. Sized above the
/// collection fan-out so API reads never starve during a run.
const DB_POOL_MAX_CONNECTIONS: u32 = 30;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Snow Report API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Snow Report API",
        version = "0.1.0",
        description = "Ski resort condition aggregator. Serves the latest \
            collected snow, lift, weather, webcam and trail state for every \
            enabled resort, backed by PostgreSQL with a Redis read cache.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Resorts", description = "Resort state queries"),
        (name = "Trails", description = "Trail geometry and statistics"),
        (name = "Status", description = "Service health"),
        (name = "Admin", description = "Soft-delete administration"),
    ),
    paths(
        routes::resorts::list_resorts,
        routes::resorts::list_summaries,
        routes::resorts::get_resort_by_id,
        routes::resorts::get_resort_by_slug,
        routes::resorts::list_open_resorts,
        routes::resorts::search_resorts,
        routes::resorts::nearby_resorts,
        routes::trails::get_trails_by_id,
        routes::trails::get_trails_by_slug,
        routes::status::get_status,
        routes::admin::disable_resort,
    ),
    components(
        schemas(
            store::ResortDetail,
            store::ResortSummary,
            store::WeatherDetailOut,
            store::WeatherSummaryOut,
            store::WebcamOut,
            store::TrailOut,
            store::ElevationBlock,
            store::OpeningHours,
            normalizer::ResortStatus,
            routes::resorts::ResortListResponse,
            routes::resorts::SummaryListResponse,
            routes::resorts::ListMetadata,
            routes::trails::TrailListResponse,
            routes::trails::FiltersApplied,
            routes::status::StatusResponse,
            routes::admin::DisableResponse,
            routes::admin::DisabledResort,
            monitor::ResortReport,
            monitor::FieldCheck,
            monitor::CheckStatus,
            monitor::MonitorSummary,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snow_report_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations completed");

    // Connect the read cache
    let cache = Cache::connect(&config.redis_url, config.cache_ttl_secs)
        .await
        .expect("Failed to connect to Redis");
    tracing::info!("Cache connected: {}", config.redis_url);

    let state = AppState {
        pool,
        cache,
        admin_api_key: config.admin_api_key.clone(),
    };

    // Read-only public API; admin carries its own header check
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/resorts", get(routes::resorts::list_resorts))
        .route("/api/resorts/summary", get(routes::resorts::list_summaries))
        .route("/api/resorts/open", get(routes::resorts::list_open_resorts))
        .route("/api/resorts/search", get(routes::resorts::search_resorts))
        .route("/api/resorts/nearby", get(routes::resorts::nearby_resorts))
        .route("/api/resorts/:id", get(routes::resorts::get_resort_by_id))
        .route(
            "/api/resorts/slug/:slug",
            get(routes::resorts::get_resort_by_slug),
        )
        .route(
            "/api/resorts/:id/trails",
            get(routes::trails::get_trails_by_id),
        )
        .route(
            "/api/resorts/slug/:slug/trails",
            get(routes::trails::get_trails_by_slug),
        )
        .route("/api/status", get(routes::status::get_status))
        .route(
            "/api/admin/resorts/:id",
            delete(routes::admin::disable_resort),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}

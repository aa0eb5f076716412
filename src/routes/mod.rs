pub mod admin;
pub mod resorts;
pub mod status;
pub mod trails;

use crate::cache::Cache;
use sqlx::PgPool;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Cache,
    /// Shared secret for the admin endpoints.
    pub admin_api_key: Option<String>,
}

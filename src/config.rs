//! Application configuration and the resort registry.
//!
//! Runtime settings come from environment variables; the registry (which
//! resorts exist and which provider serves each one) is a JSON file with
//! typed descriptors. Unknown provider strings fail at load time rather
//! than at collection time.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    /// Path to the resort registry JSON file.
    pub registry_path: String,
    /// Default cache TTL for full-record keys (seconds).
    pub cache_ttl_secs: u64,
    /// Open-Meteo commercial API key; selects the customer endpoint when set.
    pub openmeteo_api_key: Option<String>,
    /// Shared secret for the admin endpoints (`X-Admin-API-Key` header).
    pub admin_api_key: Option<String>,
    /// Google Places key, used only by the contact-enrichment task.
    pub google_maps_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: database_url_from_env(),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            registry_path: std::env::var("RESORTS_CONFIG")
                .unwrap_or_else(|_| "resorts_config.json".to_string()),
            cache_ttl_secs: std::env::var("CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            openmeteo_api_key: non_empty_var("OPENMETEO_API_KEY"),
            admin_api_key: non_empty_var("ADMIN_API_KEY"),
            google_maps_api_key: non_empty_var("GOOGLE_MAPS_API_KEY"),
        }
    }
}

/// Build the database URL from `DATABASE_URL`, falling back to the
/// individual `POSTGRES_*` variables.
fn database_url_from_env() -> String {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.is_empty() {
            return url;
        }
    }
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "app".to_string());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "app".to_string());
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "snow".to_string());
    format!("postgresql://{}:{}@{}:{}/{}", user, password, host, port, db)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Resort registry
// ---------------------------------------------------------------------------

/// Which primary adapter serves a resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Mtnpowder,
    Onthesnow,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Mtnpowder => "mtnpowder",
            DataSource::Onthesnow => "onthesnow",
        }
    }
}

/// A single resort entry from the registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResortDescriptor {
    pub id: i32,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub location: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub elevation_min: Option<i32>,
    #[serde(default)]
    pub elevation_max: Option<i32>,
    pub data_source: DataSource,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    /// OnTheSnow page used as the supplementary source (webcams, count backfill).
    #[serde(default)]
    pub onthesnow_url: Option<String>,
    #[serde(default = "default_true")]
    pub onthesnow_enabled: bool,
    #[serde(default)]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ResortDescriptor {
    /// Mid elevation, used as the target for the mid banded temperature.
    pub fn elevation_mid(&self) -> Option<f64> {
        match (self.elevation_min, self.elevation_max) {
            (Some(min), Some(max)) => Some((min as f64 + max as f64) / 2.0),
            _ => None,
        }
    }
}

/// The resort registry: the source of truth for which resorts exist.
#[derive(Debug, Clone, Deserialize)]
pub struct Registry {
    pub resorts: Vec<ResortDescriptor>,
}

/// Errors raised while loading the registry file.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse registry file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("duplicate resort id {0} in registry")]
    DuplicateId(i32),
    #[error("duplicate resort slug '{0}' in registry")]
    DuplicateSlug(String),
}

impl Registry {
    /// Load and validate the registry from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path_str = path.as_ref().display().to_string();
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|source| RegistryError::Io {
            path: path_str.clone(),
            source,
        })?;
        let registry: Registry =
            serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: path_str,
                source,
            })?;
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let mut ids = std::collections::HashSet::new();
        let mut slugs = std::collections::HashSet::new();
        for resort in &self.resorts {
            if !ids.insert(resort.id) {
                return Err(RegistryError::DuplicateId(resort.id));
            }
            if !slugs.insert(resort.slug.as_str()) {
                return Err(RegistryError::DuplicateSlug(resort.slug.clone()));
            }
        }
        Ok(())
    }

    /// Resorts eligible for a collection run.
    pub fn enabled(&self) -> impl Iterator<Item = &ResortDescriptor> {
        self.resorts.iter().filter(|r| r.enabled)
    }

    pub fn find_by_id(&self, id: i32) -> Option<&ResortDescriptor> {
        self.resorts.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_json(id: i32, slug: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("Resort {id}"),
            "slug": slug,
            "location": "Somewhere, BC",
            "lat": 50.1,
            "lon": -122.9,
            "data_source": "mtnpowder",
            "source_id": "42",
            "enabled": true
        })
    }

    #[test]
    fn test_descriptor_parses_known_source() {
        let value = descriptor_json(1, "resort-1");
        let descriptor: ResortDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(descriptor.data_source, DataSource::Mtnpowder);
        assert!(descriptor.onthesnow_enabled, "defaults to enabled");
    }

    #[test]
    fn test_descriptor_rejects_unknown_source() {
        let mut value = descriptor_json(1, "resort-1");
        value["data_source"] = serde_json::json!("snowcountry");
        let result: Result<ResortDescriptor, _> = serde_json::from_value(value);
        assert!(result.is_err(), "unknown provider must fail at load");
    }

    #[test]
    fn test_registry_rejects_duplicate_slug() {
        let registry = Registry {
            resorts: vec![
                serde_json::from_value(descriptor_json(1, "same")).unwrap(),
                serde_json::from_value(descriptor_json(2, "same")).unwrap(),
            ],
        };
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::DuplicateSlug(_))
        ));
    }

    #[test]
    fn test_registry_enabled_filter() {
        let mut disabled: ResortDescriptor =
            serde_json::from_value(descriptor_json(2, "closed-hill")).unwrap();
        disabled.enabled = false;
        let registry = Registry {
            resorts: vec![
                serde_json::from_value(descriptor_json(1, "open-hill")).unwrap(),
                disabled,
            ],
        };
        let enabled: Vec<_> = registry.enabled().collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].slug, "open-hill");
    }

    #[test]
    fn test_elevation_mid() {
        let mut descriptor: ResortDescriptor =
            serde_json::from_value(descriptor_json(1, "mid")).unwrap();
        descriptor.elevation_min = Some(1000);
        descriptor.elevation_max = Some(2000);
        assert_eq!(descriptor.elevation_mid(), Some(1500.0));
        descriptor.elevation_max = None;
        assert_eq!(descriptor.elevation_mid(), None);
    }
}

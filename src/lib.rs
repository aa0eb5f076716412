//! Ski resort condition aggregator.
//!
//! A collection pipeline fetches snow, lift, weather and webcam data for
//! several hundred resorts from heterogeneous providers, normalizes every
//! payload into one canonical record, persists it to PostgreSQL and
//! invalidates the Redis read cache; a small axum API serves the latest
//! state. Trail geometry comes from a separate OpenStreetMap collection
//! path, contact info from a places lookup.

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod helpers;
pub mod routes;
pub mod services;

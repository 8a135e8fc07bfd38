//! Crime Report API Library
//!
//! Read, update, delete and list crime reports. Each report links to one
//! location (a geocoded address) and one crime type; updates keep those links
//! consistent and deletes reclaim records no report references anymore.
//!
//! # Modules
//!
//! - `auth`: Access gate (JWT bearer tokens and roles).
//! - `circuit_breaker`: Circuit breaker for the geocoding provider.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: PostgreSQL report storage.
//! - `errors`: Error handling types.
//! - `geocoder`: Address to coordinates resolution.
//! - `handlers`: HTTP request handlers and routes.
//! - `memory_store`: In-process report storage.
//! - `models`: Records, payloads and field validation.
//! - `store`: Storage traits shared by both backends.
//! - `workflow`: Report read/update/delete orchestration.

pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod geocoder;
pub mod handlers;
pub mod memory_store;
pub mod models;
pub mod store;
pub mod workflow;

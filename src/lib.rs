//! Fleet Back-Office API Library
//!
//! This library provides the core functionality for the fleet back-office
//! API, including lead classification, lead/rider storage, notifications,
//! CSV import/export, and HTTP handlers.
//!
//! # Modules
//!
//! - `classify`: Mobile normalization, lead classification and scoring.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and shared state.
//! - `import`: CSV import/export for leads and riders.
//! - `models`: Core data models and request/response types.
//! - `notifier`: Notification storage and webhook push client.
//! - `storage`: Database storage operations.
//! - `summary_cache`: Checksummed cache entries for the summary endpoint.

pub mod classify;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod import;
pub mod models;
pub mod notifier;
pub mod storage;
pub mod summary_cache;

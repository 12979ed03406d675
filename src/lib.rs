//! Batch image recompression service.
//!
//! Accepts a CSV of products with image URLs, expands each upload into
//! independent image jobs that fetch and recompress every image, tracks
//! per-batch progress with atomic counters, and notifies a webhook
//! exactly once when a batch completes.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

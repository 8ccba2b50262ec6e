//! CI push sync library.
//!
//! Keeps an in-memory index of a repository's pushes and their jobs in step
//! with a CI backend: paged push loading, delta job polling against a
//! watermark, chunked fetch-by-id with retry and derived unclassified
//! failure counters.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

//! Sync E2E test suite.
//!
//! Drives a `SyncService` against the in-memory backend through paging,
//! polling, retries and classification, checking the store after each step.
//!
//! Run with: cargo test --test sync_e2e

mod helpers;

mod test_classification;
mod test_job_fetch;
mod test_job_polling;
mod test_properties;
mod test_push_loading;
mod test_selection;

//! Keeps forum threads in step with catalog resources.
//!
//! Catalog changes arrive as stream events and are applied incrementally by
//! the handlers; the reconcile job periodically repairs whatever the
//! incremental path missed.

pub mod config;
pub mod error;
pub mod forum;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{ConfigError, ForumError, StoreError, SyncError, SyncResult};
pub use services::{CatalogEventPublisher, ForumSync, ForumTarget, SyncOutcome};

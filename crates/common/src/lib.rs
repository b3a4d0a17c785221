//! ReviewForge Common Library
//!
//! Shared code for the ReviewForge workflow engine and gateway:
//! - Domain types for manuscripts, revisions, assignments and reviews
//! - Store contract with in-memory and Postgres implementations
//! - Error types and handling
//! - Configuration management
//! - Actor identity and role checks
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod store;

// Re-export commonly used types
pub use auth::{ActorContext, Role};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use store::{InMemoryStore, ManuscriptStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

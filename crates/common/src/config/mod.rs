//! Configuration management for ReviewForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Actor authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Workflow policy knobs
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Keep manuscripts in process memory instead of Postgres
    #[serde(default)]
    pub in_memory: bool,

    /// Apply pending migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Shared secret of the identity provider; when unset the
    /// X-Actor-Id / X-Actor-Roles proxy headers are trusted
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter (debug, info, warn, error or an EnvFilter directive)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (per actor)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Scores strictly above this flag the manuscript
    #[serde(default = "default_plagiarism_threshold")]
    pub plagiarism_threshold: f64,

    /// Reviews required on the current revision before the cycle can close
    #[serde(default = "default_min_reviews")]
    pub min_reviews_to_close: u32,

    /// Overall mean at or above which aggregation recommends acceptance
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f64,

    /// Overall mean at or below which aggregation recommends rejection
    #[serde(default = "default_reject_threshold")]
    pub reject_threshold: f64,

    /// Default review window for new assignments
    #[serde(default = "default_review_window_days")]
    pub review_window_days: i64,

    /// Upper bound on any single store call
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Upper bound on waiting for a manuscript's critical section
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,

    /// Capacity of the workflow event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Open review: authors see who wrote each review
    #[serde(default)]
    pub reveal_reviewer_identity_to_author: bool,

    /// Reviewers see scores of their peers (identities stay hidden)
    #[serde(default)]
    pub reviewers_see_peer_reviews: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_database_url() -> String { "postgres://localhost/reviewforge".to_string() }
fn default_run_migrations() -> bool { true }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "reviewforge".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }
fn default_plagiarism_threshold() -> f64 { 0.3 }
fn default_min_reviews() -> u32 { 2 }
fn default_accept_threshold() -> f64 { 7.0 }
fn default_reject_threshold() -> f64 { 4.0 }
fn default_review_window_days() -> i64 { 21 }
fn default_store_timeout() -> u64 { 5000 }
fn default_lock_timeout() -> u64 { 5000 }
fn default_event_buffer() -> usize { 256 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // e.g., APP__WORKFLOW__PLAGIARISM_THRESHOLD=0.25
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject policy combinations the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.enabled && (self.rate_limit.requests_per_second == 0 || self.rate_limit.burst == 0) {
            return Err(AppError::Configuration {
                message: "rate_limit.requests_per_second and burst must be non-zero".to_string(),
            });
        }
        self.workflow.validate()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(AppError::Configuration { message });

        if !(0.0..=1.0).contains(&self.plagiarism_threshold) {
            return invalid(format!(
                "workflow.plagiarism_threshold must be within [0, 1], got {}",
                self.plagiarism_threshold
            ));
        }
        if self.min_reviews_to_close == 0 {
            return invalid("workflow.min_reviews_to_close must be at least 1".to_string());
        }
        if self.reject_threshold >= self.accept_threshold {
            return invalid(format!(
                "workflow.reject_threshold ({}) must be below accept_threshold ({})",
                self.reject_threshold, self.accept_threshold
            ));
        }
        if self.review_window_days <= 0 {
            return invalid("workflow.review_window_days must be positive".to_string());
        }
        if self.store_timeout_ms == 0 || self.lock_timeout_ms == 0 {
            return invalid("workflow timeouts must be non-zero".to_string());
        }
        if self.event_buffer == 0 {
            return invalid("workflow.event_buffer must be non-zero".to_string());
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn review_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.review_window_days)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            in_memory: false,
            run_migrations: default_run_migrations(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            plagiarism_threshold: default_plagiarism_threshold(),
            min_reviews_to_close: default_min_reviews(),
            accept_threshold: default_accept_threshold(),
            reject_threshold: default_reject_threshold(),
            review_window_days: default_review_window_days(),
            store_timeout_ms: default_store_timeout(),
            lock_timeout_ms: default_lock_timeout(),
            event_buffer: default_event_buffer(),
            reveal_reviewer_identity_to_author: false,
            reviewers_see_peer_reviews: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

//! ReviewForge API Gateway
//!
//! The HTTP surface of the manuscript workflow engine.
//! Handles:
//! - Actor identity (trusted proxy headers or identity-provider tokens)
//! - Per-actor rate limiting
//! - Request routing into the workflow engine
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Extension, Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use reviewforge_common::{
    auth::TokenVerifier,
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    metrics::{register_metrics, LATENCY_BUCKETS},
    store::{InMemoryStore, ManuscriptStore},
};
use reviewforge_workflow::{events::next_event, WorkflowEngine};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::{create_rate_limiter, ActorRateLimiter};

/// SQL migrations applied at startup, relative to the working directory
const MIGRATIONS_DIR: &str = "migrations";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<WorkflowEngine>,
    pub limiter: Option<Arc<ActorRateLimiter>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.observability);
    info!("Starting ReviewForge API Gateway v{}", reviewforge_common::VERSION);

    init_metrics(&config.observability)?;

    let store = build_store(&config).await?;
    let engine = Arc::new(WorkflowEngine::new(store, config.workflow.clone()));
    spawn_event_log(&engine);

    let limiter = if config.rate_limit.enabled {
        let limiter = create_rate_limiter(config.rate_limit.requests_per_second, config.rate_limit.burst)?;
        spawn_limiter_sweep(Arc::clone(&limiter));
        Some(limiter)
    } else {
        None
    };

    let verifier = config
        .auth
        .jwt_secret
        .as_deref()
        .map(|secret| Arc::new(TokenVerifier::new(secret)));
    if verifier.is_some() {
        info!("Bearer token verification enabled");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        config: Arc::new(config),
        engine,
        limiter,
    };
    let app = create_router(state, verifier);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Install the Prometheus exporter; port 0 turns it off
fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(LATENCY_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;

    register_metrics();
    info!(service = %config.service_name, "Prometheus metrics on {}", addr);
    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn ManuscriptStore>> {
    if config.database.in_memory {
        info!("Using in-memory manuscript store");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    info!("Connecting to database...");
    let pool = DbPool::new(&config.database)
        .await
        .context("Failed to connect to database")?;

    if config.database.run_migrations {
        pool.migrate(Path::new(MIGRATIONS_DIR))
            .await
            .context("Failed to apply migrations")?;
    }

    Ok(Arc::new(Repository::new(pool)))
}

/// Log every workflow event; stands in for a notification sink
fn spawn_event_log(engine: &WorkflowEngine) {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Some(event) = next_event(&mut events).await {
            debug!(manuscript_id = %event.manuscript_id(), event = ?event, "Workflow event");
        }
    });
}

/// Forget rate-limit buckets of actors that went quiet
fn spawn_limiter_sweep(limiter: Arc<ActorRateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    });
}

/// Create the main application router
pub fn create_router(state: AppState, verifier: Option<Arc<TokenVerifier>>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Manuscripts
        .route(
            "/manuscripts",
            get(handlers::manuscripts::list_manuscripts).post(handlers::manuscripts::create_manuscript),
        )
        .route("/manuscripts/{id}", get(handlers::manuscripts::get_manuscript))
        .route("/manuscripts/{id}/plagiarism", post(handlers::manuscripts::record_plagiarism))
        .route("/manuscripts/{id}/close", post(handlers::manuscripts::close_review_cycle))
        .route("/manuscripts/{id}/decision", post(handlers::manuscripts::decide))
        .route("/manuscripts/{id}/revisions", post(handlers::manuscripts::submit_revision))
        .route(
            "/manuscripts/{id}/revisions/{revision}/aggregate",
            get(handlers::manuscripts::get_aggregate),
        )

        // Assignments and reviews
        .route("/manuscripts/{id}/assignments", post(handlers::reviews::assign_reviewer))
        .route(
            "/manuscripts/{id}/assignments/decline",
            post(handlers::reviews::decline_assignment),
        )
        .route(
            "/manuscripts/{id}/reviews",
            get(handlers::reviews::list_reviews).post(handlers::reviews::submit_review),
        )
        .route("/assignments/pending", get(handlers::reviews::pending_assignments))
        .route("/reviews/mine", get(handlers::reviews::my_reviews))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit))
        .route_layer(from_fn(middleware::metrics::track_requests));

    // Health endpoints (no actor, no rate limit)
    let health_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready));

    let mut app = Router::new()
        .nest("/v1", api_routes)
        .merge(health_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state);

    if let Some(verifier) = verifier {
        app = app.layer(Extension(verifier));
    }

    app
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

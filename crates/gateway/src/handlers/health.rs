//! Liveness and readiness endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub store: StoreCheck,
}

/// Outcome of the store round trip
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreCheck {
    Up { latency_ms: u64 },
    Down { error: &'static str },
}

/// Process is up; never touches the store
pub async fn health() -> Json<Liveness> {
    Json(Liveness {
        status: "healthy",
        version: reviewforge_common::VERSION,
    })
}

/// 200 once the store answers a ping, 503 otherwise
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let started = Instant::now();

    match state.engine.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready",
                store: StoreCheck::Up {
                    latency_ms: started.elapsed().as_millis() as u64,
                },
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "not_ready",
                    store: StoreCheck::Down {
                        error: "store unavailable",
                    },
                }),
            )
        }
    }
}

//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::domain::TargetError;
use crate::tracking::{PunctualityStats, TrackRequest, WatchRequest};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/departures", get(departures))
        .route("/statistics", get(statistics))
        .route("/watch", post(watch_train))
        .route("/track", post(track_connection))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// The list returned by the latest update cycle.
async fn departures(State(state): State<AppState>) -> Json<DeparturesResponse> {
    let coordinator = state.coordinator.lock().await;

    Json(DeparturesResponse {
        station: coordinator.config().station.clone(),
        summary: coordinator.summary().map(str::to_string),
        departures: coordinator.departure_records(),
        issues: coordinator.issues(),
        consecutive_errors: coordinator.consecutive_errors(),
    })
}

/// Punctuality over the last 24 hours.
async fn statistics(State(state): State<AppState>) -> Json<PunctualityStats> {
    Json(state.coordinator.lock().await.statistics())
}

/// Watch a train for delay, platform and cancellation changes.
async fn watch_train(
    State(state): State<AppState>,
    Json(request): Json<WatchRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    state.coordinator.lock().await.watch_train(request)?;
    Ok(Json(CommandResponse::ok()))
}

/// Track an onward connection at a change station.
async fn track_connection(
    State(state): State<AppState>,
    Json(request): Json<TrackRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    if request.change_station.trim().is_empty() {
        return Err(AppError::BadRequest {
            message: "change_station must not be empty".to_string(),
        });
    }
    state.coordinator.lock().await.track_connection(request);
    Ok(Json(CommandResponse::ok()))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
}

impl From<TargetError> for AppError {
    fn from(e: TargetError) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
        };

        tracing::warn!(%status, %message, "request rejected");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

//! Request handlers and error-to-status mapping.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;

use crate::chain::ChainRequest;
use crate::error::GhostwriterError;
use crate::server::AppState;

/// Map a chain error onto its transport status.
pub fn status_for(err: &GhostwriterError) -> StatusCode {
    match err {
        GhostwriterError::EmptyInput | GhostwriterError::InvalidId(_) => StatusCode::BAD_REQUEST,
        GhostwriterError::BudgetExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /multi_chain - run the full stage pipeline for one request.
pub async fn multi_chain(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChainRequest>,
) -> Response {
    match state.chain.run(&request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            let status = status_for(&err);
            if status.is_server_error() {
                error!("chain failed: {}", err);
            }
            (status, Json(json!({ "detail": err.to_string() }))).into_response()
        }
    }
}

/// GET /healthz
pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

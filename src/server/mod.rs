//! HTTP surface - the /multi_chain handler plus health and metrics.
//!
//! Thin framing only; all pipeline behavior lives in the chain executor.

pub mod metrics;
pub mod routes;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::chain::MultiModelChain;
use self::metrics::Metrics;

/// Shared state handed to every handler.
pub struct AppState {
    pub chain: MultiModelChain,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(chain: MultiModelChain) -> Self {
        Self {
            chain,
            metrics: Metrics::new(),
        }
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/multi_chain", post(routes::multi_chain))
        .route("/healthz", get(routes::healthz))
        .route("/metrics", get(metrics::exposition))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics::track_requests,
        ))
        .with_state(state)
}

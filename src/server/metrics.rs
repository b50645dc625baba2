//! Prometheus instrumentation for the HTTP surface.
//!
//! Request counter by method/endpoint/status, latency histogram by endpoint,
//! and a process uptime gauge, exposed at /metrics.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::warn;
use prometheus::{Encoder, Gauge, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::server::AppState;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Registry plus the collectors the service exports.
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_latency: HistogramVec,
    uptime: Gauge,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("ghostwriter_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "http_status"],
        )
        .unwrap_or_else(|e| panic!("invalid requests_total metric: {}", e));

        let request_latency = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "ghostwriter_request_latency_seconds",
                "Latency of HTTP requests in seconds",
            ),
            &["endpoint"],
        )
        .unwrap_or_else(|e| panic!("invalid request_latency metric: {}", e));

        let uptime = Gauge::new("ghostwriter_uptime_seconds", "Application uptime in seconds")
            .unwrap_or_else(|e| panic!("invalid uptime metric: {}", e));

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(request_latency.clone()),
            Box::new(uptime.clone()),
        ] {
            if let Err(e) = registry.register(collector) {
                warn!("metric registration failed: {}", e);
            }
        }

        Self {
            registry,
            requests_total,
            request_latency,
            uptime,
            started_at: Instant::now(),
        }
    }

    /// Record one finished request.
    pub fn observe(&self, method: &str, endpoint: &str, status: u16, latency_s: f64) {
        self.requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.request_latency
            .with_label_values(&[endpoint])
            .observe(latency_s);
    }

    /// Render the exposition text.
    pub fn render(&self) -> String {
        self.uptime.set(self.started_at.elapsed().as_secs_f64());

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!("metrics encoding failed: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware instrumenting every request.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let endpoint = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    state.metrics.observe(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// GET /metrics
pub async fn exposition(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_render() {
        let metrics = Metrics::new();
        metrics.observe("POST", "/multi_chain", 200, 0.123);
        metrics.observe("POST", "/multi_chain", 402, 0.001);

        let text = metrics.render();
        assert!(text.contains("ghostwriter_requests_total"));
        assert!(text.contains("ghostwriter_request_latency_seconds"));
        assert!(text.contains("ghostwriter_uptime_seconds"));
        assert!(text.contains("http_status=\"402\""));
    }

    #[test]
    fn test_uptime_advances() {
        let metrics = Metrics::new();
        let first = metrics.render();
        assert!(first.contains("ghostwriter_uptime_seconds"));
        // Uptime is refreshed on every render
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.render();
        assert!(metrics.uptime.get() > 0.0);
    }
}

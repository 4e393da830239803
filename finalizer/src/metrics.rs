//! Prometheus counters and the `/metrics` endpoint.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use prometheus_client::{encoding::text::encode, metrics::counter::Counter, registry::Registry};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info};

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub events_received: Counter,
    pub duplicate_events: Counter,
    pub already_finalized: Counter,
    pub finalized: Counter,
    pub failed: Counter,
}

impl Metrics {
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "events_received",
            "NeedsFinalization events received",
            self.events_received.clone(),
        );
        registry.register(
            "duplicate_events",
            "Events ignored because the game was already claimed",
            self.duplicate_events.clone(),
        );
        registry.register(
            "already_finalized",
            "Games found finalized before decryption",
            self.already_finalized.clone(),
        );
        registry.register(
            "finalized",
            "Results committed to the ledger",
            self.finalized.clone(),
        );
        registry.register(
            "failed",
            "Finalizations that failed",
            self.failed.clone(),
        );
    }
}

async fn metrics_handler(
    State(registry): State<Arc<Registry>>,
) -> Result<Response<Body>, StatusCode> {
    let mut body = String::new();
    if let Err(err) = encode(&mut body, &registry) {
        error!("metrics encoding failed: {err}");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )
        .body(Body::from(body))
        .map_err(|err| {
            error!("metrics response build failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry)
}

/// Serve `registry` on `addr` in the background.
pub fn spawn_server(addr: SocketAddr, registry: Arc<Registry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!("metrics server bind failed on {addr}: {err}");
                return;
            }
        };
        info!(%addr, "serving metrics");
        if let Err(err) = axum::serve(listener, router(registry).into_make_service()).await {
            error!("metrics server failed on {addr}: {err}");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = Metrics::default();
        let mut registry = Registry::default();
        metrics.register(&mut registry);
        metrics.finalized.inc();
        metrics.duplicate_events.inc_by(2);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::new(registry));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body = reqwest::get(format!("http://{addr}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("finalized_total 1"));
        assert!(body.contains("duplicate_events_total 2"));
        assert!(body.contains("events_received_total 0"));
    }
}

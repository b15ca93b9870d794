use crate::exposition::{self, ServerMetrics, CONTENT_TYPE};
use crate::Prober;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

#[derive(Clone)]
struct AppState {
    prober: Prober,
    metrics: ServerMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeParams {
    target: Option<String>,
    chainid: Option<String>,
}

pub struct ProbeServer {
    state: AppState,
    prometheus_handle: Option<PrometheusHandle>,
}

impl ProbeServer {
    pub fn new(prober: Prober) -> Self {
        Self {
            state: AppState {
                prober,
                metrics: ServerMetrics::default(),
            },
            prometheus_handle: None,
        }
    }

    /// Serve the process-wide recorder on `/metrics`
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(handle);
        self
    }

    pub fn router(self) -> Router {
        let router = Router::new()
            .route("/probe", get(probe_handler))
            .route("/health", get(health_handler));

        let router = match self.prometheus_handle {
            Some(handle) => router.route("/metrics", get(move || metrics_handler(handle))),
            None => router,
        };

        router.with_state(self.state)
    }

    pub async fn serve(self, addr: &str) -> eyre::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Probe server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

/// Always answers 200: probe failures are reported through the metric values
async fn probe_handler(
    State(state): State<AppState>,
    Query(params): Query<ProbeParams>,
) -> impl IntoResponse {
    let target = params.target.unwrap_or_default();
    let chain_id = params.chainid.unwrap_or_default();

    let record = state.prober.probe(&target, &chain_id).await;

    state.metrics.probes_total.increment(1);
    if !record.status.is_ok() {
        state.metrics.probe_failures_total.increment(1);
    }

    (
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        exposition::render(&record),
    )
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "success": true }))
}

async fn metrics_handler(prometheus_handle: PrometheusHandle) -> String {
    prometheus_handle.render()
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully");
        },
    }
}

//! Router assembly and process lifecycle.

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{api_info, embed, health, not_found, search};
use crate::state::ServerState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Routes plus the middleware stack, outermost first: trace, request id, request
/// log, CORS, compression, deadline, body limit.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id))
        .layer(from_fn(log_requests))
        .layer(cors_layer(&state.config))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(DefaultBodyLimit::max(state.config.max_body_size()));

    Router::new()
        .route("/", get(api_info))
        .route("/embed", post(embed::embed))
        .route("/search", post(search::search))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::prometheus))
        .fallback(not_found)
        .layer(middleware)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    }
}

/// Loads the encoder, binds, and serves until Ctrl+C or SIGTERM.
///
/// The model is loaded before the listener is bound, so a bad model path fails
/// startup instead of the first request.
///
/// ```rust,no_run
/// # async fn run() -> anyhow::Result<()> {
/// let config = server::ServerConfig::load()?;
/// server::start_server(config).await
/// # }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(&config.log_level);

    let prometheus = config.metrics_enabled.then(install_prometheus).flatten();
    let state = Arc::new(ServerState::new(config.clone(), prometheus)?);
    let addr = config.socket_addr()?;

    tracing::info!(
        %addr,
        timeout_secs = config.timeout_secs,
        max_body_mb = config.max_body_size_mb,
        cors = config.enable_cors,
        prometheus = state.prometheus.is_some(),
        default_mode = ?state.default_mode,
        "binfp server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("binfp server stopped");
    Ok(())
}

/// JSON logs filtered by `log_level`; falls back to `info` on a bad directive.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn install_prometheus() -> Option<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .inspect_err(|e| tracing::warn!(error = %e, "prometheus recorder not installed"))
        .ok()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested, draining in-flight requests");
}

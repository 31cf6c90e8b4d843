//! Axum JSON API over the state query pipeline.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ifp_core::title_case;
use ifp_pipeline::{PipelineConfig, QueryError, QueryPipeline};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "ifp-web";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
}

impl AppState {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl WebConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("IFP_WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("IFP_WEB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateListing {
    state_key: String,
    state_name: String,
    slug: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/all/{state_name}", get(state_prices_handler))
        .route("/states", get(states_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let pipeline = QueryPipeline::new(PipelineConfig::from_env()?)?;
    serve(WebConfig::from_env(), AppState::new(pipeline)).await
}

pub async fn serve(config: WebConfig, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    info!(addr = %listener.local_addr()?, "serving fuel price queries");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("received shutdown signal, starting graceful shutdown");
}

async fn state_prices_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(state_name): AxumPath<String>,
) -> Response {
    match state.pipeline.query_state(&state_name).await {
        Ok(outcome) => Json(outcome.result).into_response(),
        Err(err) => query_error(err),
    }
}

async fn states_handler(State(state): State<Arc<AppState>>) -> Response {
    let states: Vec<_> = state
        .pipeline
        .states()
        .iter()
        .map(|(key, slug)| StateListing {
            state_key: key.to_string(),
            state_name: title_case(&key.replace('-', " ")),
            slug: slug.to_string(),
        })
        .collect();
    Json(states).into_response()
}

fn query_error(err: QueryError) -> Response {
    let (status, message) = match &err {
        QueryError::StateNotFound { .. } => (StatusCode::NOT_FOUND, "State not found".to_string()),
        QueryError::Fetch { url, .. } => {
            warn!(%url, error = %err, "state query aborted");
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
    };
    (status, Json(ErrorBody { error: message })).into_response()
}

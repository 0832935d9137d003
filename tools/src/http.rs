//! HTTP transport: `POST /rpc`, one JSON-RPC request per body.
//!
//! Each request opens its own store connection on a blocking thread. A
//! SQLite handle is never shared between requests, and scoring never runs
//! on the async executor.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use paysim_core::{
    config::RuleConfig,
    error::LedgerError,
    query::QueryService,
    rpc::{handle_line, RpcError, RpcResponse, PARSE_ERROR},
    store::LedgerStore,
};
use serde_json::Value;
use std::sync::Arc;

pub struct HttpState {
    /// Path or URI each request connection opens.
    pub db: String,
    pub config: RuleConfig,
}

pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .with_state(state)
}

pub async fn serve(addr: &str, state: Arc<HttpState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}/rpc");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn rpc_handler(State(state): State<Arc<HttpState>>, body: String) -> Response {
    let outcome = tokio::task::spawn_blocking(move || answer(&state, &body)).await;
    match outcome {
        Ok(Ok(response)) => {
            let status = if response.error_code() == Some(PARSE_ERROR) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, Json(response)).into_response()
        }
        Ok(Err(err)) => {
            log::warn!("http: cannot serve request: {err}");
            let status = if err.is_transient() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(RpcResponse::err(Value::Null, RpcError::from(err)))).into_response()
        }
        Err(join) => {
            log::warn!("http: request task failed: {join}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn answer(state: &HttpState, body: &str) -> Result<RpcResponse, LedgerError> {
    let service = QueryService::new(LedgerStore::open(&state.db)?, state.config.clone())?;
    Ok(handle_line(&service, body))
}

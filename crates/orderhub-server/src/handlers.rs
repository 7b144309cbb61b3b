//! HTTP API: order reads and writes, liveness and readiness.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use orderhub_cache::OrderCache;
use orderhub_core::{validate_order_external, Order};
use orderhub_storage::DynOrderStorage;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<OrderCache>,
    pub storage: DynOrderStorage,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/orders/{order_uid}", get(get_order))
        .route("/orders", post(create_order))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Invalid(String),
    Unavailable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => {
                error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Read path: cache first, storage on miss, repopulating the cache on a
/// storage hit.
async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, ApiError> {
    if let Some(order) = state.cache.get(&order_uid) {
        debug!(%order_uid, "cache hit");
        return Ok(Json((*order).clone()));
    }

    match state.storage.get_by_uid(&order_uid).await {
        Ok(order) => {
            state.cache.set(order_uid, order.clone());
            Ok(Json(order))
        }
        Err(err) if err.is_not_found() => {
            Err(ApiError::NotFound(format!("order {order_uid} not found")))
        }
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}

#[derive(Serialize)]
struct CreatedBody {
    order_uid: String,
}

/// Write path: strict validation, then the same persist-and-cache sequence
/// the queue pipeline uses.
async fn create_order(
    State(state): State<AppState>,
    Json(order): Json<Order>,
) -> Result<(StatusCode, Json<CreatedBody>), ApiError> {
    validate_order_external(&order).map_err(|err| ApiError::Invalid(err.to_string()))?;

    state.storage.save(&order).await.map_err(|err| match err {
        orderhub_storage::StorageError::Connection { .. } => {
            ApiError::Unavailable("storage unavailable".to_string())
        }
        other => ApiError::Internal(other.to_string()),
    })?;

    let order_uid = order.order_uid.clone();
    state.cache.set(order_uid.clone(), order);
    Ok((StatusCode::CREATED, Json(CreatedBody { order_uid })))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state
        .storage
        .ping()
        .await
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;
    Ok("ready")
}

//! REST API endpoints.
//!
//! Axum-based HTTP API serving SLA aggregates computed from the last
//! uploaded table, plus the admin upload endpoint.

pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::ingest::IngestError;
use crate::storage::StorageError;

use self::state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Schema(_) => (StatusCode::UNPROCESSABLE_ENTITY, "SCHEMA_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::MissingColumn { .. } | IngestError::InvalidStagePattern(_) => {
                ApiError::Schema(e.to_string())
            }
            IngestError::UnknownPeriod(_) | IngestError::InvalidRange { .. } => {
                ApiError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::PathNotFound(_) => ApiError::NotFound(e.to_string()),
            StorageError::Io(_) => ApiError::Internal(e.to_string()),
            StorageError::UnsupportedFormat(_)
            | StorageError::InvalidTable(_)
            | StorageError::Json(_)
            | StorageError::Arrow(_)
            | StorageError::Parquet(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Ignoring invalid CORS origin {:?}", origin);
            layer
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    use routes::{dashboard, upload};

    let cors = cors_layer(&state.config.server.cors_origin);
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/api/health", get(dashboard::health))
        .route("/api/periods", get(dashboard::periods))
        .route("/api/summary", get(dashboard::summary))
        .route("/api/records", get(dashboard::records))
        .route("/api/transactions", get(dashboard::transactions))
        .route("/api/vendors", get(dashboard::vendors))
        .route("/api/trend", get(dashboard::trend))
        .route("/api/counts", get(dashboard::counts))
        .route(
            "/api/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

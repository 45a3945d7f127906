mod search;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use pricegrid_cache::{CacheBackend, ProductCache};
use pricegrid_pipeline::DefaultPipeline;

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DefaultPipeline>,
    pub cache: Arc<ProductCache>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", get(search::search_products))
        .route("/channels", get(search::list_channels))
        .route("/cache/stats", get(cache_stats))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    cache: &'static str,
}

async fn health(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> impl IntoResponse {
    let cache = match state.cache.durable().entry_count().await {
        Ok(_) => "reachable",
        Err(_) => "unreachable",
    };
    Json(ApiResponse {
        data: HealthData {
            status: "healthy",
            cache,
        },
        meta: ResponseMeta::new(request_id),
    })
}

#[derive(Debug, Serialize)]
struct CacheStatsData {
    durable_entries: u64,
    fast_entries: u64,
    total_entries: u64,
}

async fn cache_stats(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<ApiResponse<CacheStatsData>>, (StatusCode, Json<ApiError>)> {
    let durable_entries = state
        .cache
        .durable()
        .entry_count()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "cache stats query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(
                    request_id.clone(),
                    "cache_unavailable",
                    "failed to read cache statistics",
                )),
            )
        })?;

    let fast_entries = match state.cache.fast() {
        Some(fast) => fast.entry_count().await.unwrap_or(0),
        None => 0,
    };

    Ok(Json(ApiResponse {
        data: CacheStatsData {
            durable_entries,
            fast_entries,
            total_entries: durable_entries + fast_entries,
        },
        meta: ResponseMeta::new(request_id),
    }))
}

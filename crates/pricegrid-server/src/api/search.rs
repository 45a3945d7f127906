//! Product search and channel listing handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use pricegrid_core::{ChannelInfo, ProductRecord};
use pricegrid_pipeline::SearchRequest;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

fn default_locale() -> String {
    "US".to_owned()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default = "default_true")]
    pub include_out_of_stock: bool,
    #[serde(default)]
    pub render: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchData {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<ProductRecord>,
    pub search_time_ms: u64,
    pub channels_used: Vec<String>,
    pub from_cache: bool,
}

pub async fn search_products(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchData>>, (StatusCode, Json<ApiError>)> {
    if params.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                request_id,
                "empty_query",
                "query must not be empty",
            )),
        ));
    }

    let request = SearchRequest {
        keyword: params.query.trim().to_owned(),
        locale: params.locale,
        max_results: params.max_results,
        include_out_of_stock: params.include_out_of_stock,
        render: params.render,
    };

    let outcome = state.pipeline.run(&request).await.map_err(|e| {
        tracing::error!(error = %e, query = %request.keyword, "search pipeline failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(
                request_id.clone(),
                "search_failed",
                e.to_string(),
            )),
        )
    })?;

    Ok(Json(ApiResponse {
        data: SearchData {
            query: outcome.query,
            total_results: outcome.records.len(),
            results: outcome.records,
            search_time_ms: outcome.search_time_ms,
            channels_used: outcome.channels_used,
            from_cache: outcome.from_cache,
        },
        meta: ResponseMeta::new(request_id),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChannelsParams {
    #[serde(default = "default_locale")]
    pub locale: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelsData {
    pub channels: Vec<ChannelInfo>,
    pub total: usize,
    pub supported_locales: Vec<String>,
}

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<ChannelsParams>,
) -> Json<ApiResponse<ChannelsData>> {
    let source = state.pipeline.channel_source();
    let channels: Vec<ChannelInfo> = source.for_locale(&params.locale).to_vec();
    let supported_locales = source
        .locales()
        .into_iter()
        .map(str::to_owned)
        .collect();

    Json(ApiResponse {
        data: ChannelsData {
            total: channels.len(),
            channels,
            supported_locales,
        },
        meta: ResponseMeta::new(request_id),
    })
}

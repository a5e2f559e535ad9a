use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use socialpulse_core::{AggregateResult, Window};
use socialpulse_pipeline::PipelineError;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SocialQuery {
    pub window: Option<String>,
}

fn map_pipeline_error(request_id: String, error: &PipelineError) -> ApiError {
    match error {
        PipelineError::Resolution(e) => ApiError::new(request_id, "bad_request", e.to_string()),
        other => {
            tracing::error!(error = %other, "social query failed");
            ApiError::new(request_id, "internal_error", "social query failed")
        }
    }
}

pub(super) async fn get_social(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(symbol): Path<String>,
    Query(query): Query<SocialQuery>,
) -> Result<Json<ApiResponse<AggregateResult>>, ApiError> {
    let window = match query.window.as_deref() {
        None | Some("") => Window::default(),
        Some(raw) => raw
            .parse::<Window>()
            .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?,
    };

    let data = state
        .pipeline
        .query(&symbol, window)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

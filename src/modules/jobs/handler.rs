use super::dto::{JobResponse, StatusUpdateRequest, StatusUpdateResponse};
use super::service::JobService;
use crate::common::callback_token::CallbackClaims;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

/// Get job status and progress
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job details", body = ApiResponse<JobResponse>),
        (status = 404, description = "Job not found")
    ),
    tag = "Jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match JobService::find_by_id(state, id).await {
        Ok(job) => ApiSuccess(
            ApiResponse::success(job, "Job retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Worker status callback
#[utoipa::path(
    put,
    path = "/api/v1/jobs/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status applied or absorbed as duplicate", body = ApiResponse<StatusUpdateResponse>),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Token issued for another job"),
        (status = 503, description = "Transient failure, retry")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<CallbackClaims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> impl IntoResponse {
    if let Err(e) = ensure_token_for_job(&claims, id) {
        return e.into_response();
    }

    if let Err(e) = payload.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    match JobService::update_status(state, id, payload).await {
        Ok(result) => {
            let message = if result.applied {
                "Status applied"
            } else {
                "Status ignored"
            };
            ApiSuccess(ApiResponse::success(result, message), StatusCode::OK).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn ensure_token_for_job(claims: &CallbackClaims, id: Uuid) -> Result<(), ApiError> {
    if claims.sub != id {
        return Err(ApiError(
            "Forbidden: token was issued for another job".to_string(),
            StatusCode::FORBIDDEN,
        ));
    }
    Ok(())
}

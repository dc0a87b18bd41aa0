use super::admission::AdmissionSnapshot;
use super::dto::{NotificationResponse, ObjectCreatedNotification};
use super::service::NotificationService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

/// Storage "object created" hook
#[utoipa::path(
    post,
    path = "/api/v1/notifications/object-created",
    request_body = ObjectCreatedNotification,
    responses(
        (status = 202, description = "Every record enqueued or absorbed as duplicate", body = ApiResponse<NotificationResponse>),
        (status = 503, description = "At least one record could not be enqueued; safe to resend", body = ApiResponse<NotificationResponse>)
    ),
    tag = "Dispatch"
)]
pub async fn object_created(
    State(state): State<AppState>,
    Json(payload): Json<ObjectCreatedNotification>,
) -> impl IntoResponse {
    let result = NotificationService::object_created(&state.scheduler, payload).await;

    if result.has_failures() {
        return ApiSuccess(
            ApiResponse::partial(result, "Some records could not be enqueued"),
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .into_response();
    }

    ApiSuccess(
        ApiResponse::success(result, "Notification accepted"),
        StatusCode::ACCEPTED,
    )
    .into_response()
}

/// Admission counter and overflow depth
#[utoipa::path(
    get,
    path = "/api/v1/admission",
    responses(
        (status = 200, description = "Current admission state", body = ApiResponse<AdmissionSnapshot>),
        (status = 503, description = "Counter store unreachable")
    ),
    tag = "Dispatch"
)]
pub async fn admission(State(state): State<AppState>) -> impl IntoResponse {
    match NotificationService::admission(&state.scheduler).await {
        Ok(snapshot) => ApiSuccess(
            ApiResponse::success(snapshot, "Admission state retrieved"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::error::DispatchError;

#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    /// An error envelope that still carries a body, e.g. per-record results.
    pub fn partial(data: T, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.to_string(),
            data: None,
        }
    }
}

pub struct ApiSuccess<T>(pub T, pub StatusCode);

impl<T> IntoResponse for ApiSuccess<ApiResponse<T>>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let (response, status) = (self.0, self.1);
        (status, Json(response)).into_response()
    }
}

#[derive(Debug)]
pub struct ApiError(pub String, pub StatusCode);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, status) = (self.0, self.1);
        let response = ApiResponse::<()>::error(&message);
        (status, Json(response)).into_response()
    }
}

/// Infrastructure failures surface as 503 so callers (workers, storage
/// notifications) retry; the operations behind them are idempotent.
impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        let status = match &e {
            DispatchError::JobNotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Token(_) => StatusCode::UNAUTHORIZED,
            DispatchError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        };
        ApiError(e.to_string(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn dispatch_errors_map_to_retryable_statuses() {
        assert_eq!(ApiError::from(DispatchError::JobNotFound(Uuid::nil())).1, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(DispatchError::queue("closed")).1, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::from(DispatchError::Timeout("run_task".into())).1,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

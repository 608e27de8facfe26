use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use torque_core::StoreError;
use torque_order::OrderError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    UnprocessableError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFoundError(what),
            StoreError::Duplicate { constraint } => {
                AppError::ConflictError(format!("duplicate value for {}", constraint))
            }
            StoreError::InsufficientStock { .. } => {
                AppError::UnprocessableError(err.to_string())
            }
            StoreError::Referenced(what) => {
                AppError::ConflictError(format!("{} is still referenced", what))
            }
            StoreError::InvalidState(msg) => AppError::UnprocessableError(msg),
            StoreError::Backend(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(msg) => AppError::ValidationError(msg),
            OrderError::ItemNotFound(id) => AppError::NotFoundError(format!("item {}", id)),
            OrderError::OrderNotFound(what) => {
                AppError::NotFoundError(format!("order {}", what))
            }
            OrderError::InsufficientStock { .. } => {
                AppError::UnprocessableError(err.to_string())
            }
            OrderError::InvalidTransition { .. } => {
                AppError::UnprocessableError(err.to_string())
            }
            OrderError::ImageUpload(msg) => {
                AppError::InternalServerError(format!("image upload failed: {}", msg))
            }
            OrderError::Store(e) => e.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

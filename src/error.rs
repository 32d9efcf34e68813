use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::models::TicketStatus;
use crate::services::ServiceError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    transition: Option<(TicketStatus, TicketStatus)>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            transition: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let (current_status, target_status) = match self.transition {
            Some((current, target)) => (Some(current), Some(target)),
            None => (None, None),
        };
        let body = Json(ErrorResponse {
            error: self.message,
            current_status,
            target_status,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_status: Option<TicketStatus>,
}

impl From<ServiceError> for AppError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::InvalidInput(message) => AppError::bad_request(message),
            ServiceError::MissingOrganization => AppError::bad_request(value.to_string()),
            ServiceError::NotFound(_) => AppError::not_found(value.to_string()),
            ServiceError::PermissionDenied(reason) => AppError::forbidden(reason),
            ServiceError::Transition(err) => {
                let mut error = AppError::bad_request(err.to_string());
                error.transition = Some((err.current, err.target));
                error
            }
            ServiceError::Persistence(detail) => {
                tracing::error!(error = %detail, "persistence failure");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
            }
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found("resource not found"),
            _ => {
                tracing::error!(error = %value, "database error");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
            }
        }
    }
}

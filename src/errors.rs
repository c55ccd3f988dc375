use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::{ApiResponse, CooldownRemaining};

/// Errors surfaced by database operations and domain rules.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("You can update your rating again in {} hours and {} minutes", .0.hours, .0.minutes)]
    Cooldown(CooldownRemaining),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{} not found", entity))
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return ServiceError::NotFound("Resource not found".into());
        }

        let code = match &err {
            sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
            _ => None,
        };

        match code.as_deref() {
            Some("23505") => ServiceError::Conflict("Resource already exists".into()),
            Some("23503") => ServiceError::NotFound("Referenced resource does not exist".into()),
            Some("23514") => ServiceError::Validation("Value violates a data constraint".into()),
            _ => ServiceError::Database(err),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::Cooldown(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Debug builds leak the driver error to ease local development.
            ServiceError::Database(err) if cfg!(debug_assertions) => {
                format!("Database error: {}", err)
            }
            ServiceError::Database(_) => "Database error".to_string(),
            ServiceError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(message))
    }
}

/// Logs a failed operation and renders it. Server faults log at error level,
/// client mistakes at warn.
pub fn failure(context: &str, err: ServiceError) -> HttpResponse {
    if err.status_code().is_server_error() {
        log::error!("{context}: {err:?}");
    } else {
        log::warn!("{context}: {err}");
    }
    err.error_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_message_reports_hours_and_minutes() {
        let err = ServiceError::Cooldown(CooldownRemaining { hours: 5, minutes: 7 });
        assert_eq!(
            err.to_string(),
            "You can update your rating again in 5 hours and 7 minutes"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err = ServiceError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            ServiceError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("no".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_rendered() {
        let response = ServiceError::Internal("secret stack".into()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

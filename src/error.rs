use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;
use tracing::error;

use crate::repository::RepositoryError;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure taxonomy of the core. Everything except `Internal` is an
/// expected outcome the caller can act on.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BusinessRule(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Validation(String),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::BusinessRule(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::Internal(anyhow::anyhow!("{error}"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "not_found",
            DomainError::BusinessRule(_) => "business_rule",
            DomainError::AccessDenied(_) => "access_denied",
            DomainError::Unauthenticated => "unauthenticated",
            DomainError::Validation(_) => "validation",
            DomainError::Internal(_) => "internal",
        }
    }
}

impl From<RepositoryError> for DomainError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(message) | RepositoryError::Constraint(message) => {
                DomainError::BusinessRule(message)
            }
            RepositoryError::Unavailable(message) => {
                DomainError::Internal(anyhow::anyhow!("repository unavailable: {message}"))
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// HTTP-facing error. Built from a [`DomainError`] or directly by the
/// extractors for malformed requests.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", "unauthorized")
    }

    pub fn internal<E: Display>(error: E) -> Self {
        error!(error = %error, "request failed with internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DomainError> for AppError {
    fn from(value: DomainError) -> Self {
        let kind = value.kind();
        match value {
            DomainError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, kind, message),
            DomainError::BusinessRule(message) => Self::new(StatusCode::BAD_REQUEST, kind, message),
            DomainError::Validation(message) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, kind, message)
            }
            DomainError::AccessDenied(message) => Self::new(StatusCode::FORBIDDEN, kind, message),
            DomainError::Unauthenticated => Self::unauthorized(),
            DomainError::Internal(err) => Self::internal(format!("{err:#}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            kind: self.kind,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(format!("{value:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_kinds_to_statuses() {
        let cases = [
            (DomainError::not_found("document not found"), StatusCode::NOT_FOUND),
            (DomainError::business_rule("duplicate"), StatusCode::BAD_REQUEST),
            (DomainError::validation("title"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                DomainError::AccessDenied("nope".into()),
                StatusCode::FORBIDDEN,
            ),
            (DomainError::Unauthenticated, StatusCode::UNAUTHORIZED),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = AppError::from(DomainError::internal("disk on fire at /var/uploads"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn repository_conflicts_become_business_rules() {
        let err = DomainError::from(RepositoryError::Conflict("email already registered".into()));
        assert!(matches!(err, DomainError::BusinessRule(ref msg) if msg == "email already registered"));
    }
}

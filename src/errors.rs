use std::collections::BTreeMap;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::JsonResponse;

/// Field-keyed validation messages, serialized as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("not found")]
    NotFound,
    #[error("invalid page")]
    InvalidPage,
    #[error("not authorized: {0}")]
    NotAuthorized(&'static str),
    #[error("token is invalid or expired")]
    InvalidToken,
    #[error("forbidden")]
    Forbidden,
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("server error: {0}")]
    ServerError(#[from] anyhow::Error),
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl RequestError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    pub fn to_json_response(&self) -> JsonResponse<Value> {
        let detail = |message: &str| json!({ "detail": message });
        let (status_code, json) = match self {
            RequestError::NotFound => (StatusCode::NOT_FOUND, detail("Not found.")),
            RequestError::InvalidPage => (StatusCode::NOT_FOUND, detail("Invalid page.")),
            RequestError::NotAuthorized(message) => (StatusCode::UNAUTHORIZED, detail(message)),
            RequestError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "detail": "Token is invalid or expired",
                    "code": "token_not_valid",
                }),
            ),
            RequestError::Forbidden => (
                StatusCode::FORBIDDEN,
                detail("You do not have permission to perform this action."),
            ),
            RequestError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                serde_json::to_value(errors).unwrap_or_default(),
            ),
            RequestError::BadRequest(message) => (StatusCode::BAD_REQUEST, detail(message)),
            RequestError::ServerError(e) => {
                tracing::error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    detail("Internal Server Error"),
                )
            }
            RequestError::DatabaseError(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    detail("Internal Server Error"),
                )
            }
        };
        (status_code, Json(json))
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}

/// True when the error is SQLite rejecting a duplicate value.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(e) => e.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

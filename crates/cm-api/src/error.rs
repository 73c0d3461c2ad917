use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{borrow::Cow, future::Future};
use thiserror::Error;
use tracing::{error, warn};

use cm_common::api::ValidationError;
use cm_common::db::RepositoryError;
use cm_common::matching::MatchError;
use cm_common::oracle::OracleError;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Strip control characters and anything that looks like a URL or path before echoing.
fn sanitize_message(message: &str) -> String {
    const MAX_CHARS: usize = 240;

    let cleaned = message
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]".to_string()
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]".to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut cleaned = if cleaned.chars().count() > MAX_CHARS {
        let mut truncated = cleaned.chars().take(MAX_CHARS).collect::<String>();
        truncated.push('…');
        truncated
    } else {
        cleaned
    };

    if cleaned.trim().is_empty() {
        cleaned = "unexpected error".to_string();
    }
    cleaned
}

pub async fn with_request_id<Fut, T>(request_id: Option<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    match request_id {
        Some(request_id) => REQUEST_ID.scope(request_id, fut).await,
        None => fut.await,
    }
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|value| value.clone()).ok()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    /// HTTP status and stable machine-readable code.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "too_many_requests"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            Self::BadGateway(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Only client errors echo their detail; everything else gets a fixed phrase.
    fn public_message(&self) -> Cow<'static, str> {
        match self {
            Self::BadRequest(detail) | Self::NotFound(detail) => Cow::Owned(sanitize_message(detail)),
            Self::Unauthorized(_) => Cow::Borrowed("unauthorized"),
            Self::TooManyRequests(_) => Cow::Borrowed("too many requests"),
            Self::ServiceUnavailable(_) => Cow::Borrowed("service unavailable"),
            Self::BadGateway(_) => Cow::Borrowed("LLM provider request failed"),
            Self::Database(_) | Self::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.classify();
        let request_id = current_request_id();

        let rid = request_id.as_deref().unwrap_or("");
        if status.is_server_error() {
            error!(code, %status, request_id = rid, error = %self, "request failed");
        } else {
            warn!(code, %status, request_id = rid, error = %self, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            code,
            message: self.public_message().into_owned(),
            request_id,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        ApiError::Database(value.to_string())
    }
}

impl From<MatchError> for ApiError {
    fn from(value: MatchError) -> Self {
        match value {
            MatchError::Repository(err) => err.into(),
            MatchError::PackageNotFound(_) => ApiError::NotFound("Package not found".into()),
            MatchError::NoCaregivers => ApiError::NotFound("No caregivers available".into()),
            MatchError::Oracle(OracleError::NotConfigured) => {
                ApiError::ServiceUnavailable("LLM oracle is not configured".into())
            }
            MatchError::Oracle(err) => ApiError::BadGateway(err.to_string()),
        }
    }
}

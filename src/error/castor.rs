use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::IsRetryable;
use super::oauth::OauthError;

#[derive(Debug, ThisError)]
pub enum CastorError {
    /// The pool holds no usable identity at all.
    #[error("identity pool is empty; add accounts first")]
    NoIdentitiesAvailable,

    /// Every rotation attempt failed; detail names the identities tried.
    #[error("all accounts exhausted: {detail}")]
    AllExhausted { detail: String },

    /// Upstream returned a non-2xx that is not rotation-eligible.
    #[error("upstream error with status {status}")]
    UpstreamHttp { status: StatusCode, body: String },

    #[error(transparent)]
    Oauth(#[from] OauthError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stream protocol error: {0}")]
    StreamProtocol(String),

    #[error("actor error: {0}")]
    Actor(String),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for CastorError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            CastorError::NoIdentitiesAvailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorObject {
                    code: "NO_IDENTITIES".to_string(),
                    message: "No available accounts to process the request.".to_string(),
                    details: None,
                },
            ),

            CastorError::AllExhausted { detail } => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorObject {
                    code: "ALL_EXHAUSTED".to_string(),
                    message: detail,
                    details: None,
                },
            ),

            CastorError::UpstreamHttp { status, body } => (
                status,
                ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: format!("Upstream error: {status}"),
                    details: (!body.is_empty()).then(|| Value::String(body)),
                },
            ),

            CastorError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: "BAD_REQUEST".to_string(),
                    message,
                    details: None,
                },
            ),

            CastorError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject {
                    code: "NOT_FOUND".to_string(),
                    message,
                    details: None,
                },
            ),

            CastorError::Oauth(oauth) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject {
                    code: "AUTH_FAILURE".to_string(),
                    message: oauth.to_string(),
                    details: None,
                },
            ),

            CastorError::Reqwest(_) | CastorError::StreamProtocol(_) | CastorError::Json(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: "Upstream service error.".to_string(),
                    details: None,
                },
            ),

            CastorError::Actor(_) | CastorError::Url(_) | CastorError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                },
            ),
        };
        (status, Json(ApiErrorBody { inner: body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

impl IsRetryable for CastorError {
    fn is_retryable(&self) -> bool {
        match self {
            CastorError::Reqwest(_) => true,
            CastorError::UpstreamHttp { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            CastorError::Oauth(oauth) => oauth.is_retryable(),
            _ => false,
        }
    }
}

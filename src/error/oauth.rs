use axum::http::StatusCode;
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use thiserror::Error as ThisError;

use super::IsRetryable;

#[derive(Debug, ThisError)]
pub enum OauthError {
    #[error("OAuth2 request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OAuth2 upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    /// The token endpoint rejected the grant itself (e.g. revoked refresh
    /// token). Not retryable.
    #[error("OAuth2 server response error: {error}")]
    ServerResponse { error: String },

    #[error("OAuth2 token endpoint parse error: {message}")]
    Parse { message: String },

    #[error("OAuth2 unexpected error: {message}")]
    Other { message: String },
}

impl IsRetryable for OauthError {
    fn is_retryable(&self) -> bool {
        match self {
            OauthError::Request(_) | OauthError::Parse { .. } => true,
            OauthError::UpstreamStatus(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

type TokenEndpointError = RequestTokenError<
    HttpClientError<ReqwestClientError>,
    StandardErrorResponse<BasicErrorResponseType>,
>;

impl From<TokenEndpointError> for OauthError {
    fn from(e: TokenEndpointError) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => OauthError::ServerResponse {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(wrapper) => match wrapper {
                HttpClientError::Reqwest(real_err) => OauthError::Request(*real_err),
                other => OauthError::Other {
                    message: format!("HttpClientError: {other:?}"),
                },
            },
            RequestTokenError::Parse(parse_err, _body) => OauthError::Parse {
                message: parse_err.to_string(),
            },
            RequestTokenError::Other(s) => OauthError::Other { message: s },
        }
    }
}

impl From<TokenEndpointError> for crate::error::CastorError {
    fn from(e: TokenEndpointError) -> Self {
        OauthError::from(e).into()
    }
}

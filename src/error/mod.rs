mod castor;
mod oauth;

pub use castor::{ApiErrorBody, ApiErrorObject, CastorError};
pub use oauth::OauthError;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

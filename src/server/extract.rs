use crate::error::CastorError;
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// JSON extractor that maps every parse rejection to a protocol-neutral 400.
pub struct CastorJson<T>(pub T);

impl<S, T> FromRequest<S> for CastorJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = CastorError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(CastorJson(value)),
            Err(rejection) => Err(CastorError::BadRequest(format!(
                "Invalid request format: {rejection}"
            ))),
        }
    }
}

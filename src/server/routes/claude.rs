use crate::alias;
use crate::dispatch::{DispatchReply, dispatch};
use crate::error::CastorError;
use crate::server::extract::CastorJson;
use crate::server::respond;
use crate::server::router::CastorState;
use crate::translate::{Protocol, claude as translate};
use axum::{Json, extract::State, response::IntoResponse, response::Response};
use castor_schema::GenerateContentResponse;
use castor_schema::claude::MessagesRequest;
use serde_json::{Value, json};

pub async fn messages(
    State(state): State<CastorState>,
    CastorJson(request): CastorJson<MessagesRequest>,
) -> Result<Response, CastorError> {
    let upstream_model = alias::resolve_claude(&state.db, &request.model).await;
    let body = serde_json::to_value(translate::to_gemini(&request))
        .map_err(|e| CastorError::BadRequest(format!("unserializable request: {e}")))?;

    let reply = dispatch(
        &state.pool,
        state.backend.as_ref(),
        &state.db,
        Protocol::Claude,
        &upstream_model,
        body,
        request.stream,
    )
    .await?;

    // Responses echo the caller's model name, not the mapped upstream one.
    match reply {
        DispatchReply::Unary(value) => {
            let upstream: GenerateContentResponse = serde_json::from_value(value)?;
            Ok(Json(translate::from_gemini(&upstream, &request.model)).into_response())
        }
        DispatchReply::Stream(frames) => Ok(respond::claude_stream(frames, request.model)),
    }
}

/// Token counting is estimated at four bytes per token over the serialized
/// request.
pub async fn count_tokens(
    CastorJson(body): CastorJson<Value>,
) -> Result<Json<Value>, CastorError> {
    let serialized = serde_json::to_string(&body)?;
    Ok(Json(json!({"input_tokens": serialized.len() / 4})))
}

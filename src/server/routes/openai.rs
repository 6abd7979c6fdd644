use crate::alias;
use crate::dispatch::{DispatchReply, dispatch};
use crate::error::CastorError;
use crate::server::extract::CastorJson;
use crate::server::respond;
use crate::server::router::CastorState;
use crate::translate::{Protocol, openai as translate};
use axum::{Json, extract::State, response::IntoResponse, response::Response};
use castor_schema::GenerateContentResponse;
use castor_schema::openai::{ChatCompletionRequest, OpenAiModelList};

pub async fn chat_completions(
    State(state): State<CastorState>,
    CastorJson(request): CastorJson<ChatCompletionRequest>,
) -> Result<Response, CastorError> {
    let model = alias::resolve_openai(&state.db, &request.model).await;
    let body = serde_json::to_value(translate::to_gemini(&request))
        .map_err(|e| CastorError::BadRequest(format!("unserializable request: {e}")))?;

    let reply = dispatch(
        &state.pool,
        state.backend.as_ref(),
        &state.db,
        Protocol::OpenAi,
        &model,
        body,
        request.stream,
    )
    .await?;

    match reply {
        DispatchReply::Unary(value) => {
            let upstream: GenerateContentResponse = serde_json::from_value(value)?;
            Ok(Json(translate::from_gemini(&upstream, &model)).into_response())
        }
        DispatchReply::Stream(frames) => Ok(respond::openai_stream(frames, model)),
    }
}

pub async fn list_models(State(state): State<CastorState>) -> Json<OpenAiModelList> {
    Json(OpenAiModelList::from_model_names(
        state.model_list.iter().cloned(),
        "antigravity",
    ))
}

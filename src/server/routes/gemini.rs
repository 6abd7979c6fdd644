use crate::alias;
use crate::dispatch::{DispatchReply, dispatch};
use crate::error::CastorError;
use crate::server::extract::CastorJson;
use crate::server::respond;
use crate::server::router::CastorState;
use crate::translate::Protocol;
use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use castor_schema::GeminiModelList;
use serde_json::{Value, json};

/// `POST /v1beta/models/{model}:generateContent` (or
/// `:streamGenerateContent`). The body passes through untranslated; only the
/// envelope is added.
pub async fn generate(
    State(state): State<CastorState>,
    Path(model_action): Path<String>,
    CastorJson(body): CastorJson<Value>,
) -> Result<Response, CastorError> {
    let (model, method) = match model_action.rsplit_once(':') {
        Some((model, method)) => (model.to_string(), method.to_string()),
        None => (model_action, "generateContent".to_string()),
    };

    let stream = match method.as_str() {
        "generateContent" => false,
        "streamGenerateContent" => true,
        other => {
            return Err(CastorError::BadRequest(format!(
                "Unsupported method: {other}"
            )));
        }
    };

    let mapped = alias::resolve_gemini(&state.db, &model).await;

    let reply = dispatch(
        &state.pool,
        state.backend.as_ref(),
        &state.db,
        Protocol::Gemini,
        &mapped,
        body,
        stream,
    )
    .await?;

    match reply {
        DispatchReply::Unary(value) => Ok(Json(value).into_response()),
        DispatchReply::Stream(frames) => Ok(respond::gemini_stream(frames)),
    }
}

pub async fn list_models(State(state): State<CastorState>) -> Json<GeminiModelList> {
    Json(GeminiModelList::from_model_names(
        state.model_list.iter().cloned(),
    ))
}

pub async fn get_model(Path(model): Path<String>) -> Json<Value> {
    Json(json!({
        "name": format!("models/{model}"),
        "displayName": model,
        "supportedGenerationMethods": ["generateContent", "countTokens"],
    }))
}

pub async fn count_tokens(
    Path(_model): Path<String>,
    CastorJson(body): CastorJson<Value>,
) -> Result<Json<Value>, CastorError> {
    let serialized = serde_json::to_string(&body)?;
    Ok(Json(json!({"totalTokens": serialized.len() / 4})))
}

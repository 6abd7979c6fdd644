use crate::dispatch::{DispatchReply, dispatch};
use crate::error::CastorError;
use crate::server::extract::CastorJson;
use crate::server::router::CastorState;
use crate::translate::{Protocol, image as translate};
use axum::{Json, extract::State};
use castor_schema::GenerateContentResponse;
use castor_schema::openai::{ImageGenerationRequest, ImageGenerationResponse};
use chrono::Utc;

pub async fn generations(
    State(state): State<CastorState>,
    CastorJson(request): CastorJson<ImageGenerationRequest>,
) -> Result<Json<ImageGenerationResponse>, CastorError> {
    let aspect_ratio =
        translate::aspect_ratio_for(request.model.as_deref(), request.size.as_deref());
    let body = serde_json::to_value(translate::build_request(&request.prompt, aspect_ratio))
        .map_err(|e| CastorError::BadRequest(format!("unserializable request: {e}")))?;

    let reply = dispatch(
        &state.pool,
        state.backend.as_ref(),
        &state.db,
        Protocol::ImageGen,
        translate::IMAGE_MODEL,
        body,
        false,
    )
    .await?;

    let DispatchReply::Unary(value) = reply else {
        return Err(CastorError::StreamProtocol(
            "image generation is never streamed".to_string(),
        ));
    };
    let upstream: GenerateContentResponse = serde_json::from_value(value)?;

    let response_format = request.response_format.as_deref().unwrap_or("b64_json");
    Ok(Json(ImageGenerationResponse {
        created: Utc::now().timestamp(),
        data: translate::collect_images(&upstream, response_format),
    }))
}

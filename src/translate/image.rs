//! Image-generation helpers: aspect-ratio derivation, the fixed upstream
//! body, and response repackaging.

use castor_schema::gemini::{
    Content, GenerateContentRequest, GenerationConfig, Part,
};
use castor_schema::openai::ImageObject;
use serde_json::json;

/// Upstream model used for all image generation.
pub const IMAGE_MODEL: &str = "gemini-3-pro-image";

/// Aspect ratio from an explicit `-WxH` suffix or a `WxH` size string.
/// Returns `None` when the string matches neither pattern.
pub fn parse_aspect_ratio(spec: &str) -> Option<&'static str> {
    for (suffix, ratio) in [
        ("-16x9", "16:9"),
        ("-9x16", "9:16"),
        ("-4x3", "4:3"),
        ("-3x4", "3:4"),
        ("-1x1", "1:1"),
    ] {
        if spec.contains(suffix) {
            return Some(ratio);
        }
    }

    let lowered = spec.to_ascii_lowercase();
    let (w, h) = lowered.split_once('x')?;
    let (w, h): (f64, f64) = (w.trim().parse().ok()?, h.trim().parse().ok()?);
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some(if (w - h).abs() < f64::EPSILON {
        "1:1"
    } else if w > h {
        if w / h > 1.5 { "16:9" } else { "4:3" }
    } else if h / w > 1.5 {
        "9:16"
    } else {
        "3:4"
    })
}

/// Resolve the aspect ratio for a request: model-name suffix first, then the
/// size string, then square.
pub fn aspect_ratio_for(model: Option<&str>, size: Option<&str>) -> &'static str {
    model
        .and_then(parse_aspect_ratio)
        .or_else(|| size.and_then(parse_aspect_ratio))
        .unwrap_or("1:1")
}

/// Fixed upstream body: one user prompt, no tools, no system instruction.
pub fn build_request(prompt: &str, aspect_ratio: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(prompt)])],
        generation_config: Some(GenerationConfig {
            max_output_tokens: Some(64_000),
            image_config: Some(json!({"aspectRatio": aspect_ratio})),
            ..GenerationConfig::default()
        }),
        ..GenerateContentRequest::default()
    }
}

/// Repackage `inlineData` parts per the caller's `response_format`.
pub fn collect_images(
    response: &castor_schema::GenerateContentResponse,
    response_format: &str,
) -> Vec<ImageObject> {
    let mut images = Vec::new();
    for candidate in &response.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in &content.parts {
            let Some(inline) = &part.inline_data else {
                continue;
            };
            if inline.data.is_empty() {
                continue;
            }
            if response_format == "url" {
                images.push(ImageObject {
                    url: Some(format!(
                        "data:{};base64,{}",
                        inline.mime_type, inline.data
                    )),
                    ..ImageObject::default()
                });
            } else {
                images.push(ImageObject {
                    b64_json: Some(inline.data.clone()),
                    ..ImageObject::default()
                });
            }
        }
    }
    images
}

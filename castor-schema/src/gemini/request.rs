use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Content, GenerationConfig, SafetySetting};

/// Gemini `generateContent` / `streamGenerateContent` request body.
///
/// Built by the protocol translators; native Gemini traffic is forwarded as
/// raw JSON and never passes through this type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,

    /// Tool declarations: `{"functionDeclarations": [...]}` entries plus
    /// built-in tools such as `{"googleSearch": {}}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub safety_settings: Vec<SafetySetting>,
}

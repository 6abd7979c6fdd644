use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single conversation turn or system instruction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Content {
    /// Usually `"user"` or `"model"`. Absent for `systemInstruction`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Ordered parts that constitute a single message.
    #[serde(default)]
    pub parts: Vec<Part>,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
            extra: BTreeMap::new(),
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts,
            extra: BTreeMap::new(),
        }
    }

    /// System instruction content: a bare text part with no role.
    pub fn system_text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
            extra: BTreeMap::new(),
        }
    }
}

/// One atomic piece of content inside a `Content` turn.
///
/// At most one data field is populated per part; `thought` may accompany a
/// text part to mark model deliberation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Optional model-thought marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<Value>,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Text part flagged as model thought.
    pub fn thought_text(text: impl Into<String>) -> Self {
        Self {
            thought: Some(true),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                args,
            }),
            ..Self::default()
        }
    }

    /// True for plain (non-thought) text.
    pub fn is_visible_text(&self) -> bool {
        self.text.is_some() && self.thought != Some(true)
    }
}

/// Inline base64 media bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// URI-based file reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

/// Function call produced by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

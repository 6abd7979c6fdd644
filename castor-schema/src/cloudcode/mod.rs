//! `v1internal` envelope types for the cloudcode-pa upstream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request wrapper accepted by `v1internal:generateContent` and
/// `v1internal:streamGenerateContent`.
///
/// `request` stays a raw value: translated traffic serializes a typed
/// [`crate::gemini::GenerateContentRequest`] into it, native Gemini traffic
/// is forwarded untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateEnvelope {
    pub project: String,
    pub request_id: String,
    pub request: Value,
    pub model: String,
    pub user_agent: String,
    pub request_type: String,
}

/// Unwrap the `v1internal` response wrapper when present.
///
/// Unary responses and individual SSE frames both arrive either bare or as
/// `{"response": {...}}`; bare payloads pass through unchanged.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("response") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// `v1internal:fetchAvailableModels` response, reduced to the quota fields
/// the pool scheduler reads.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AvailableModels {
    #[serde(default)]
    pub models: BTreeMap<String, AvailableModel>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AvailableModel {
    #[serde(default)]
    pub quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuotaInfo {
    #[serde(default)]
    pub remaining_fraction: Option<f64>,
}

impl AvailableModels {
    /// Remaining-quota fraction for one model, if reported.
    pub fn remaining_fraction(&self, model: &str) -> Option<f64> {
        self.models
            .get(model)
            .and_then(|m| m.quota_info.as_ref())
            .and_then(|q| q.remaining_fraction)
    }
}

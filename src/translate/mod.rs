//! Stateless protocol translation between the three caller wire formats and
//! the Gemini shapes the upstream accepts.

pub mod claude;
pub mod image;
pub mod openai;
mod schema_clean;

pub use schema_clean::clean_schema;

use crate::pool::QuotaGroup;
use castor_schema::GenerateEnvelope;
use serde_json::Value;
use uuid::Uuid;

/// `userAgent` tag carried inside the request envelope.
pub const ENVELOPE_USER_AGENT: &str = "antigravity-rs";

/// Which caller protocol a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    OpenAi,
    Claude,
    Gemini,
    ImageGen,
}

impl Protocol {
    /// Prefix of the upstream `requestId`.
    pub fn request_id_prefix(self) -> &'static str {
        match self {
            Protocol::OpenAi => "openai",
            Protocol::Claude => "claude",
            Protocol::Gemini => "gemini",
            Protocol::ImageGen => "agent",
        }
    }

    /// Tag written into usage records.
    pub fn usage_tag(self) -> &'static str {
        match self {
            Protocol::OpenAi => "openai",
            Protocol::Claude => "claude",
            Protocol::Gemini => "gemini",
            Protocol::ImageGen => "image_gen",
        }
    }

    /// Which quota the pool charges this protocol against.
    pub fn quota_group(self) -> QuotaGroup {
        match self {
            Protocol::OpenAi | Protocol::Gemini => QuotaGroup::Gemini,
            Protocol::Claude => QuotaGroup::Claude,
            Protocol::ImageGen => QuotaGroup::ImageGen,
        }
    }

    fn request_type(self) -> &'static str {
        match self {
            Protocol::ImageGen => "image_gen",
            _ => "generate_content",
        }
    }
}

/// Wrap a translated (or pass-through) request body in the `v1internal`
/// envelope with a fresh protocol-prefixed request id.
pub fn wrap_request(
    project_id: &str,
    model: &str,
    protocol: Protocol,
    request: Value,
) -> GenerateEnvelope {
    GenerateEnvelope {
        project: project_id.to_string(),
        request_id: format!("{}-{}", protocol.request_id_prefix(), Uuid::new_v4()),
        request,
        model: model.to_string(),
        user_agent: ENVELOPE_USER_AGENT.to_string(),
        request_type: protocol.request_type().to_string(),
    }
}

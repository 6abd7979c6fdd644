use crate::error::CastorError;
use async_trait::async_trait;
use castor_schema::GenerateEnvelope;
use futures::stream::BoxStream;
use serde_json::Value;

/// Stream of unwrapped upstream JSON frames (one per SSE `data:` line).
pub type FrameStream = BoxStream<'static, Result<Value, CastorError>>;

/// The generate surface of the upstream, as the dispatcher sees it.
///
/// The production implementation is [`super::CloudCodeClient`]; tests drive
/// the dispatch loop with scripted fakes.
#[async_trait]
pub trait GenerateBackend: Send + Sync {
    /// One-shot `generateContent` call; the `response` envelope is already
    /// unwrapped in the returned value.
    async fn unary(
        &self,
        envelope: GenerateEnvelope,
        access_token: &str,
    ) -> Result<Value, CastorError>;

    /// `streamGenerateContent?alt=sse`; resolves once response headers
    /// arrive. Mid-stream failures surface as stream items, not as this
    /// method's error.
    async fn stream(
        &self,
        envelope: GenerateEnvelope,
        access_token: &str,
    ) -> Result<FrameStream, CastorError>;
}

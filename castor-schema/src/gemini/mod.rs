//! Gemini `generateContent` wire types.
//!
//! These are the shapes castor builds when translating OpenAI/Claude traffic
//! and the shapes it parses back out of upstream responses. Unknown fields
//! are preserved in `extra` catch-alls so pass-through traffic stays
//! lossless.

mod content;
mod generation;
mod model_list;
mod request;
mod response;

pub use content::{Content, FileData, FunctionCall, InlineData, Part};
pub use generation::{GenerationConfig, SafetySetting};
pub use model_list::{GeminiModel, GeminiModelList};
pub use request::GenerateContentRequest;
pub use response::{Candidate, GenerateContentResponse, UsageMetadata};

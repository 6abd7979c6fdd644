pub mod claude;
pub mod cloudcode;
pub mod gemini;
pub mod openai;

pub use cloudcode::{AvailableModels, GenerateEnvelope, unwrap_envelope};
pub use gemini::{
    Candidate, Content, GeminiModelList, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part, UsageMetadata,
};

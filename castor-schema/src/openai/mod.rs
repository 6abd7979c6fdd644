//! OpenAI chat-completions wire types (caller side).

mod chat;
mod image;
mod model_list;

pub use chat::{
    AssistantMessage, ChatChoice, ChatCompletionChunk, ChatCompletionRequest,
    ChatCompletionResponse, ChatMessage, ChunkChoice, ChunkDelta, ContentBlock, MessageContent,
    ResponseFormat, StopSequences, ToolCall, ToolCallFunction, Usage,
};
pub use image::{ImageGenerationRequest, ImageGenerationResponse, ImageObject};
pub use model_list::{OpenAiModel, OpenAiModelList};

//! Anthropic Messages wire types (caller side).

mod messages;
mod stream;

pub use messages::{
    ClaudeBlock, ClaudeContent, ClaudeMessage, ClaudeTool, ClaudeUsage, ImageSource,
    MessagesRequest, MessagesResponse, ResponseBlock, SystemPrompt, ThinkingConfig,
};
pub use stream::{
    ContentBlockDelta, ContentBlockStart, ContentBlockStop, MessageDelta, MessageStart,
    MessageStop, StreamErrorEvent,
};

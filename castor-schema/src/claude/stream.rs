//! Anthropic Messages streaming events.
//!
//! The canonical sequence for one response is:
//! `message_start`, `content_block_start`, N × `content_block_delta`,
//! `content_block_stop`, `message_delta`, `message_stop`. A mid-stream
//! failure replaces the remainder with a single `error` event.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::ClaudeUsage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStart {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Value,
}

impl MessageStart {
    pub fn new(message_id: &str, model: &str) -> Self {
        Self {
            kind: "message_start".to_string(),
            message: json!({
                "id": message_id,
                "type": "message",
                "role": "assistant",
                "model": model,
                "content": [],
                "stop_reason": null,
                "usage": {"input_tokens": 0, "output_tokens": 0},
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlockStart {
    #[serde(rename = "type")]
    pub kind: String,
    pub index: u32,
    pub content_block: Value,
}

impl ContentBlockStart {
    pub fn text(index: u32) -> Self {
        Self {
            kind: "content_block_start".to_string(),
            index,
            content_block: json!({"type": "text", "text": ""}),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlockDelta {
    #[serde(rename = "type")]
    pub kind: String,
    pub index: u32,
    pub delta: Value,
}

impl ContentBlockDelta {
    pub fn text(index: u32, text: &str) -> Self {
        Self {
            kind: "content_block_delta".to_string(),
            index,
            delta: json!({"type": "text_delta", "text": text}),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlockStop {
    #[serde(rename = "type")]
    pub kind: String,
    pub index: u32,
}

impl ContentBlockStop {
    pub fn new(index: u32) -> Self {
        Self {
            kind: "content_block_stop".to_string(),
            index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(rename = "type")]
    pub kind: String,
    pub delta: Value,
    pub usage: ClaudeUsage,
}

impl MessageDelta {
    pub fn stop(stop_reason: &str, output_tokens: u64) -> Self {
        Self {
            kind: "message_delta".to_string(),
            delta: json!({"stop_reason": stop_reason}),
            usage: ClaudeUsage {
                input_tokens: 0,
                output_tokens,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStop {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for MessageStop {
    fn default() -> Self {
        Self {
            kind: "message_stop".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamErrorEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub error: Value,
}

impl StreamErrorEvent {
    pub fn new(message: &str) -> Self {
        Self {
            kind: "error".to_string(),
            error: json!({"type": "proxy_error", "message": message}),
        }
    }
}

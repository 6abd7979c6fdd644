//! Anthropic Messages ↔ Gemini request/response mapping.

use super::clean_schema;
use castor_schema::claude::{
    ClaudeBlock, ClaudeContent, ClaudeUsage, MessagesRequest, MessagesResponse, ResponseBlock,
};
use castor_schema::gemini::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
    SafetySetting,
};
use serde_json::{Value, json};
use uuid::Uuid;

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 64_000;
const DEFAULT_THINKING_BUDGET: u32 = 10_000;

/// Build the upstream request body from an Anthropic Messages request.
pub fn to_gemini(request: &MessagesRequest) -> GenerateContentRequest {
    let system_text = request
        .system
        .as_ref()
        .map(|s| s.flatten())
        .filter(|s| !s.is_empty());

    let mut contents: Vec<Content> = Vec::new();
    for msg in &request.messages {
        let role = if msg.role == "assistant" { "model" } else { "user" };
        let parts = content_parts(&msg.content);
        if !parts.is_empty() {
            contents.push(Content {
                role: Some(role.to_string()),
                parts,
                ..Content::default()
            });
        }
    }

    let mut generation_config = GenerationConfig {
        max_output_tokens: Some(request.max_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)),
        temperature: Some(request.temperature.unwrap_or(1.0)),
        top_p: request.top_p,
        top_k: request.top_k,
        ..GenerationConfig::default()
    };
    if let Some(thinking) = &request.thinking
        && thinking.kind == "enabled"
    {
        generation_config.thinking_config = Some(json!({
            "thinkingBudget": thinking.budget_tokens.unwrap_or(DEFAULT_THINKING_BUDGET),
        }));
    }

    let tools = convert_tools(request);

    GenerateContentRequest {
        contents,
        system_instruction: system_text.map(Content::system_text),
        generation_config: Some(generation_config),
        tools,
        safety_settings: SafetySetting::all_off(),
    }
}

fn content_parts(content: &ClaudeContent) -> Vec<Part> {
    let mut parts = Vec::new();
    match content {
        ClaudeContent::Text(text) => {
            if !text.is_empty() {
                parts.push(Part::text(text.clone()));
            }
        }
        ClaudeContent::Blocks(blocks) => {
            for block in blocks {
                match block {
                    ClaudeBlock::Text { text } => {
                        if !text.is_empty() {
                            parts.push(Part::text(text.clone()));
                        }
                    }
                    ClaudeBlock::Thinking { thinking } => {
                        if !thinking.is_empty() {
                            parts.push(Part::thought_text(thinking.clone()));
                        }
                    }
                    ClaudeBlock::Image { source } => {
                        if source.kind == "base64" {
                            parts.push(Part {
                                inline_data: Some(InlineData {
                                    mime_type: source
                                        .media_type
                                        .clone()
                                        .unwrap_or_else(|| "image/jpeg".to_string()),
                                    data: source.data.clone(),
                                }),
                                ..Part::default()
                            });
                        }
                    }
                    ClaudeBlock::ToolUse { name, input, .. } => {
                        parts.push(Part::function_call(name.clone(), input.clone()));
                    }
                    ClaudeBlock::ToolResult { content, .. } => {
                        // The caller protocol omits the tool name in results.
                        let result = match content {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        parts.push(Part {
                            function_response: Some(json!({
                                "name": "tool",
                                "response": {"result": result},
                            })),
                            ..Part::default()
                        });
                    }
                    ClaudeBlock::Unknown(_) => {}
                }
            }
        }
    }
    parts
}

/// Function tools are schema-cleaned; web-search tools become the built-in
/// `googleSearch` tool.
fn convert_tools(request: &MessagesRequest) -> Option<Vec<Value>> {
    let tools = request.tools.as_ref()?;

    let mut declarations: Vec<Value> = Vec::new();
    let mut inject_google_search = false;

    for tool in tools {
        let is_web_search = tool
            .kind
            .as_deref()
            .is_some_and(|k| k.starts_with("web_search"))
            || tool.name.as_deref() == Some("web_search");
        if is_web_search {
            inject_google_search = true;
            continue;
        }

        let mut declaration = json!({
            "name": tool.name.clone().unwrap_or_default(),
            "description": tool.description.clone().unwrap_or_default(),
        });
        if let Some(schema) = &tool.input_schema {
            declaration["parameters"] = clean_schema(schema);
        }
        declarations.push(declaration);
    }

    let mut entries = Vec::new();
    if !declarations.is_empty() {
        entries.push(json!({"functionDeclarations": declarations}));
    }
    if inject_google_search {
        entries.push(json!({"googleSearch": {}}));
    }
    (!entries.is_empty()).then_some(entries)
}

/// Map the upstream response back to an Anthropic message.
pub fn from_gemini(response: &GenerateContentResponse, model: &str) -> MessagesResponse {
    let mut blocks: Vec<ResponseBlock> = Vec::new();
    for part in response.first_candidate_parts() {
        if part.thought == Some(true) {
            blocks.push(ResponseBlock::Thinking {
                text: part.text.clone().unwrap_or_default(),
            });
        } else if let Some(text) = &part.text {
            blocks.push(ResponseBlock::Text { text: text.clone() });
        } else if let Some(call) = &part.function_call {
            blocks.push(ResponseBlock::ToolUse {
                id: fresh_tool_use_id(),
                name: call.name.clone(),
                input: call.args.clone(),
            });
        }
    }

    let usage = response
        .usage_metadata
        .as_ref()
        .map(|u| ClaudeUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    MessagesResponse {
        id: format!("msg_{}", short_hex(12)),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        model: model.to_string(),
        content: blocks,
        stop_reason: Some(stop_reason(response.finish_reason()).to_string()),
        usage,
    }
}

/// Upstream finish reason → Anthropic stop reason.
pub fn stop_reason(finish_reason: Option<&str>) -> &'static str {
    match finish_reason {
        Some("MAX_TOKENS") => "max_tokens",
        Some("TOOL_USE") => "tool_use",
        _ => "end_turn",
    }
}

/// Visible (non-thought) text carried by one streaming frame.
pub fn extract_text_delta(frame: &GenerateContentResponse) -> Option<String> {
    let mut delta = String::new();
    for part in frame.first_candidate_parts() {
        if part.is_visible_text()
            && let Some(text) = &part.text
        {
            delta.push_str(text);
        }
    }
    (!delta.is_empty()).then_some(delta)
}

fn fresh_tool_use_id() -> String {
    format!("toolu_{}", short_hex(12))
}

fn short_hex(len: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> MessagesRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn system_blocks_join_with_newline() {
        let req = request(json!({
            "model": "claude-sonnet-4-5-thinking",
            "max_tokens": 100,
            "system": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}],
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let gemini = to_gemini(&req);
        assert_eq!(
            gemini.system_instruction.unwrap().parts[0].text.as_deref(),
            Some("a\nb")
        );
    }

    #[test]
    fn thinking_blocks_become_thought_parts() {
        let req = request(json!({
            "model": "claude-sonnet-4-5-thinking",
            "messages": [{"role": "assistant", "content": [
                {"type": "thinking", "thinking": "mulling"},
                {"type": "text", "text": "answer"}
            ]}]
        }));
        let gemini = to_gemini(&req);
        let parts = &gemini.contents[0].parts;
        assert_eq!(gemini.contents[0].role.as_deref(), Some("model"));
        assert_eq!(parts[0].thought, Some(true));
        assert_eq!(parts[0].text.as_deref(), Some("mulling"));
        assert_eq!(parts[1].thought, None);
    }

    #[test]
    fn thinking_config_set_when_enabled() {
        let req = request(json!({
            "model": "claude-sonnet-4-5-thinking",
            "thinking": {"type": "enabled", "budget_tokens": 2048},
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let config = to_gemini(&req).generation_config.unwrap();
        assert_eq!(config.thinking_config, Some(json!({"thinkingBudget": 2048})));

        let req = request(json!({
            "model": "claude-sonnet-4-5-thinking",
            "thinking": {"type": "disabled"},
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert!(to_gemini(&req).generation_config.unwrap().thinking_config.is_none());
    }

    #[test]
    fn tool_use_and_result_round_trip_shapes() {
        let req = request(json!({
            "model": "claude-sonnet-4-5-thinking",
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "toolu_1", "name": "get_weather",
                     "input": {"city": "Paris"}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "sunny"}
                ]}
            ]
        }));
        let gemini = to_gemini(&req);

        let call = gemini.contents[0].parts[0].function_call.as_ref().unwrap();
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.args["city"], "Paris");

        let response = gemini.contents[1].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response["name"], "tool");
        assert_eq!(response["response"]["result"], "sunny");
    }

    #[test]
    fn web_search_tools_replaced_by_google_search() {
        let req = request(json!({
            "model": "claude-sonnet-4-5-thinking",
            "tools": [
                {"type": "web_search_20250305", "name": "web_search"},
                {"name": "get_weather", "description": "d",
                 "input_schema": {"type": "object", "additionalProperties": false}}
            ],
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let tools = to_gemini(&req).tools.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["functionDeclarations"][0]["name"], "get_weather");
        assert_eq!(tools[0]["functionDeclarations"][0]["parameters"]["type"], "OBJECT");
        assert_eq!(tools[1], json!({"googleSearch": {}}));
    }

    #[test]
    fn response_maps_thought_text_and_tool_use() {
        let upstream: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "mulling", "thought": true},
                    {"text": "answer"},
                    {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}
                ]},
                "finishReason": "TOOL_USE"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 7, "totalTokenCount": 10}
        }))
        .unwrap();

        let resp = from_gemini(&upstream, "claude-sonnet-4-5-thinking");
        assert_eq!(resp.content.len(), 3);
        assert_eq!(
            resp.content[0],
            ResponseBlock::Thinking { text: "mulling".to_string() }
        );
        assert_eq!(resp.content[1], ResponseBlock::Text { text: "answer".to_string() });
        let ResponseBlock::ToolUse { id, name, input } = &resp.content[2] else {
            panic!("expected tool_use");
        };
        assert!(id.starts_with("toolu_"));
        assert_eq!(name, "get_weather");
        assert_eq!(input["city"], "Paris");
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(resp.usage.input_tokens, 3);
        assert_eq!(resp.usage.output_tokens, 7);
    }

    #[test]
    fn tool_use_name_and_input_survive_round_trip() {
        let req = request(json!({
            "model": "claude-sonnet-4-5-thinking",
            "messages": [{"role": "assistant", "content": [
                {"type": "tool_use", "id": "toolu_0", "name": "lookup", "input": {"q": 42}}
            ]}]
        }));
        let gemini = to_gemini(&req);

        // Feed the generated functionCall back as if upstream echoed it.
        let call = gemini.contents[0].parts[0].function_call.as_ref().unwrap();
        let upstream: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"functionCall": {"name": call.name, "args": call.args}}
            ]}}]
        }))
        .unwrap();

        let resp = from_gemini(&upstream, "claude-sonnet-4-5-thinking");
        let ResponseBlock::ToolUse { name, input, .. } = &resp.content[0] else {
            panic!("expected tool_use");
        };
        assert_eq!(name, "lookup");
        assert_eq!(input, &json!({"q": 42}));
    }

    #[test]
    fn stream_delta_skips_thought_parts() {
        let frame: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "hidden", "thought": true},
                {"text": "visible"}
            ]}}]
        }))
        .unwrap();
        assert_eq!(extract_text_delta(&frame).as_deref(), Some("visible"));

        let empty: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(extract_text_delta(&empty).is_none());
    }

    #[test]
    fn stop_reason_mapping() {
        assert_eq!(stop_reason(Some("STOP")), "end_turn");
        assert_eq!(stop_reason(Some("MAX_TOKENS")), "max_tokens");
        assert_eq!(stop_reason(Some("TOOL_USE")), "tool_use");
        assert_eq!(stop_reason(None), "end_turn");
    }
}

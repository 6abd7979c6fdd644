//! OpenAI chat ↔ Gemini request/response mapping.

use super::clean_schema;
use castor_schema::gemini::{
    Content, FileData, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    InlineData, Part, SafetySetting,
};
use castor_schema::openai::{
    AssistantMessage, ChatChoice, ChatCompletionChunk, ChatCompletionRequest,
    ChatCompletionResponse, ChatMessage, ChunkChoice, ChunkDelta, ContentBlock, MessageContent,
    Usage,
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 64_000;

/// Build the upstream request body from an OpenAI chat request.
pub fn to_gemini(request: &ChatCompletionRequest) -> GenerateContentRequest {
    // System messages are folded into a single instruction.
    let mut system_texts: Vec<String> = Vec::new();
    for msg in &request.messages {
        if msg.role != "system" {
            continue;
        }
        match &msg.content {
            Some(MessageContent::Text(text)) => system_texts.push(text.clone()),
            Some(MessageContent::Blocks(blocks)) => {
                for block in blocks {
                    if let ContentBlock::Text { text } = block {
                        system_texts.push(text.clone());
                    }
                }
            }
            None => {}
        }
    }

    let mut contents: Vec<Content> = Vec::new();
    for msg in &request.messages {
        if msg.role == "system" {
            continue;
        }
        let role = match msg.role.as_str() {
            "assistant" => "model",
            "user" | "tool" | "function" => "user",
            other => other,
        };

        let mut parts = message_parts(msg);
        if msg.role == "tool" || msg.role == "function" {
            parts.push(tool_response_part(msg));
        }

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
        top_p: Some(request.top_p.unwrap_or(1.0)),
        ..GenerationConfig::default()
    };
    if let Some(stop) = request.stop.clone() {
        generation_config.stop_sequences = Some(stop.into_vec());
    }
    if request
        .response_format
        .as_ref()
        .is_some_and(|f| f.kind == "json_object")
    {
        generation_config.response_mime_type = Some("application/json".to_string());
    }

    let tools = request.tools.as_ref().and_then(|tools| {
        let declarations: Vec<Value> = tools.iter().filter_map(function_declaration).collect();
        (!declarations.is_empty()).then(|| vec![json!({"functionDeclarations": declarations})])
    });

    GenerateContentRequest {
        contents,
        system_instruction: (!system_texts.is_empty())
            .then(|| Content::system_text(system_texts.join("\n\n"))),
        generation_config: Some(generation_config),
        tools,
        safety_settings: SafetySetting::all_off(),
    }
}

fn message_parts(msg: &ChatMessage) -> Vec<Part> {
    let mut parts = Vec::new();

    match &msg.content {
        Some(MessageContent::Text(text)) if !text.is_empty() => {
            parts.push(Part::text(text.clone()));
        }
        Some(MessageContent::Blocks(blocks)) => {
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => parts.push(Part::text(text.clone())),
                    ContentBlock::ImageUrl { image_url } => {
                        if let Some(part) = image_part(&image_url.url) {
                            parts.push(part);
                        }
                    }
                    // Unknown block types are dropped, matching upstream
                    // tolerance.
                    ContentBlock::Unknown(_) => {}
                }
            }
        }
        _ => {}
    }

    if let Some(tool_calls) = &msg.tool_calls {
        for call in tool_calls {
            let args: Value =
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));
            parts.push(Part::function_call(call.function.name.clone(), args));
        }
    }

    parts
}

/// `data:` URIs become inline data, external URLs become file references.
/// Malformed data URIs are dropped silently.
fn image_part(url: &str) -> Option<Part> {
    if let Some(stripped) = url.strip_prefix("data:") {
        let (meta, data) = stripped.split_once(',')?;
        let mime_type = meta.split(';').next().filter(|m| !m.is_empty())?;
        return Some(Part {
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
            ..Part::default()
        });
    }
    if url.starts_with("http") {
        return Some(Part {
            file_data: Some(FileData {
                file_uri: url.to_string(),
                mime_type: "image/jpeg".to_string(),
            }),
            ..Part::default()
        });
    }
    None
}

fn tool_response_part(msg: &ChatMessage) -> Part {
    let name = msg.name.as_deref().unwrap_or("unknown");
    let id = msg.tool_call_id.as_deref().unwrap_or("unknown");
    let result = msg
        .content
        .as_ref()
        .and_then(MessageContent::as_text)
        .unwrap_or_default();
    Part {
        function_response: Some(json!({
            "name": name,
            "id": id,
            "response": {"result": result},
        })),
        ..Part::default()
    }
}

/// Tool entry → cleaned `functionDeclaration`.
fn function_declaration(tool: &Value) -> Option<Value> {
    let func = tool.get("function").unwrap_or(tool);
    let Value::Object(func) = func else {
        return None;
    };

    let mut declaration = serde_json::Map::new();
    for (key, value) in func {
        if matches!(key.as_str(), "type" | "strict" | "additionalProperties") {
            continue;
        }
        if key == "parameters" {
            declaration.insert(key.clone(), clean_schema(value));
        } else {
            declaration.insert(key.clone(), value.clone());
        }
    }
    Some(Value::Object(declaration))
}

/// Map the upstream response back to an OpenAI chat completion.
pub fn from_gemini(response: &GenerateContentResponse, model: &str) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    for part in response.first_candidate_parts() {
        if let Some(part_text) = &part.text {
            text.push_str(part_text);
        } else if let Some(call) = &part.function_call {
            tool_calls.push(json!({
                "id": fresh_call_id(),
                "type": "function",
                "function": {
                    "name": call.name,
                    "arguments": call.args.to_string(),
                },
            }));
        }
    }

    let finish_reason = if response.finish_reason() == Some("MAX_TOKENS") {
        "length"
    } else if !tool_calls.is_empty() {
        "tool_calls"
    } else {
        "stop"
    };

    let usage = response
        .usage_metadata
        .as_ref()
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    ChatCompletionResponse {
        id: format!("chatcmpl-{}", short_hex(12)),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
            finish_reason: finish_reason.to_string(),
        }],
        usage,
    }
}

/// Map one upstream streaming frame to an OpenAI chunk.
pub fn stream_chunk(frame: &GenerateContentResponse, model: &str) -> ChatCompletionChunk {
    let mut delta = String::new();
    for part in frame.first_candidate_parts() {
        if let Some(text) = &part.text {
            delta.push_str(text);
        }
    }

    ChatCompletionChunk {
        id: format!("chatcmpl-stream-{}", Utc::now().timestamp()),
        object: "chat.completion.chunk".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                content: (!delta.is_empty()).then_some(delta),
            },
            finish_reason: None,
        }],
    }
}

fn fresh_call_id() -> String {
    format!("call_{}", short_hex(8))
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

    fn request(body: Value) -> ChatCompletionRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn system_messages_fold_into_one_instruction() {
        let req = request(json!({
            "model": "gpt-4",
            "messages": [
                {"role": "system", "content": "first"},
                {"role": "system", "content": "second"},
                {"role": "user", "content": "hi"}
            ]
        }));
        let gemini = to_gemini(&req);
        let instruction = gemini.system_instruction.unwrap();
        assert_eq!(instruction.parts[0].text.as_deref(), Some("first\n\nsecond"));
        assert_eq!(gemini.contents.len(), 1);
        assert_eq!(gemini.contents[0].role.as_deref(), Some("user"));
    }

    #[test]
    fn generation_config_defaults_applied() {
        let req = request(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let config = to_gemini(&req).generation_config.unwrap();
        assert_eq!(config.max_output_tokens, Some(64_000));
        assert_eq!(config.temperature, Some(1.0));
        assert_eq!(config.top_p, Some(1.0));
    }

    #[test]
    fn json_object_response_format_sets_mime_type() {
        let req = request(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "response_format": {"type": "json_object"},
            "stop": "END"
        }));
        let config = to_gemini(&req).generation_config.unwrap();
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(config.stop_sequences, Some(vec!["END".to_string()]));
    }

    #[test]
    fn data_uri_becomes_inline_data_and_malformed_is_dropped() {
        let req = request(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "look"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,QUJD"}},
                {"type": "image_url", "image_url": {"url": "data:garbage-without-comma"}},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
            ]}]
        }));
        let gemini = to_gemini(&req);
        let parts = &gemini.contents[0].parts;
        assert_eq!(parts.len(), 3);
        let inline = parts[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "QUJD");
        let file = parts[2].file_data.as_ref().unwrap();
        assert_eq!(file.mime_type, "image/jpeg");
    }

    #[test]
    fn assistant_tool_calls_map_to_function_calls() {
        let req = request(json!({
            "model": "gpt-4",
            "messages": [
                {"role": "assistant", "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}},
                    {"id": "call_2", "type": "function",
                     "function": {"name": "broken", "arguments": "not json"}}
                ]},
                {"role": "tool", "name": "get_weather", "tool_call_id": "call_1", "content": "sunny"}
            ]
        }));
        let gemini = to_gemini(&req);

        let assistant_parts = &gemini.contents[0].parts;
        assert_eq!(gemini.contents[0].role.as_deref(), Some("model"));
        let call = assistant_parts[0].function_call.as_ref().unwrap();
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.args["city"], "Paris");
        // Unparsable arguments degrade to an empty object.
        assert_eq!(assistant_parts[1].function_call.as_ref().unwrap().args, json!({}));

        let tool_parts = &gemini.contents[1].parts;
        assert_eq!(gemini.contents[1].role.as_deref(), Some("user"));
        let response = tool_parts[0].function_response.as_ref().unwrap();
        assert_eq!(response["name"], "get_weather");
        assert_eq!(response["id"], "call_1");
        assert_eq!(response["response"]["result"], "sunny");
    }

    #[test]
    fn tool_declarations_cleaned_and_aggregated() {
        let req = request(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "weather lookup",
                    "strict": true,
                    "parameters": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {"city": {"type": "string"}}
                    }
                }
            }]
        }));
        let tools = to_gemini(&req).tools.unwrap();
        let declaration = &tools[0]["functionDeclarations"][0];
        assert_eq!(declaration["name"], "get_weather");
        assert!(declaration.get("strict").is_none());
        assert_eq!(declaration["parameters"]["type"], "OBJECT");
        assert_eq!(declaration["parameters"]["properties"]["city"]["type"], "STRING");
    }

    #[test]
    fn text_only_response_round_trips() {
        let upstream: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "pong"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 1, "totalTokenCount": 2}
        }))
        .unwrap();

        let resp = from_gemini(&upstream, "gpt-4");
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("pong"));
        assert_eq!(resp.choices[0].finish_reason, "stop");
        assert_eq!(resp.usage.total_tokens, 2);
        assert_eq!(resp.model, "gpt-4");
    }

    #[test]
    fn function_calls_set_tool_calls_finish_reason() {
        let upstream: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}
                ]}
            }]
        }))
        .unwrap();

        let resp = from_gemini(&upstream, "gpt-4");
        assert_eq!(resp.choices[0].finish_reason, "tool_calls");
        let calls = resp.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0]["function"]["name"], "get_weather");
        assert!(calls[0]["id"].as_str().unwrap().starts_with("call_"));
    }

    #[test]
    fn max_tokens_maps_to_length() {
        let upstream: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "trunc"}]},
                "finishReason": "MAX_TOKENS"
            }]
        }))
        .unwrap();
        assert_eq!(from_gemini(&upstream, "m").choices[0].finish_reason, "length");
    }

    #[test]
    fn stream_chunk_concatenates_text_parts() {
        let frame: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "A"}, {"text": "B"}]}}]
        }))
        .unwrap();
        let chunk = stream_chunk(&frame, "gpt-4");
        assert_eq!(chunk.object, "chat.completion.chunk");
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("AB"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }
}

mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use common::{FakeAuthority, TEST_KEY, build_rig, seeded_account};
use serde_json::{Value, json};
use tower::ServiceExt;

fn messages_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header("content-type", "application/json")
        .header("x-api-key", TEST_KEY)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn non_streaming_response_keeps_caller_model_name() {
    let rig = build_rig(
        "claude-unary",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    rig.backend.push_unary(Ok(json!({
        "candidates": [{
            "content": {"parts": [
                {"text": "mulling", "thought": true},
                {"text": "answer"}
            ]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 9, "totalTokenCount": 13}
    })));

    let resp = rig
        .app()
        .oneshot(messages_request(
            json!({
                "model": "claude-3-5-sonnet",
                "max_tokens": 512,
                "messages": [{"role": "user", "content": "think about it"}]
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    // The caller sees its own model name; upstream saw the mapped one.
    assert_eq!(body["model"], "claude-3-5-sonnet");
    let recorded = rig.backend.recorded();
    assert_eq!(recorded[0].0.model, "claude-sonnet-4-5-thinking");
    assert!(recorded[0].0.request_id.starts_with("claude-"));

    assert_eq!(body["content"][0]["type"], "thinking");
    assert_eq!(body["content"][1]["type"], "text");
    assert_eq!(body["content"][1]["text"], "answer");
    assert_eq!(body["stop_reason"], "end_turn");
    assert_eq!(body["usage"]["input_tokens"], 4);
    assert_eq!(body["usage"]["output_tokens"], 9);
}

#[tokio::test]
async fn streaming_emits_canonical_event_sequence() {
    let rig = build_rig(
        "claude-stream",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    rig.backend.push_stream_frames(vec![
        json!({"candidates": [{"content": {"parts": [{"text": "A"}]}}]}),
        json!({"candidates": [{"content": {"parts": [{"text": "B"}]}}]}),
        json!({"candidates": [{"content": {"parts": [{"text": "C"}]}}]}),
        json!({"candidates": [{"finishReason": "STOP"}]}),
    ]);

    let resp = rig
        .app()
        .oneshot(messages_request(
            json!({
                "model": "claude-sonnet-4-5-thinking",
                "max_tokens": 512,
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let event_order: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("event: "))
        .collect();
    assert_eq!(
        event_order,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );

    let payloads: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();
    let deltas: Vec<&str> = payloads
        .iter()
        .filter(|p| p["type"] == "content_block_delta")
        .map(|p| p["delta"]["text"].as_str().unwrap())
        .collect();
    assert_eq!(deltas, vec!["A", "B", "C"]);

    let message_delta = payloads
        .iter()
        .find(|p| p["type"] == "message_delta")
        .unwrap();
    assert_eq!(message_delta["delta"]["stop_reason"], "end_turn");
}

#[tokio::test]
async fn streaming_error_replaces_remainder_with_error_event() {
    let rig = build_rig(
        "claude-stream-err",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    // The stream opens fine, delivers one frame, then dies mid-flight.
    rig.backend.push_stream(Ok(vec![
        Ok(json!({"candidates": [{"content": {"parts": [{"text": "partial"}]}}]})),
        Err(castor::CastorError::StreamProtocol(
            "connection reset".to_string(),
        )),
    ]));

    let resp = rig
        .app()
        .oneshot(messages_request(
            json!({
                "model": "claude-sonnet-4-5-thinking",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            })
            .to_string(),
        ))
        .await
        .unwrap();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let event_order: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("event: "))
        .collect();
    assert_eq!(
        event_order,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "error",
        ],
        "the error event terminates the stream"
    );
    assert!(text.contains("connection reset"));
}

#[tokio::test]
async fn count_tokens_estimates_quarter_length() {
    let rig = build_rig("claude-count", vec![], FakeAuthority::default()).await;

    let payload = json!({
        "model": "claude-sonnet-4-5-thinking",
        "messages": [{"role": "user", "content": "hello world"}]
    });
    let expected = serde_json::to_string(&payload).unwrap().len() / 4;

    let resp = rig
        .app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/messages/count_tokens")
                .header("content-type", "application/json")
                .header("x-api-key", TEST_KEY)
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["input_tokens"], expected as u64);
}

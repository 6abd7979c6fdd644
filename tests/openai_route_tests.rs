mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use common::{FakeAuthority, TEST_KEY, build_rig, seeded_account};
use serde_json::{Value, json};
use tower::ServiceExt;

fn chat_request(body: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn happy_path_translates_request_and_response() {
    let rig = build_rig(
        "openai-happy",
        vec![(seeded_account("a"), Some(0.8))],
        FakeAuthority::default(),
    )
    .await;

    rig.backend.push_unary(Ok(json!({
        "candidates": [{
            "content": {"parts": [{"text": "pong"}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 1, "totalTokenCount": 2}
    })));

    let resp = rig
        .app()
        .oneshot(chat_request(
            r#"{"model":"gpt-4","messages":[{"role":"user","content":"ping"}]}"#,
            Some(TEST_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["choices"][0]["message"]["content"], "pong");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 2);

    // gpt-4 is aliased onto the pro model; the envelope carries the upstream
    // shape.
    let recorded = rig.backend.recorded();
    assert_eq!(recorded.len(), 1);
    let (envelope, token) = &recorded[0];
    assert_eq!(envelope.model, "gemini-3-pro-high");
    assert_eq!(envelope.project, "proj-a");
    assert!(envelope.request_id.starts_with("openai-"));
    assert_eq!(envelope.request_type, "generate_content");
    assert_eq!(token, "tok-a");
    assert_eq!(
        envelope.request["contents"][0]["parts"][0]["text"],
        "ping"
    );
    assert_eq!(envelope.request["safetySettings"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn missing_key_is_unauthorized_and_bad_json_is_bad_request() {
    let rig = build_rig(
        "openai-auth",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    let resp = rig
        .app()
        .oneshot(chat_request(r#"{"model":"gpt-4","messages":[]}"#, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = rig
        .app()
        .oneshot(chat_request("not-json", Some(TEST_KEY)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_key_accepted_from_alternate_headers_and_query() {
    let rig = build_rig(
        "openai-keys",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    for _ in 0..3 {
        rig.backend.push_unary(Ok(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}, "finishReason": "STOP"}]
        })));
    }

    let body = r#"{"model":"gemini-3-flash","messages":[{"role":"user","content":"hi"}]}"#;
    for request in [
        Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .header("x-api-key", TEST_KEY)
            .body(Body::from(body))
            .unwrap(),
        Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .header("x-goog-api-key", TEST_KEY)
            .body(Body::from(body))
            .unwrap(),
        Request::builder()
            .method("POST")
            .uri(format!("/v1/chat/completions?key={TEST_KEY}"))
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
    ] {
        let resp = rig.app().oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn empty_pool_yields_service_unavailable() {
    let rig = build_rig("openai-empty", vec![], FakeAuthority::default()).await;

    let resp = rig
        .app()
        .oneshot(chat_request(
            r#"{"model":"gpt-4","messages":[{"role":"user","content":"hi"}]}"#,
            Some(TEST_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn streaming_emits_chunks_and_done_sentinel() {
    let rig = build_rig(
        "openai-stream",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    rig.backend.push_stream_frames(vec![
        json!({"candidates": [{"content": {"parts": [{"text": "A"}]}}]}),
        json!({"candidates": [{"content": {"parts": [{"text": "B"}]}}]}),
    ]);

    let resp = rig
        .app()
        .oneshot(chat_request(
            r#"{"model":"gemini-3-flash","messages":[{"role":"user","content":"hi"}],"stream":true}"#,
            Some(TEST_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(resp.headers().get("x-accel-buffering").unwrap(), "no");

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chat.completion.chunk"));
    assert!(text.contains(r#""content":"A""#));
    assert!(text.contains(r#""content":"B""#));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn model_list_is_static() {
    let rig = build_rig("openai-models", vec![], FakeAuthority::default()).await;

    let resp = rig
        .app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/models")
                .header("authorization", format!("Bearer {TEST_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["object"], "list");
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"gemini-3-flash"));
    assert!(ids.contains(&"claude-sonnet-4-5-thinking"));
}

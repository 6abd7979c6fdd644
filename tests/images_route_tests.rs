mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use common::{FakeAuthority, TEST_KEY, build_rig, seeded_account};
use serde_json::{Value, json};
use tower::ServiceExt;

fn image_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/images/generations")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {TEST_KEY}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn size_drives_aspect_ratio_and_body_is_minimal() {
    let rig = build_rig(
        "images-basic",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    rig.backend.push_unary(Ok(json!({
        "candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
        ]}}]
    })));

    let resp = rig
        .app()
        .oneshot(image_request(
            json!({"prompt": "cat", "size": "1920x1080"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let recorded = rig.backend.recorded();
    assert_eq!(recorded.len(), 1);
    let (envelope, _) = &recorded[0];
    assert_eq!(envelope.model, "gemini-3-pro-image");
    assert_eq!(envelope.request_type, "image_gen");
    assert!(envelope.request_id.starts_with("agent-"));
    assert_eq!(
        envelope.request["generationConfig"]["imageConfig"]["aspectRatio"],
        "16:9"
    );
    assert!(envelope.request.get("tools").is_none());
    assert!(envelope.request.get("systemInstruction").is_none());

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    // b64_json is the default response format.
    assert_eq!(body["data"][0]["b64_json"], "QUJD");
    assert!(body["data"][0].get("url").is_none());
}

#[tokio::test]
async fn url_response_format_returns_data_uris() {
    let rig = build_rig(
        "images-url",
        vec![(seeded_account("a"), None)],
        FakeAuthority::default(),
    )
    .await;

    rig.backend.push_unary(Ok(json!({
        "candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
        ]}}]
    })));

    let resp = rig
        .app()
        .oneshot(image_request(
            json!({"prompt": "cat", "response_format": "url"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"][0]["url"], "data:image/png;base64,QUJD");
}

#[tokio::test]
async fn image_requests_prefer_paid_tiers() {
    let rig = build_rig(
        "images-tier",
        vec![
            (common::seeded_account_with_tier("a", "FREE"), Some(0.99)),
            (common::seeded_account_with_tier("b", "PRO"), Some(0.5)),
        ],
        FakeAuthority::default(),
    )
    .await;

    rig.backend.push_unary(Ok(json!({
        "candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
        ]}}]
    })));

    let resp = rig
        .app()
        .oneshot(image_request(json!({"prompt": "cat"}).to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let recorded = rig.backend.recorded();
    assert_eq!(recorded[0].1, "tok-b", "PRO account selected over FREE");
}

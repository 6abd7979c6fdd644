//! SSE response builders for the three streaming surfaces.
//!
//! Each builder pumps upstream frames through a translation task into a
//! bounded channel. When the caller disconnects the channel closes, the task
//! returns, and the upstream stream is dropped at the next chunk boundary.

use crate::translate::claude as claude_translate;
use crate::translate::openai as openai_translate;
use crate::upstream::FrameStream;
use axum::http::{HeaderValue, header::CACHE_CONTROL};
use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use castor_schema::GenerateContentResponse;
use castor_schema::claude::{
    ContentBlockDelta, ContentBlockStart, ContentBlockStop, MessageDelta, MessageStart,
    MessageStop, StreamErrorEvent,
};
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

fn sse_response(rx: mpsc::Receiver<Event>) -> Response {
    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();

    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

fn parse_frame(value: serde_json::Value) -> Option<GenerateContentResponse> {
    serde_json::from_value(value).ok()
}

/// OpenAI streaming: one `chat.completion.chunk` per upstream frame, closed
/// by a `[DONE]` sentinel. A mid-stream failure emits one error chunk and
/// ends the stream without the sentinel.
pub fn openai_stream(mut frames: FrameStream, model: String) -> Response {
    let (tx, rx) = mpsc::channel::<Event>(16);

    tokio::spawn(async move {
        while let Some(item) = frames.next().await {
            match item {
                Ok(value) => {
                    let Some(frame) = parse_frame(value) else {
                        continue;
                    };
                    let chunk = openai_translate::stream_chunk(&frame, &model);
                    let Ok(event) = Event::default().json_data(&chunk) else {
                        continue;
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let error_chunk =
                        json!({"error": {"message": e.to_string(), "type": "proxy_error"}});
                    if let Ok(event) = Event::default().json_data(&error_chunk) {
                        let _ = tx.send(event).await;
                    }
                    return;
                }
            }
        }
        let _ = tx.send(Event::default().data("[DONE]")).await;
    });

    sse_response(rx)
}

/// Anthropic streaming: the canonical event sequence with text deltas from
/// non-thought parts only. A mid-stream failure replaces the remainder with
/// a single `error` event.
pub fn claude_stream(mut frames: FrameStream, model: String) -> Response {
    let (tx, rx) = mpsc::channel::<Event>(16);

    tokio::spawn(async move {
        let message_id = format!("msg_{}", Utc::now().timestamp());

        let send = |event: Result<Event, axum::Error>| {
            let tx = tx.clone();
            async move {
                match event {
                    Ok(event) => tx.send(event).await.is_ok(),
                    Err(_) => true,
                }
            }
        };

        if !send(
            Event::default()
                .event("message_start")
                .json_data(MessageStart::new(&message_id, &model)),
        )
        .await
        {
            return;
        }
        if !send(
            Event::default()
                .event("content_block_start")
                .json_data(ContentBlockStart::text(0)),
        )
        .await
        {
            return;
        }

        let mut stop_reason = "end_turn";
        while let Some(item) = frames.next().await {
            match item {
                Ok(value) => {
                    let Some(frame) = parse_frame(value) else {
                        continue;
                    };
                    if let Some(finish) = frame.finish_reason() {
                        stop_reason = claude_translate::stop_reason(Some(finish));
                    }
                    if let Some(delta) = claude_translate::extract_text_delta(&frame)
                        && !send(
                            Event::default()
                                .event("content_block_delta")
                                .json_data(ContentBlockDelta::text(0, &delta)),
                        )
                        .await
                    {
                        return;
                    }
                }
                Err(e) => {
                    let _ = send(
                        Event::default()
                            .event("error")
                            .json_data(StreamErrorEvent::new(&e.to_string())),
                    )
                    .await;
                    return;
                }
            }
        }

        let closing = [
            Event::default()
                .event("content_block_stop")
                .json_data(ContentBlockStop::new(0)),
            Event::default()
                .event("message_delta")
                .json_data(MessageDelta::stop(stop_reason, 0)),
            Event::default()
                .event("message_stop")
                .json_data(MessageStop::default()),
        ];
        for event in closing {
            if !send(event).await {
                return;
            }
        }
    });

    sse_response(rx)
}

/// Gemini native streaming: unwrapped frames forwarded verbatim, closed by a
/// `[DONE]` sentinel.
pub fn gemini_stream(mut frames: FrameStream) -> Response {
    let (tx, rx) = mpsc::channel::<Event>(16);

    tokio::spawn(async move {
        while let Some(item) = frames.next().await {
            match item {
                Ok(value) => {
                    let Ok(event) = Event::default().json_data(&value) else {
                        continue;
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let error_chunk = json!({"error": {"message": e.to_string()}});
                    if let Ok(event) = Event::default().json_data(&error_chunk) {
                        let _ = tx.send(event).await;
                    }
                    return;
                }
            }
        }
        let _ = tx.send(Event::default().data("[DONE]")).await;
    });

    sse_response(rx)
}

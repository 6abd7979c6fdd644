//! Per-request attempt loop: acquire an identity, call upstream, classify
//! failures, rotate or surface.

use crate::db::{DbActorHandle, UsageRecordCreate};
use crate::error::CastorError;
use crate::pool::TokenPool;
use crate::translate::{Protocol, wrap_request};
use crate::upstream::{FrameStream, GenerateBackend};
use axum::http::StatusCode;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::warn;

/// Upstream statuses worth trying on another identity.
const ROTATE_STATUSES: [u16; 6] = [429, 403, 500, 502, 503, 504];

/// Transport-failure fingerprints, matched case-insensitively against the
/// rendered error message.
const NETWORK_ERROR_KEYWORDS: [&str; 5] =
    ["name resolution", "dns", "connect", "timeout", "connection"];

/// What a successful dispatch hands back to the protocol handler.
pub enum DispatchReply {
    Unary(Value),
    Stream(FrameStream),
}

#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    /// Account-specific or transient: try the next identity.
    Rotate,
    /// Caller-visible: surface as-is.
    Fatal,
}

fn classify(error: &CastorError) -> Disposition {
    match error {
        CastorError::UpstreamHttp { status, .. } => {
            if ROTATE_STATUSES.contains(&status.as_u16()) {
                Disposition::Rotate
            } else {
                Disposition::Fatal
            }
        }
        // Network failures and unknown errors both rotate; with a pool of
        // alternates, trying another identity is cheap.
        _ => Disposition::Rotate,
    }
}

fn is_network_error(error: &CastorError) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    NETWORK_ERROR_KEYWORDS.iter().any(|kw| message.contains(kw))
}

fn error_kind(error: &CastorError) -> String {
    match error {
        CastorError::UpstreamHttp { status, .. } => status.as_u16().to_string(),
        e if is_network_error(e) => "network".to_string(),
        _ => "unknown".to_string(),
    }
}

/// Run the bounded retry loop for one caller request.
///
/// `request` is the already-translated (project-independent) upstream body;
/// each attempt wraps it with the leased identity's project id. For stream
/// requests, success means response headers arrived; mid-stream failures do
/// not re-enter this loop.
pub async fn dispatch(
    pool: &TokenPool,
    backend: &dyn GenerateBackend,
    store: &DbActorHandle,
    protocol: Protocol,
    model: &str,
    request: Value,
    stream: bool,
) -> Result<DispatchReply, CastorError> {
    let max_retries = pool.size().max(5);
    let mut last_error: Option<CastorError> = None;
    let mut tried: BTreeSet<String> = BTreeSet::new();

    for attempt in 0..max_retries {
        let start = Instant::now();
        let force_rotate = attempt > 0;

        let lease = match pool.acquire(protocol.quota_group(), force_rotate).await {
            Ok(lease) => lease,
            Err(CastorError::NoIdentitiesAvailable) => {
                return Err(CastorError::NoIdentitiesAvailable);
            }
            // Refresh/metadata failures do not surface while alternates
            // remain; rotate instead.
            Err(e) => {
                warn!(
                    "attempt {}/{} failed acquiring identity: {e}",
                    attempt + 1,
                    max_retries
                );
                last_error = Some(e);
                continue;
            }
        };
        tried.insert(lease.email.clone());

        let envelope = wrap_request(&lease.project_id, model, protocol, request.clone());
        let result = if stream {
            backend
                .stream(envelope, &lease.access_token)
                .await
                .map(DispatchReply::Stream)
        } else {
            backend
                .unary(envelope, &lease.access_token)
                .await
                .map(DispatchReply::Unary)
        };

        match result {
            Ok(reply) => {
                // Streaming elapsed time is time-to-first-byte by design.
                let elapsed_ms = start.elapsed().as_millis() as i64;
                store.insert_usage(UsageRecordCreate {
                    protocol: protocol.usage_tag().to_string(),
                    model: model.to_string(),
                    account_email: lease.email,
                    success: true,
                    status_code: 200,
                    elapsed_ms,
                    error_kind: None,
                });
                return Ok(reply);
            }
            Err(e) => {
                let disposition = classify(&e);
                warn!(
                    "attempt {}/{} failed ({}): {} [{:?}]",
                    attempt + 1,
                    max_retries,
                    lease.email,
                    e,
                    disposition
                );
                if disposition == Disposition::Fatal {
                    return Err(e);
                }
                last_error = Some(e);
            }
        }
    }

    let tried_list = tried.iter().cloned().collect::<Vec<_>>().join(", ");
    let last_message = last_error
        .as_ref()
        .map_or_else(|| "no attempts made".to_string(), ToString::to_string);

    store.insert_usage(UsageRecordCreate {
        protocol: protocol.usage_tag().to_string(),
        model: model.to_string(),
        account_email: tried.iter().next_back().cloned().unwrap_or_else(|| "-".to_string()),
        success: false,
        status_code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        elapsed_ms: 0,
        error_kind: last_error.as_ref().map(error_kind),
    });

    Err(CastorError::AllExhausted {
        detail: format!("All accounts exhausted: {last_message} (tried: [{tried_list}])"),
    })
}

use crate::db::DbActorHandle;
use crate::pool::{OnboardService, TokenPool};
use crate::server::guards::auth::RequireKeyAuth;
use crate::server::routes::{admin, claude, gemini, images, openai};
use crate::upstream::GenerateBackend;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, StatusCode, Uri, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use base64::Engine as _;
use rand::RngCore;
use reqwest::header::HeaderValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct CastorState {
    pub pool: Arc<TokenPool>,
    pub backend: Arc<dyn GenerateBackend>,
    pub db: DbActorHandle,
    pub onboard: OnboardService,
    pub castor_key: Arc<str>,
    pub model_list: Arc<Vec<String>>,
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Some SDKs mis-join base URLs and produce `/v1beta/v1beta/...`; rewrite the
/// doubled prefix transparently before routing.
async fn rewrite_doubled_v1beta(mut req: Request, next: Next) -> Response {
    let path = req.uri().path();
    eprintln!("DEBUG rewrite: incoming path={:?}", path);
    if let Some(rest) = path.strip_prefix("/v1beta/v1beta/") {
        let rewritten = match req.uri().query() {
            Some(query) => format!("/v1beta/{rest}?{query}"),
            None => format!("/v1beta/{rest}"),
        };
        eprintln!("DEBUG rewrite: rewritten={:?}", rewritten);
        if let Ok(uri) = rewritten.parse::<Uri>() {
            *req.uri_mut() = uri;
            eprintln!("DEBUG rewrite: new uri full={:?} path={:?} method={:?}", req.uri(), req.uri().path(), req.method());
        } else {
            eprintln!("DEBUG rewrite: parse FAILED");
        }
    }
    next.run(req).await
}

async fn access_log(req: Request, next: Next) -> Response {
    // Capture request metadata before moving `req` into the handler stack.
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    // Always reflect `x-request-id` for easier correlation, even if the
    // client didn't send one.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let path = uri.path();
    let protocol = format_http_version(version);

    // Note: for SSE responses `latency_ms` is time-to-first-byte (handler
    // return), not the full stream duration.
    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn castor_router(state: CastorState) -> Router {
    let api = Router::new()
        // OpenAI surface
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/v1/models", get(openai::list_models))
        // Anthropic surface
        .route("/v1/messages", post(claude::messages))
        .route("/v1/messages/count_tokens", post(claude::count_tokens))
        // Images
        .route("/v1/images/generations", post(images::generations))
        // Gemini native surface
        .route("/v1beta/models", get(gemini::list_models))
        .route(
            "/v1beta/models/{model_action}",
            post(gemini::generate).get(gemini::get_model),
        )
        .route(
            "/v1beta/models/{model}/countTokens",
            post(gemini::count_tokens),
        )
        // Operator surface
        .route("/admin/accounts", get(admin::list_accounts))
        .route("/admin/accounts/import", post(admin::import_account))
        .route("/admin/accounts/onboard", post(admin::onboard_accounts))
        .route("/admin/accounts/{id}", delete(admin::delete_account))
        .route(
            "/admin/aliases",
            get(admin::list_aliases).post(admin::upsert_alias),
        )
        .route("/admin/aliases/{source}", delete(admin::delete_alias))
        .route("/admin/usage", get(admin::usage_summary))
        .layer(middleware::from_extractor_with_state::<RequireKeyAuth, _>(
            state.clone(),
        ));

    Router::new()
        .merge(api)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(rewrite_doubled_v1beta))
        .layer(middleware::from_fn(access_log))
}

use crate::config::UpstreamConfig;
use crate::error::CastorError;
use async_trait::async_trait;
use castor_schema::{AvailableModels, GenerateEnvelope, unwrap_envelope};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HOST, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::warn;
use url::Url;

use super::backend::{FrameStream, GenerateBackend};

/// User-agent presented to the upstream on every call.
pub const UPSTREAM_USER_AGENT: &str = "antigravity/rust/0.1";

fn build_endpoint(base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(query);
    url
}

/// HTTPS client for `v1internal:{generateContent,streamGenerateContent,
/// fetchAvailableModels}`.
pub struct CloudCodeClient {
    http: reqwest::Client,
    unary_url: Url,
    stream_url: Url,
    models_url: Url,
}

impl CloudCodeClient {
    pub fn new(cfg: &UpstreamConfig) -> Self {
        let mut builder = reqwest::Client::builder()
            .user_agent(UPSTREAM_USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300));

        if let Some(proxy_url) = cfg.proxy.clone() {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())
                .expect("invalid proxy url for reqwest client");
            builder = builder.proxy(proxy);
        }

        Self {
            http: builder.build().expect("failed to build upstream HTTP client"),
            unary_url: build_endpoint(&cfg.api_url, "/v1internal:generateContent", None),
            stream_url: build_endpoint(
                &cfg.api_url,
                "/v1internal:streamGenerateContent",
                Some("alt=sse"),
            ),
            models_url: build_endpoint(&cfg.api_url, "/v1internal:fetchAvailableModels", None),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(host) = self.unary_url.host_str()
            && let Ok(value) = HeaderValue::from_str(host)
        {
            headers.insert(HOST, value);
        }
        headers
    }

    async fn post_checked(
        &self,
        url: &Url,
        access_token: &str,
        body: &impl serde::Serialize,
        deadline: Option<Duration>,
    ) -> Result<reqwest::Response, CastorError> {
        let mut request = self
            .http
            .post(url.clone())
            .headers(self.headers())
            .bearer_auth(access_token)
            .json(body);
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CastorError::UpstreamHttp { status, body });
        }
        Ok(resp)
    }

    /// Per-model remaining quota, used by the pool's quota scheduler.
    pub async fn fetch_available_models(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> Result<AvailableModels, CastorError> {
        let resp = self
            .post_checked(
                &self.models_url,
                access_token,
                &json!({"project": project_id}),
                Some(Duration::from_secs(15)),
            )
            .await?;
        Ok(resp.json::<AvailableModels>().await?)
    }
}

#[async_trait]
impl GenerateBackend for CloudCodeClient {
    async fn unary(
        &self,
        envelope: GenerateEnvelope,
        access_token: &str,
    ) -> Result<Value, CastorError> {
        let resp = self
            .post_checked(&self.unary_url, access_token, &envelope, None)
            .await?;
        let body: Value = resp.json().await?;
        Ok(unwrap_envelope(body))
    }

    async fn stream(
        &self,
        envelope: GenerateEnvelope,
        access_token: &str,
    ) -> Result<FrameStream, CastorError> {
        let resp = self
            .post_checked(&self.stream_url, access_token, &envelope, None)
            .await?;

        let frames = resp
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => {
                        let data = event.data.trim();
                        if data.is_empty() || data == "[DONE]" {
                            return None;
                        }
                        match serde_json::from_str::<Value>(data) {
                            Ok(value) => Some(Ok(unwrap_envelope(value))),
                            Err(_) => {
                                warn!("skipping invalid SSE JSON data: {:.50}...", data);
                                None
                            }
                        }
                    }
                    Err(e) => Some(Err(CastorError::StreamProtocol(e.to_string()))),
                }
            });

        Ok(frames.boxed())
    }
}

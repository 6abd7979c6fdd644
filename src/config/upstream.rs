use serde::{Deserialize, Serialize};
use url::Url;

/// Upstream (cloudcode-pa) and OAuth configuration.
///
/// OAuth endpoints and client credentials are intentionally fixed to the
/// built-in defaults of the desktop client this proxy impersonates; only the
/// network-facing knobs are TOML-configurable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base API URL for the cloudcode upstream.
    /// TOML: `upstream.api_url`. Default: `https://cloudcode-pa.googleapis.com`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Optional upstream HTTP proxy for all outbound clients.
    /// TOML: `upstream.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// OAuth refresh requests per second for the onboarding pipeline.
    /// TOML: `upstream.oauth_tps`. Default: `5`.
    #[serde(default = "default_oauth_tps")]
    pub oauth_tps: usize,

    /// Models advertised on the static `/v1/models` and `/v1beta/models`
    /// listings. TOML: `upstream.model_list`.
    #[serde(default = "default_model_list")]
    pub model_list: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            proxy: None,
            oauth_tps: default_oauth_tps(),
            model_list: default_model_list(),
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://cloudcode-pa.googleapis.com")
        .expect("default upstream api_url must be a valid URL")
}

fn default_oauth_tps() -> usize {
    5
}

fn default_model_list() -> Vec<String> {
    [
        "claude-opus-4-5-thinking",
        "claude-sonnet-4-5-thinking",
        "gemini-3-flash",
        "gemini-3-pro-high",
        "gemini-3-pro-low",
        "gpt-oss-120b-medium",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

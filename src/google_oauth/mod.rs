//! Google OAuth operations: refresh-token exchange, userinfo, and cloudcode
//! account metadata. The interactive authorization-code flow is deliberately
//! absent; identities enter the system as refresh tokens.

mod endpoints;

pub use endpoints::{AccountMetadata, TokenRefresh, UserProfile};

use crate::config::UpstreamConfig;
use crate::error::{CastorError, IsRetryable, OauthError};
use backon::{ExponentialBuilder, Retryable};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Shared retry policy for OAuth-adjacent network calls.
pub static OAUTH_RETRY_POLICY: LazyLock<ExponentialBuilder> = LazyLock::new(|| {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_millis(300))
        .with_max_times(2)
        .with_jitter()
});

/// OAuth client bound to one HTTP client with a 15 s deadline.
#[derive(Clone)]
pub struct GoogleOauthClient {
    http: reqwest::Client,
    api_url: Url,
}

impl GoogleOauthClient {
    pub fn new(cfg: &UpstreamConfig) -> Self {
        let mut builder = reqwest::Client::builder()
            .user_agent("castor-oauth/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15));

        if let Some(proxy_url) = cfg.proxy.clone() {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())
                .expect("invalid proxy url for reqwest client");
            builder = builder.proxy(proxy);
        }

        Self {
            http: builder.build().expect("failed to build OAuth HTTP client"),
            api_url: cfg.api_url.clone(),
        }
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// When the response omits `refresh_token` (a documented upstream quirk),
    /// the returned field is `None` and the caller must keep its prior one.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, CastorError> {
        endpoints::refresh_access_token(&self.http, refresh_token).await
    }

    /// Fetch project id + subscription tier via loadCodeAssist, with
    /// network-aware retries.
    pub async fn fetch_metadata(&self, access_token: &str) -> Result<AccountMetadata, CastorError> {
        let result = (|| async {
            endpoints::load_code_assist(&self.http, &self.api_url, access_token).await
        })
        .retry(*OAUTH_RETRY_POLICY)
        .when(|e: &OauthError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("loadCodeAssist retrying after error {err}, sleeping {dur:?}");
        })
        .await?;
        Ok(result)
    }

    /// Fetch the account's email and display name.
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, CastorError> {
        let result =
            (|| async { endpoints::user_info(&self.http, access_token).await })
                .retry(*OAUTH_RETRY_POLICY)
                .when(|e: &OauthError| e.is_retryable())
                .notify(|err, dur: Duration| {
                    warn!("userinfo retrying after error {err}, sleeping {dur:?}");
                })
                .await?;
        Ok(result)
    }
}

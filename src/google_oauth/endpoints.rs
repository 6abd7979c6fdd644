use crate::error::{CastorError, OauthError};
use oauth2::{
    AuthUrl, Client as OAuth2Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    RefreshToken, StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

// OAuth application identity of the desktop client this proxy impersonates.
const OAUTH_CLIENT_ID: &str =
    "1071006060591-tmhssin2h21lcre235vtolojh4g403ep.apps.googleusercontent.com";
const OAUTH_CLIENT_SECRET: &str = "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";
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Outcome of one refresh-token exchange.
#[derive(Debug, Clone)]
pub struct TokenRefresh {
    pub access_token: String,
    pub expires_in: Duration,
    /// Absent when upstream rotates nothing; keep the prior token then.
    pub refresh_token: Option<String>,
}

/// Project + tier discovered via loadCodeAssist.
#[derive(Debug, Clone, Default)]
pub struct AccountMetadata {
    pub project_id: Option<String>,
    pub subscription_tier: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
}

type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

fn build_oauth2_client() -> Result<GoogleOauth2Client, CastorError> {
    let client = OAuth2Client::new(ClientId::new(OAUTH_CLIENT_ID.to_string()))
        .set_client_secret(ClientSecret::new(OAUTH_CLIENT_SECRET.to_string()))
        .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
        .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URI.to_string())?);
    Ok(client)
}

pub(super) async fn refresh_access_token(
    http: &reqwest::Client,
    refresh_token: &str,
) -> Result<TokenRefresh, CastorError> {
    let client = build_oauth2_client()?;
    let token: BasicTokenResponse = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(http)
        .await?;

    Ok(TokenRefresh {
        access_token: token.access_token().secret().to_string(),
        expires_in: token.expires_in().unwrap_or(Duration::from_secs(3600)),
        refresh_token: token
            .refresh_token()
            .map(|t| t.secret().trim().to_string())
            .filter(|t| !t.is_empty()),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadCodeAssistResponse {
    cloudaicompanion_project: Option<String>,
    paid_tier: Option<TierObject>,
    current_tier: Option<TierObject>,
}

#[derive(Debug, Clone, Deserialize)]
struct TierObject {
    id: Option<String>,
}

pub(super) async fn load_code_assist(
    http: &reqwest::Client,
    api_url: &Url,
    access_token: &str,
) -> Result<AccountMetadata, OauthError> {
    let url = format!(
        "{}/v1internal:loadCodeAssist",
        api_url.as_str().trim_end_matches('/')
    );
    let resp = http
        .post(url)
        .bearer_auth(access_token)
        .json(&json!({"metadata": {"ideType": "ANTIGRAVITY"}}))
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(OauthError::UpstreamStatus(resp.status()));
    }

    let body: LoadCodeAssistResponse = resp.json().await?;
    // Tier priority: paidTier over currentTier.
    let subscription_tier = body
        .paid_tier
        .and_then(|t| t.id)
        .or(body.current_tier.and_then(|t| t.id));

    Ok(AccountMetadata {
        project_id: body
            .cloudaicompanion_project
            .filter(|p| !p.trim().is_empty()),
        subscription_tier,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct UserInfoResponse {
    email: String,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

pub(super) async fn user_info(
    http: &reqwest::Client,
    access_token: &str,
) -> Result<UserProfile, OauthError> {
    let resp = http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(OauthError::UpstreamStatus(resp.status()));
    }

    let body: UserInfoResponse = resp.json().await?;
    let name = body.name.filter(|n| !n.trim().is_empty()).or_else(|| {
        let parts: Vec<&str> = [body.given_name.as_deref(), body.family_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    });

    Ok(UserProfile {
        email: body.email,
        name,
    })
}

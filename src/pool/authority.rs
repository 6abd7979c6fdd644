use crate::error::CastorError;
use crate::google_oauth::{AccountMetadata, GoogleOauthClient, TokenRefresh};
use crate::upstream::CloudCodeClient;
use async_trait::async_trait;
use castor_schema::AvailableModels;
use std::sync::Arc;

/// Credential-maintenance surface the pool depends on: token refresh,
/// metadata discovery, and quota polling. Faked in scheduler tests.
#[async_trait]
pub trait CredentialAuthority: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, CastorError>;

    async fn fetch_metadata(&self, access_token: &str) -> Result<AccountMetadata, CastorError>;

    async fn fetch_quota(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> Result<AvailableModels, CastorError>;
}

/// Production authority: Google OAuth for tokens and metadata, cloudcode for
/// quota.
pub struct GoogleAuthority {
    pub oauth: GoogleOauthClient,
    pub cloudcode: Arc<CloudCodeClient>,
}

#[async_trait]
impl CredentialAuthority for GoogleAuthority {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, CastorError> {
        self.oauth.refresh(refresh_token).await
    }

    async fn fetch_metadata(&self, access_token: &str) -> Result<AccountMetadata, CastorError> {
        self.oauth.fetch_metadata(access_token).await
    }

    async fn fetch_quota(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> Result<AvailableModels, CastorError> {
        self.cloudcode
            .fetch_available_models(access_token, project_id)
            .await
    }
}

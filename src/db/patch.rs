use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full payload for creating (or upserting) an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCreate {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    pub project_id: Option<String>,
    pub session_id: Option<String>,
    pub subscription_tier: Option<String>,
}

/// Partial credential update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    pub subscription_tier: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.expiry.is_none()
            && self.project_id.is_none()
            && self.subscription_tier.is_none()
    }
}

/// One usage-log entry. Written best-effort; loss is tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecordCreate {
    pub protocol: String,
    pub model: String,
    pub account_email: String,
    pub success: bool,
    pub status_code: u16,
    pub elapsed_ms: i64,
    pub error_kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasCreate {
    pub source_model: String,
    pub target_model: String,
    pub description: Option<String>,
}

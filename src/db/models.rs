use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One upstream identity with its credential, as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAccount {
    /// Stable id derived from the email.
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub access_token: Option<String>,
    /// Never logged. Non-empty for any account eligible for selection.
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    pub project_id: Option<String>,
    pub session_id: Option<String>,
    /// FREE / PRO / ULTRA, when known.
    pub subscription_tier: Option<String>,
    /// Cached mean remaining-quota fraction in [0, 1].
    pub quota_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct DbModelAlias {
    pub source_model: String,
    pub target_model: String,
    pub description: Option<String>,
}

/// Aggregated usage per protocol, for the operator stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct UsageSummaryRow {
    pub protocol: String,
    pub total: i64,
    pub succeeded: i64,
    pub avg_elapsed_ms: f64,
}

/// Derive the stable account id from an email address.
pub fn account_id_from_email(email: &str) -> String {
    email.replace('@', "_at_").replace('.', "_")
}

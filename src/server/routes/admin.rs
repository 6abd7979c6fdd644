//! Operator endpoints: identity import/onboarding, listing, aliasing, and
//! usage statistics. Guarded by the same API key as the proxy surfaces.

use crate::db::models::account_id_from_email;
use crate::db::{AccountCreate, AliasCreate, DbModelAlias, UsageSummaryRow};
use crate::error::CastorError;
use crate::pool::PoolEntrySummary;
use crate::server::extract::CastorJson;
use crate::server::router::CastorState;
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

pub async fn list_accounts(
    State(state): State<CastorState>,
) -> Json<Vec<PoolEntrySummary>> {
    Json(state.pool.snapshot())
}

/// Trusted import of raw token material (e.g. exported from the desktop
/// client).
#[derive(Debug, Deserialize)]
pub struct TokenImport {
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

pub async fn import_account(
    State(state): State<CastorState>,
    CastorJson(import): CastorJson<TokenImport>,
) -> Result<Json<Value>, CastorError> {
    let id = account_id_from_email(&import.email);
    state
        .db
        .upsert_account(AccountCreate {
            id: id.clone(),
            email: import.email,
            name: None,
            access_token: Some(import.access_token),
            refresh_token: import.refresh_token,
            expiry: Utc::now() + Duration::seconds(import.expires_in),
            project_id: import.project_id,
            session_id: import.session_id,
            subscription_tier: None,
        })
        .await?;
    state.pool.reload_one(&id).await?;

    Ok(Json(json!({"status": "imported", "account_id": id})))
}

/// Zero-trust onboarding: refresh-token seeds only; the pipeline resolves
/// identity and metadata in the background.
#[derive(Debug, Deserialize)]
pub struct OnboardRequest {
    pub refresh_tokens: Vec<String>,
}

pub async fn onboard_accounts(
    State(state): State<CastorState>,
    CastorJson(request): CastorJson<OnboardRequest>,
) -> Json<Value> {
    let accepted = state.onboard.submit(request.refresh_tokens).await;
    Json(json!({"accepted": accepted}))
}

pub async fn delete_account(
    State(state): State<CastorState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, CastorError> {
    let existed = state.db.delete_account(&id).await?;
    if !existed {
        return Err(CastorError::NotFound(format!("account {id} not found")));
    }
    state.pool.remove(&id);
    Ok(Json(json!({"ok": true})))
}

pub async fn list_aliases(
    State(state): State<CastorState>,
) -> Result<Json<Vec<DbModelAlias>>, CastorError> {
    Ok(Json(state.db.list_aliases().await?))
}

pub async fn upsert_alias(
    State(state): State<CastorState>,
    CastorJson(create): CastorJson<AliasCreate>,
) -> Result<Json<Value>, CastorError> {
    if create.source_model.trim().is_empty() || create.target_model.trim().is_empty() {
        return Err(CastorError::BadRequest(
            "source_model and target_model are required".to_string(),
        ));
    }
    state.db.upsert_alias(create).await?;
    Ok(Json(json!({"ok": true})))
}

pub async fn delete_alias(
    State(state): State<CastorState>,
    Path(source): Path<String>,
) -> Result<Json<Value>, CastorError> {
    let existed = state.db.delete_alias(&source).await?;
    if !existed {
        return Err(CastorError::NotFound(format!("alias {source} not found")));
    }
    Ok(Json(json!({"ok": true})))
}

pub async fn usage_summary(
    State(state): State<CastorState>,
) -> Result<Json<Vec<UsageSummaryRow>>, CastorError> {
    Ok(Json(state.db.usage_summary().await?))
}

//! Shared test fixtures: scripted upstream backend, scripted credential
//! authority, and a router/state builder over a throwaway SQLite file.
#![allow(dead_code)]

use async_trait::async_trait;
use castor::config::UpstreamConfig;
use castor::db::{AccountCreate, DbActorHandle};
use castor::error::CastorError;
use castor::google_oauth::{AccountMetadata, GoogleOauthClient, TokenRefresh};
use castor::pool::{CredentialAuthority, TokenPool, spawn_onboard_pipeline};
use castor::server::router::{CastorState, castor_router};
use castor::upstream::{FrameStream, GenerateBackend};
use castor_schema::{AvailableModels, GenerateEnvelope};
use chrono::{Duration as ChronoDuration, Utc};
use futures::StreamExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const TEST_KEY: &str = "pwd";

/// Scripted upstream: pops one result per call and records every envelope.
#[derive(Default)]
pub struct FakeBackend {
    pub unary_results: Mutex<VecDeque<Result<Value, CastorError>>>,
    pub stream_results: Mutex<VecDeque<Result<Vec<Result<Value, CastorError>>, CastorError>>>,
    pub requests: Mutex<Vec<(GenerateEnvelope, String)>>,
}

impl FakeBackend {
    pub fn push_unary(&self, result: Result<Value, CastorError>) {
        self.unary_results.lock().unwrap().push_back(result);
    }

    /// Script one stream: `Err` fails before headers, `Ok(frames)` succeeds
    /// with per-frame results so mid-stream failures are expressible.
    pub fn push_stream(&self, result: Result<Vec<Result<Value, CastorError>>, CastorError>) {
        self.stream_results.lock().unwrap().push_back(result);
    }

    pub fn push_stream_frames(&self, frames: Vec<Value>) {
        self.push_stream(Ok(frames.into_iter().map(Ok).collect()));
    }

    pub fn recorded(&self) -> Vec<(GenerateEnvelope, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn http_error(status: u16) -> CastorError {
        CastorError::UpstreamHttp {
            status: axum::http::StatusCode::from_u16(status).unwrap(),
            body: format!("upstream said {status}"),
        }
    }
}

#[async_trait]
impl GenerateBackend for FakeBackend {
    async fn unary(
        &self,
        envelope: GenerateEnvelope,
        access_token: &str,
    ) -> Result<Value, CastorError> {
        self.requests
            .lock()
            .unwrap()
            .push((envelope, access_token.to_string()));
        self.unary_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FakeBackend::http_error(503)))
    }

    async fn stream(
        &self,
        envelope: GenerateEnvelope,
        access_token: &str,
    ) -> Result<FrameStream, CastorError> {
        self.requests
            .lock()
            .unwrap()
            .push((envelope, access_token.to_string()));
        let frames = self
            .stream_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FakeBackend::http_error(503)))?;
        Ok(futures::stream::iter(frames).boxed())
    }
}

/// Scripted credential authority.
pub struct FakeAuthority {
    /// Access tokens handed out by successive refreshes.
    pub refresh_tokens_seen: Mutex<Vec<String>>,
    pub refresh_counter: Mutex<u64>,
    /// Refresh token returned by the token endpoint (None = omitted).
    pub rotated_refresh_token: Option<String>,
    pub metadata: Result<AccountMetadata, ()>,
    /// Quota payloads keyed by access token.
    pub quota_by_token: HashMap<String, Value>,
}

impl Default for FakeAuthority {
    fn default() -> Self {
        Self {
            refresh_tokens_seen: Mutex::new(Vec::new()),
            refresh_counter: Mutex::new(0),
            rotated_refresh_token: None,
            metadata: Ok(AccountMetadata::default()),
            quota_by_token: HashMap::new(),
        }
    }
}

#[async_trait]
impl CredentialAuthority for FakeAuthority {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, CastorError> {
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        let mut counter = self.refresh_counter.lock().unwrap();
        *counter += 1;
        Ok(TokenRefresh {
            access_token: format!("fresh-{}", *counter),
            expires_in: Duration::from_secs(3600),
            refresh_token: self.rotated_refresh_token.clone(),
        })
    }

    async fn fetch_metadata(&self, _access_token: &str) -> Result<AccountMetadata, CastorError> {
        self.metadata
            .clone()
            .map_err(|()| CastorError::StreamProtocol("metadata unavailable".to_string()))
    }

    async fn fetch_quota(
        &self,
        access_token: &str,
        _project_id: &str,
    ) -> Result<AvailableModels, CastorError> {
        match self.quota_by_token.get(access_token) {
            Some(payload) => Ok(serde_json::from_value(payload.clone())?),
            None => Err(FakeBackend::http_error(503)),
        }
    }
}

/// A stored account that is immediately usable (fresh token, project set).
pub fn seeded_account(id: &str) -> AccountCreate {
    AccountCreate {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: None,
        access_token: Some(format!("tok-{id}")),
        refresh_token: format!("rt-{id}"),
        expiry: Utc::now() + ChronoDuration::hours(1),
        project_id: Some(format!("proj-{id}")),
        session_id: None,
        subscription_tier: None,
    }
}

pub fn seeded_account_with_tier(id: &str, tier: &str) -> AccountCreate {
    AccountCreate {
        subscription_tier: Some(tier.to_string()),
        ..seeded_account(id)
    }
}

pub fn temp_database_url(tag: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("castor-{tag}-{}-{nanos}.sqlite", std::process::id()));
    format!("sqlite:{}", path.display())
}

pub struct TestRig {
    pub state: CastorState,
    pub db: DbActorHandle,
    pub pool: Arc<TokenPool>,
    pub backend: Arc<FakeBackend>,
}

impl TestRig {
    pub fn app(&self) -> axum::Router {
        castor_router(self.state.clone())
    }
}

/// Build a full state over a temp database, seeding the given accounts with
/// the given scores.
pub async fn build_rig(
    tag: &str,
    accounts: Vec<(AccountCreate, Option<f64>)>,
    authority: FakeAuthority,
) -> TestRig {
    let db = castor::db::spawn(&temp_database_url(tag)).await;

    for (account, score) in accounts {
        let id = account.id.clone();
        db.upsert_account(account).await.expect("seed account");
        if let Some(score) = score {
            db.update_quota_score(&id, score).await.expect("seed score");
        }
    }

    let authority: Arc<dyn CredentialAuthority> = Arc::new(authority);
    let pool = Arc::new(TokenPool::new(db.clone(), authority));
    pool.load().await.expect("load pool");

    let backend = Arc::new(FakeBackend::default());

    // The onboard pipeline needs a real OAuth client; it stays idle in tests.
    let upstream_cfg = UpstreamConfig::default();
    let oauth = GoogleOauthClient::new(&upstream_cfg);
    let onboard = spawn_onboard_pipeline(1, oauth, db.clone(), pool.clone());

    let state = CastorState {
        pool: pool.clone(),
        backend: backend.clone(),
        db: db.clone(),
        onboard,
        castor_key: Arc::from(TEST_KEY),
        model_list: Arc::new(upstream_cfg.model_list.clone()),
    };

    TestRig {
        state,
        db,
        pool,
        backend,
    }
}

/// Wait until the fire-and-forget usage write lands (bounded).
pub async fn wait_for_usage_rows(db: &DbActorHandle, minimum: usize) -> Vec<castor::db::UsageSummaryRow> {
    for _ in 0..50 {
        let rows = db.usage_summary().await.expect("usage summary");
        let total: i64 = rows.iter().map(|r| r.total).sum();
        if total >= minimum as i64 {
            return rows;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("usage rows never reached {minimum}");
}

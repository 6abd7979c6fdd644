//! Onboarding pipeline: refresh-token seeds in, stored accounts out.
//!
//! Seeds go through a governor-rate-limited worker so a bulk import cannot
//! hammer the OAuth endpoint. Each seed is refreshed, resolved to an email
//! via userinfo, enriched with project/tier metadata, upserted, and
//! activated in the pool.

use super::TokenPool;
use crate::db::models::account_id_from_email;
use crate::db::{AccountCreate, DbActorHandle};
use crate::error::CastorError;
use crate::google_oauth::GoogleOauthClient;
use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::StreamExt;
use governor::{Quota, RateLimiter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

/// Handle for submitting refresh-token seeds.
#[derive(Clone)]
pub struct OnboardService {
    job_tx: mpsc::Sender<String>,
}

impl OnboardService {
    /// Enqueue non-empty seeds; returns how many were accepted.
    pub async fn submit(&self, refresh_tokens: Vec<String>) -> usize {
        let mut accepted = 0usize;
        for token in refresh_tokens {
            let token = token.trim().to_string();
            if token.is_empty() {
                continue;
            }
            if self.job_tx.send(token).await.is_err() {
                warn!("onboard queue closed; dropping remaining seeds");
                break;
            }
            accepted += 1;
        }
        accepted
    }
}

/// Spawn the background onboarding worker.
pub fn spawn_onboard_pipeline(
    oauth_tps: usize,
    oauth: GoogleOauthClient,
    store: DbActorHandle,
    pool: Arc<TokenPool>,
) -> OnboardService {
    let (job_tx, job_rx) = mpsc::channel::<String>(1000);

    let oauth_tps = oauth_tps.max(1);
    let tps = u32::try_from(oauth_tps).unwrap_or(u32::MAX);
    let burst = u32::try_from(oauth_tps.saturating_mul(2)).unwrap_or(u32::MAX);
    let limiter = Arc::new(RateLimiter::direct(
        Quota::per_second(std::num::NonZeroU32::new(tps).unwrap())
            .allow_burst(std::num::NonZeroU32::new(burst).unwrap()),
    ));

    let buffer_unordered = oauth_tps.saturating_mul(2).max(1);
    tokio::spawn(async move {
        info!(
            "onboard pipeline started: concurrency={buffer_unordered}, rate={tps}/s, burst={burst}"
        );

        let mut pipeline = ReceiverStream::new(job_rx)
            .map(|seed| {
                let limiter = limiter.clone();
                let oauth = oauth.clone();
                let store = store.clone();
                let pool = pool.clone();
                async move {
                    limiter.until_ready().await;
                    onboard_seed(&oauth, &store, &pool, seed).await
                }
            })
            .buffer_unordered(buffer_unordered);

        while let Some(outcome) = pipeline.next().await {
            match outcome {
                Ok(email) => info!("onboarded account {email}"),
                Err(e) => warn!("seed onboarding failed: {e}"),
            }
        }

        info!("onboard pipeline stopped");
    });

    OnboardService { job_tx }
}

async fn onboard_seed(
    oauth: &GoogleOauthClient,
    store: &DbActorHandle,
    pool: &TokenPool,
    seed: String,
) -> Result<String, CastorError> {
    let refreshed = oauth.refresh(&seed).await?;
    let profile = oauth.fetch_user_info(&refreshed.access_token).await?;
    // Metadata discovery is best-effort here; the pool backfills later.
    let metadata = oauth
        .fetch_metadata(&refreshed.access_token)
        .await
        .unwrap_or_default();

    let expiry = Utc::now()
        + ChronoDuration::from_std(refreshed.expires_in)
            .unwrap_or_else(|_| ChronoDuration::seconds(3600));
    let id = account_id_from_email(&profile.email);

    store
        .upsert_account(AccountCreate {
            id: id.clone(),
            email: profile.email.clone(),
            name: profile.name,
            access_token: Some(refreshed.access_token),
            refresh_token: refreshed.refresh_token.unwrap_or(seed),
            expiry,
            project_id: metadata.project_id,
            session_id: None,
            subscription_tier: metadata.subscription_tier,
        })
        .await?;
    pool.reload_one(&id).await?;

    Ok(profile.email)
}

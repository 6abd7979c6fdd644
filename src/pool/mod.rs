//! The token pool: in-memory identity pool with quota-weighted selection,
//! sticky sessions, proactive refresh, metadata backfill, and quota polling.

mod authority;
mod entry;
mod onboard;
mod scheduler;
mod select;

pub use authority::{CredentialAuthority, GoogleAuthority};
pub use entry::{PoolEntry, PoolEntrySummary, SCORE_FLOOR};
pub use onboard::{OnboardService, spawn_onboard_pipeline};
pub use scheduler::spawn_schedulers;
pub use select::{QuotaGroup, STICKY_WINDOW, SelectionState};

use crate::db::{AccountPatch, DbActorHandle};
use crate::error::CastorError;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

/// Project id substituted when metadata discovery fails, so a request is not
/// blocked on a transient metadata error.
pub const FALLBACK_PROJECT_ID: &str = "bamboo-precept-lgxtn";

/// Proxies for the three tier-sharing quota groups; their mean remaining
/// fraction becomes an entry's score.
pub const REPRESENTATIVE_MODELS: [&str; 3] = [
    "claude-sonnet-4-5-thinking",
    "gemini-3-pro-high",
    "gemini-3-flash",
];

/// What `acquire` hands to the dispatcher.
#[derive(Debug, Clone)]
pub struct Lease {
    pub access_token: String,
    pub project_id: String,
    pub email: String,
}

/// Shared identity pool.
///
/// Locking: `state` guards the pure selection bookkeeping and is never held
/// across an await; `refresh_lock` serializes refreshes system-wide so
/// concurrent requesters never issue overlapping refreshes.
pub struct TokenPool {
    state: Mutex<SelectionState>,
    refresh_lock: tokio::sync::Mutex<()>,
    store: DbActorHandle,
    authority: Arc<dyn CredentialAuthority>,
}

impl TokenPool {
    pub fn new(store: DbActorHandle, authority: Arc<dyn CredentialAuthority>) -> Self {
        Self {
            state: Mutex::new(SelectionState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            store,
            authority,
        }
    }

    /// Rebuild the in-memory pool from the store. Idempotent.
    pub async fn load(&self) -> Result<usize, CastorError> {
        let rows = self.store.list_accounts().await?;
        let entries: Vec<PoolEntry> = rows.into_iter().filter_map(PoolEntry::from_db).collect();
        let count = entries.len();
        self.lock_state().replace_all(entries);
        info!("loaded {count} accounts into pool");
        Ok(count)
    }

    /// Refresh a single entry from the store (used after onboarding and
    /// administrative edits). Removes the entry when the stored row became
    /// inert.
    pub async fn reload_one(&self, id: &str) -> Result<bool, CastorError> {
        let row = self.store.get_account(id).await?;
        let mut state = self.lock_state();
        match row.and_then(PoolEntry::from_db) {
            Some(entry) => {
                state.insert(entry);
                Ok(true)
            }
            None => {
                state.remove(id);
                Ok(false)
            }
        }
    }

    /// Evict one entry from memory (the store row is the caller's problem).
    pub fn remove(&self, id: &str) {
        self.lock_state().remove(id);
    }

    pub fn size(&self) -> usize {
        self.lock_state().len()
    }

    /// Read-only listing for operators.
    pub fn snapshot(&self) -> Vec<PoolEntrySummary> {
        self.lock_state().entries().map(PoolEntrySummary::from).collect()
    }

    /// Select a usable identity, refreshing and backfilling metadata as
    /// needed.
    pub async fn acquire(
        &self,
        group: QuotaGroup,
        force_rotate: bool,
    ) -> Result<Lease, CastorError> {
        let selected = self
            .lock_state()
            .select(group, force_rotate, Instant::now())
            .ok_or(CastorError::NoIdentitiesAvailable)?;

        let entry = if selected.needs_refresh(Utc::now()) {
            self.refresh_entry(selected).await?
        } else {
            selected
        };

        let project_id = match entry.project_id.clone() {
            Some(project_id) => project_id,
            None => self.backfill_metadata(&entry).await,
        };

        Ok(Lease {
            access_token: entry.access_token,
            project_id,
            email: entry.email,
        })
    }

    /// Refresh one entry's access token, serialized system-wide.
    ///
    /// Double-checked: another task may have refreshed the same identity
    /// while this one waited on the lock.
    async fn refresh_entry(&self, selected: PoolEntry) -> Result<PoolEntry, CastorError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.lock_state().get(&selected.id).unwrap_or(selected);
        if !current.needs_refresh(Utc::now()) {
            return Ok(current);
        }

        info!("refreshing access token for {}", current.email);
        let refreshed = self.authority.refresh(&current.refresh_token).await?;
        let expiry = Utc::now()
            + ChronoDuration::from_std(refreshed.expires_in)
                .unwrap_or_else(|_| ChronoDuration::seconds(3600));

        self.lock_state().apply_refresh(
            &current.id,
            refreshed.access_token.clone(),
            expiry,
            refreshed.refresh_token.clone(),
        );

        if let Err(e) = self
            .store
            .patch_account(
                &current.id,
                AccountPatch {
                    access_token: Some(refreshed.access_token.clone()),
                    refresh_token: refreshed.refresh_token.clone(),
                    expiry: Some(expiry),
                    ..AccountPatch::default()
                },
            )
            .await
        {
            warn!("failed persisting refreshed token for {}: {e}", current.email);
        }

        let mut updated = current;
        updated.access_token = refreshed.access_token;
        updated.expiry = expiry;
        if let Some(rt) = refreshed.refresh_token {
            updated.refresh_token = rt;
        }
        Ok(updated)
    }

    /// Discover project id + tier for an entry that lacks them. Failure
    /// substitutes the fallback project so the request proceeds.
    async fn backfill_metadata(&self, entry: &PoolEntry) -> String {
        match self.authority.fetch_metadata(&entry.access_token).await {
            Ok(meta) => {
                self.lock_state().apply_metadata(
                    &entry.id,
                    meta.project_id.clone(),
                    meta.subscription_tier.clone(),
                );
                if meta.project_id.is_some() || meta.subscription_tier.is_some() {
                    if let Err(e) = self
                        .store
                        .patch_account(
                            &entry.id,
                            AccountPatch {
                                project_id: meta.project_id.clone(),
                                subscription_tier: meta.subscription_tier.clone(),
                                ..AccountPatch::default()
                            },
                        )
                        .await
                    {
                        warn!("failed persisting metadata for {}: {e}", entry.email);
                    }
                }
                meta.project_id
                    .unwrap_or_else(|| FALLBACK_PROJECT_ID.to_string())
            }
            Err(e) => {
                warn!("metadata fetch failed for {}: {e}; using fallback project", entry.email);
                FALLBACK_PROJECT_ID.to_string()
            }
        }
    }

    /// One refresh-scheduler tick: renew every token inside the pre-expiry
    /// window. Per-identity failures are logged and swallowed.
    pub async fn refresh_all_expiring(&self) {
        let now = Utc::now();
        let expiring: Vec<PoolEntry> = self
            .lock_state()
            .entries()
            .filter(|e| e.needs_refresh(now))
            .cloned()
            .collect();

        let mut refreshed = 0usize;
        for entry in expiring {
            let email = entry.email.clone();
            match self.refresh_entry(entry).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!("scheduled refresh failed for {email}: {e}"),
            }
        }
        if refreshed > 0 {
            info!("refreshed {refreshed} expiring tokens");
        }
    }

    /// One quota-scheduler tick: backfill missing tiers, then poll each
    /// identity's remaining quota and cache the averaged score. Erroring
    /// entries retain their prior score.
    pub async fn update_quota_scores(&self) {
        let entries: Vec<PoolEntry> = self.lock_state().entries().cloned().collect();

        let mut updated = 0usize;
        for entry in entries {
            if entry.subscription_tier.is_none() {
                let _ = self.backfill_metadata(&entry).await;
            }
            // Re-read: the backfill may have just filled in the project.
            let Some(entry) = self.lock_state().get(&entry.id) else {
                continue;
            };

            let project_id = entry.project_id.clone().unwrap_or_default();
            let models = match self
                .authority
                .fetch_quota(&entry.access_token, &project_id)
                .await
            {
                Ok(models) => models,
                Err(e) => {
                    warn!("quota poll failed for {}: {e}", entry.email);
                    continue;
                }
            };

            let fractions: Vec<f64> = REPRESENTATIVE_MODELS
                .iter()
                .filter_map(|model| models.remaining_fraction(model))
                .collect();
            if fractions.is_empty() {
                continue;
            }

            let avg = fractions.iter().sum::<f64>() / fractions.len() as f64;
            let score = (avg * 10_000.0).round() / 10_000.0;

            self.lock_state().set_score(&entry.id, score);
            if let Err(e) = self.store.update_quota_score(&entry.id, score).await {
                warn!("failed persisting quota score for {}: {e}", entry.email);
            }
            updated += 1;
        }
        if updated > 0 {
            info!("updated quota scores for {updated} accounts");
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SelectionState> {
        self.state.lock().expect("pool state lock poisoned")
    }
}

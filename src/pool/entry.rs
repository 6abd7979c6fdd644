use crate::db::DbAccount;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// In-memory projection of one identity + credential.
///
/// Owned exclusively by the pool; copied out before any network call so no
/// lock is held across I/O.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    pub project_id: Option<String>,
    pub subscription_tier: Option<String>,
    pub quota_score: Option<f64>,
}

/// Scores at or below this floor are treated as unset for selection.
pub const SCORE_FLOOR: f64 = 0.05;

impl PoolEntry {
    /// Build from a stored row; accounts without a usable credential are
    /// inert and never enter the pool.
    pub fn from_db(row: DbAccount) -> Option<Self> {
        let access_token = row.access_token.filter(|t| !t.is_empty())?;
        if row.refresh_token.trim().is_empty() {
            return None;
        }
        Some(Self {
            id: row.id,
            email: row.email,
            access_token,
            refresh_token: row.refresh_token,
            expiry: row.expiry,
            project_id: row.project_id.filter(|p| !p.is_empty()),
            subscription_tier: row.subscription_tier,
            quota_score: row.quota_score,
        })
    }

    /// True within 5 minutes of expiry (inclusive).
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(300) >= self.expiry
    }

    /// PRO/ULTRA tiers get preference for image generation.
    pub fn is_paid_tier(&self) -> bool {
        self.subscription_tier
            .as_deref()
            .map(|tier| {
                let tier = tier.to_ascii_lowercase();
                tier.contains("pro") || tier.contains("ultra")
            })
            .unwrap_or(false)
    }

    /// The score, if set and above the floor.
    pub fn usable_score(&self) -> Option<f64> {
        self.quota_score.filter(|s| *s > SCORE_FLOOR)
    }
}

/// Read-only operator view of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct PoolEntrySummary {
    pub id: String,
    pub email: String,
    pub project_id: Option<String>,
    pub subscription_tier: Option<String>,
    pub quota_score: Option<f64>,
    pub expiry: DateTime<Utc>,
    pub expires_in_seconds: i64,
}

impl From<&PoolEntry> for PoolEntrySummary {
    fn from(entry: &PoolEntry) -> Self {
        Self {
            id: entry.id.clone(),
            email: entry.email.clone(),
            project_id: entry.project_id.clone(),
            subscription_tier: entry.subscription_tier.clone(),
            quota_score: entry.quota_score,
            expiry: entry.expiry,
            expires_in_seconds: (entry.expiry - Utc::now()).num_seconds().max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tier: Option<&str>, score: Option<f64>) -> PoolEntry {
        PoolEntry {
            id: "a".to_string(),
            email: "a@x".to_string(),
            access_token: "tok".to_string(),
            refresh_token: "rt".to_string(),
            expiry: Utc::now() + Duration::hours(1),
            project_id: None,
            subscription_tier: tier.map(str::to_string),
            quota_score: score,
        }
    }

    #[test]
    fn refresh_window_is_five_minutes() {
        let e = entry(None, None);
        assert!(!e.needs_refresh(e.expiry - Duration::seconds(301)));
        assert!(e.needs_refresh(e.expiry - Duration::seconds(300)));
        assert!(e.needs_refresh(e.expiry + Duration::seconds(1)));
    }

    #[test]
    fn paid_tier_matches_case_insensitively() {
        assert!(entry(Some("PRO"), None).is_paid_tier());
        assert!(entry(Some("ultra-tier"), None).is_paid_tier());
        assert!(!entry(Some("FREE"), None).is_paid_tier());
        assert!(!entry(None, None).is_paid_tier());
    }

    #[test]
    fn score_floor_filters_low_and_unset_scores() {
        assert_eq!(entry(None, Some(0.8)).usable_score(), Some(0.8));
        assert_eq!(entry(None, Some(0.05)).usable_score(), None);
        assert_eq!(entry(None, None).usable_score(), None);
    }
}

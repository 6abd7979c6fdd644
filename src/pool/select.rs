//! Pure selection policy: no I/O, no locks, no clock reads.
//!
//! The pool wrapper owns a [`SelectionState`] behind a mutex and passes the
//! current instant in, which keeps the policy deterministic under test.

use super::entry::PoolEntry;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// How long the selector prefers the previously used identity.
pub const STICKY_WINDOW: Duration = Duration::from_secs(60);

/// Entries within this factor of the best score round-robin together.
const TIE_BAND_FACTOR: f64 = 0.9;

/// Which upstream quota a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaGroup {
    Gemini,
    Claude,
    ImageGen,
}

impl QuotaGroup {
    pub fn is_image(self) -> bool {
        matches!(self, QuotaGroup::ImageGen)
    }
}

/// Entries plus the shared round-robin counter and sticky pair.
///
/// `BTreeMap` keeps iteration (and therefore every tie-break) deterministic
/// by identity id.
#[derive(Debug, Default)]
pub struct SelectionState {
    entries: BTreeMap<String, PoolEntry>,
    rr_counter: usize,
    sticky: Option<(String, Instant)>,
}

impl SelectionState {
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = PoolEntry>) {
        self.entries = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
    }

    pub fn insert(&mut self, entry: PoolEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<PoolEntry> {
        self.entries.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PoolEntry> {
        self.entries.values()
    }

    /// Merge a completed refresh into the entry, keeping the prior refresh
    /// token when upstream rotated nothing.
    pub fn apply_refresh(
        &mut self,
        id: &str,
        access_token: String,
        expiry: chrono::DateTime<chrono::Utc>,
        refresh_token: Option<String>,
    ) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.access_token = access_token;
            entry.expiry = expiry;
            if let Some(rt) = refresh_token {
                entry.refresh_token = rt;
            }
        }
    }

    pub fn apply_metadata(
        &mut self,
        id: &str,
        project_id: Option<String>,
        subscription_tier: Option<String>,
    ) {
        if let Some(entry) = self.entries.get_mut(id) {
            if project_id.is_some() {
                entry.project_id = project_id;
            }
            if subscription_tier.is_some() {
                entry.subscription_tier = subscription_tier;
            }
        }
    }

    pub fn set_score(&mut self, id: &str, score: f64) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.quota_score = Some(score);
        }
    }

    /// Pick an identity for `group`, honoring the sticky window and the
    /// quota-weighted policy. Returns a copy so callers never hold the
    /// state across network calls.
    pub fn select(
        &mut self,
        group: QuotaGroup,
        force_rotate: bool,
        now: Instant,
    ) -> Option<PoolEntry> {
        if self.entries.is_empty() {
            return None;
        }

        // 1. Sticky window: reuse the last identity inside 60 s. Image
        //    requests bypass stickiness in both directions.
        if !force_rotate
            && !group.is_image()
            && let Some((id, at)) = &self.sticky
            && now.duration_since(*at) < STICKY_WINDOW
            && let Some(entry) = self.entries.get(id)
        {
            return Some(entry.clone());
        }

        // 2. Weighted pick.
        let selected_id = if group.is_image() {
            self.select_for_images(force_rotate)
        } else {
            let id = self.select_weighted();
            self.sticky = Some((id.clone(), now));
            id
        };

        self.entries.get(&selected_id).cloned()
    }

    fn select_for_images(&mut self, force_rotate: bool) -> String {
        let all: Vec<String> = self.entries.keys().cloned().collect();
        if force_rotate {
            return self.round_robin(&all);
        }

        let paid: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.is_paid_tier())
            .map(|e| e.id.clone())
            .collect();
        if paid.is_empty() {
            return self.round_robin(&all);
        }

        // Highest usable score among paid entries, deterministic by id.
        let best = self
            .entries
            .values()
            .filter(|e| e.is_paid_tier())
            .filter_map(|e| e.usable_score().map(|s| (e.id.clone(), s)))
            .max_by(|(id_a, a), (id_b, b)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| id_b.cmp(id_a))
            });
        match best {
            Some((id, _)) => id,
            None => self.round_robin(&paid),
        }
    }

    fn select_weighted(&mut self) -> String {
        let mut scored: Vec<(String, f64)> = self
            .entries
            .values()
            .filter_map(|e| e.usable_score().map(|s| (e.id.clone(), s)))
            .collect();

        if scored.is_empty() {
            let all: Vec<String> = self.entries.keys().cloned().collect();
            return self.round_robin(&all);
        }

        // Score descending, id ascending for equal scores.
        scored.sort_by(|(id_a, a), (id_b, b)| {
            b.partial_cmp(a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });

        let top_score = scored[0].1;
        let band: Vec<String> = scored
            .iter()
            .take(3)
            .filter(|(_, s)| *s >= TIE_BAND_FACTOR * top_score)
            .map(|(id, _)| id.clone())
            .collect();

        if band.len() > 1 {
            self.round_robin(&band)
        } else {
            scored[0].0.clone()
        }
    }

    fn round_robin(&mut self, ids: &[String]) -> String {
        let idx = self.rr_counter % ids.len();
        self.rr_counter += 1;
        ids[idx].clone()
    }
}

//! In-memory revocation list.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Fingerprints of revoked tokens, each kept until its retention instant.
///
/// Entries past their retention are dropped on every insert, so the set only ever
/// holds tokens that could still be presented.
#[derive(Debug, Default)]
pub struct RevocationSet {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl RevocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `fingerprint` as revoked until `retain_until`.
    ///
    /// Returns `false` when the entry was already past retention and not stored.
    pub fn insert(
        &self,
        fingerprint: impl Into<String>,
        retain_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, until| *until >= now);

        if retain_until < now {
            return false;
        }
        entries
            .entry(fingerprint.into())
            .and_modify(|until| *until = (*until).max(retain_until))
            .or_insert(retain_until);
        true
    }

    pub fn contains(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fingerprint)
            .is_some_and(|until| *until >= now)
    }

    /// Drop expired entries and return how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, until| *until >= now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

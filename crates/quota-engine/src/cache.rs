//! Decision and snapshot caching.
//!
//! A short-TTL cache avoids a storage round-trip on every admission check:
//! decisions are cached per (user, resource category), snapshots per user.
//! Within the TTL a repeated check returns the same decision even if the
//! ledger moved underneath — bounded staleness, not strict consistency.
//!
//! The cache is an injected service, owned by the process bootstrap and
//! passed to the validator by reference. `invalidate_user` is wired to
//! subscription-change events (renewal, plan upgrade) so a stale denial
//! cannot persist past a legitimate entitlement increase. Invalidation is
//! point-in-time and process-local; multi-process deployments need an
//! external invalidation channel.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use quota_core::{ResourceCategory, UserId};

use crate::snapshot::EntitlementSnapshot;
use crate::validator::Decision;

/// Cache service for admission decisions and entitlement snapshots.
pub trait QuotaCache: Send + Sync {
    /// Get a cached decision for a (user, category), if still fresh.
    fn get_decision(&self, user_id: &UserId, category: &ResourceCategory) -> Option<Decision>;

    /// Cache a decision for a (user, category).
    fn set_decision(&self, user_id: &UserId, category: &ResourceCategory, decision: Decision);

    /// Get a cached snapshot for a user, if still fresh.
    fn get_snapshot(&self, user_id: &UserId) -> Option<EntitlementSnapshot>;

    /// Cache a snapshot for a user.
    fn set_snapshot(&self, user_id: &UserId, snapshot: EntitlementSnapshot);

    /// Drop all cached entries for a user.
    fn invalidate_user(&self, user_id: &UserId);
}

/// In-process TTL cache.
pub struct TtlCache {
    ttl: Duration,
    decisions: Mutex<HashMap<(UserId, ResourceCategory), (Decision, Instant)>>,
    snapshots: Mutex<HashMap<UserId, (EntitlementSnapshot, Instant)>>,
}

impl TtlCache {
    /// Create a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            decisions: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    fn fresh(&self, stamp: Instant) -> bool {
        stamp.elapsed() <= self.ttl
    }
}

impl QuotaCache for TtlCache {
    fn get_decision(&self, user_id: &UserId, category: &ResourceCategory) -> Option<Decision> {
        let decisions = self.decisions.lock().ok()?;
        decisions
            .get(&(*user_id, category.clone()))
            .filter(|(_, stamp)| self.fresh(*stamp))
            .map(|(decision, _)| decision.clone())
    }

    fn set_decision(&self, user_id: &UserId, category: &ResourceCategory, decision: Decision) {
        if let Ok(mut decisions) = self.decisions.lock() {
            decisions.insert((*user_id, category.clone()), (decision, Instant::now()));
        }
    }

    fn get_snapshot(&self, user_id: &UserId) -> Option<EntitlementSnapshot> {
        let snapshots = self.snapshots.lock().ok()?;
        snapshots
            .get(user_id)
            .filter(|(_, stamp)| self.fresh(*stamp))
            .map(|(snapshot, _)| snapshot.clone())
    }

    fn set_snapshot(&self, user_id: &UserId, snapshot: EntitlementSnapshot) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(*user_id, (snapshot, Instant::now()));
        }
    }

    fn invalidate_user(&self, user_id: &UserId) {
        if let Ok(mut decisions) = self.decisions.lock() {
            decisions.retain(|(cached_user, _), _| cached_user != user_id);
        }
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.remove(user_id);
        }
    }
}

/// A cache that never stores anything; every check reads storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl QuotaCache for NoCache {
    fn get_decision(&self, _: &UserId, _: &ResourceCategory) -> Option<Decision> {
        None
    }

    fn set_decision(&self, _: &UserId, _: &ResourceCategory, _: Decision) {}

    fn get_snapshot(&self, _: &UserId) -> Option<EntitlementSnapshot> {
        None
    }

    fn set_snapshot(&self, _: &UserId, _: EntitlementSnapshot) {}

    fn invalidate_user(&self, _: &UserId) {}
}

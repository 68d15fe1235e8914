//! Billing period and renewal management.
//!
//! Derives the current billing-period key for a user and advances lapsed
//! auto-renewing subscriptions: the period jumps to start now, the ledger
//! for the new period is hard-reset to zero in the same atomic write, and
//! the user's cached decisions are invalidated. Audit log rows from prior
//! periods are never touched. Lapsed subscriptions without auto-renew are
//! left expired; every admission check denies until external billing
//! reactivates them.

use std::sync::Arc;

use chrono::Utc;

use quota_core::{QuotaError, Subscription, UsageSummary, UserId};
use quota_store::Store;

use crate::cache::QuotaCache;
use crate::snapshot::{storage_err, with_schema_retry};

/// Advances billing periods and resets per-period counters.
#[derive(Clone)]
pub struct RenewalManager {
    store: Arc<dyn Store>,
    cache: Arc<dyn QuotaCache>,
}

impl RenewalManager {
    /// Create a renewal manager.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn QuotaCache>) -> Self {
        Self { store, cache }
    }

    /// The current billing-period key (`YYYY-MM`) for a user, after
    /// ensuring the subscription is current.
    ///
    /// A user with no subscription accrues under the calendar month of
    /// now, so free-tier ledgers still roll over monthly.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Storage`] if the subscription cannot be read
    /// or the rollover cannot be persisted.
    pub fn current_period_key(&self, user_id: &UserId) -> Result<String, QuotaError> {
        let subscription = self.ensure_user_current(user_id)?;
        Ok(subscription
            .as_ref()
            .map_or_else(|| Utc::now().format("%Y-%m").to_string(), Subscription::period_key))
    }

    /// Fetch a user's subscription and ensure it is current.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Storage`] on storage failure.
    pub fn ensure_user_current(&self, user_id: &UserId) -> Result<Option<Subscription>, QuotaError> {
        let subscription = with_schema_retry(self.store.as_ref(), || {
            self.store.get_subscription(user_id)
        })
        .map_err(storage_err)?;

        subscription.map(|sub| self.ensure_current(sub)).transpose()
    }

    /// Ensure a subscription's billing period is current.
    ///
    /// When the period has lapsed and auto-renew is on, atomically advance
    /// `period_start = now`, `period_end = now + cycle length`, write a
    /// zeroed summary for the new period key, and invalidate the user's
    /// cache so stale denials cannot outlive the reset. Otherwise the
    /// subscription is returned unchanged — expiry itself is the
    /// validator's concern.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Storage`] if the rollover write fails.
    pub fn ensure_current(&self, subscription: Subscription) -> Result<Subscription, QuotaError> {
        let now = Utc::now();
        if !subscription.is_active || !subscription.is_expired(now) || !subscription.auto_renew {
            return Ok(subscription);
        }

        let mut advanced = subscription;
        advanced.period_start = now;
        advanced.period_end = now + chrono::Duration::days(advanced.billing_cycle.period_days());
        advanced.updated_at = now;

        let reset = UsageSummary::new(advanced.user_id, advanced.period_key());

        with_schema_retry(self.store.as_ref(), || {
            self.store.renew_subscription(&advanced, &reset)
        })
        .map_err(storage_err)?;

        self.cache.invalidate_user(&advanced.user_id);

        tracing::info!(
            user_id = %advanced.user_id,
            plan_tier = %advanced.plan_tier,
            period_key = %advanced.period_key(),
            period_end = %advanced.period_end,
            "Billing period advanced; counters reset"
        );

        Ok(advanced)
    }
}

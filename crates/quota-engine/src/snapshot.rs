//! Entitlement snapshots.
//!
//! Both admission checks and the usage tracker work from one consistent
//! read of the user's subscription, effective plan, and current-period
//! ledger row. The snapshot is never written back; lazily-created summary
//! rows are only persisted by the tracker on first recorded usage.

use chrono::Utc;
use serde::Serialize;

use quota_core::{Plan, QuotaError, Subscription, UsageSummary, UserId, FREE_TIER};
use quota_store::{Store, StoreError};

use crate::renewal::RenewalManager;

/// One consistent read of everything an admission check needs.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementSnapshot {
    /// The effective plan (the subscription's tier, or the free tier).
    pub plan: Plan,

    /// The user's subscription, if any.
    pub subscription: Option<Subscription>,

    /// The current-period ledger row (zeroed if none exists yet).
    pub summary: UsageSummary,

    /// The current billing-period key.
    pub period_key: String,
}

/// Run a storage operation, repairing the schema and retrying once on the
/// missing-column-family drift signature.
pub(crate) fn with_schema_retry<T, F>(store: &dyn Store, op: F) -> Result<T, StoreError>
where
    F: Fn() -> Result<T, StoreError>,
{
    match op() {
        Err(e) if e.is_schema_drift() => {
            tracing::warn!(error = %e, "Schema drift detected; repairing and retrying");
            store.repair_schema()?;
            op()
        }
        other => other,
    }
}

pub(crate) fn storage_err(e: StoreError) -> QuotaError {
    QuotaError::Storage(e.to_string())
}

/// Load the entitlement snapshot for a user.
///
/// Resolves the subscription (delegating lapsed auto-renewing ones to the
/// renewal manager), falls back to the stored free-tier plan when the user
/// has none, and lazily materializes a zeroed summary for the current
/// period.
///
/// # Errors
///
/// - [`QuotaError::SubscriptionExpired`] when the period lapsed and
///   auto-renew is off.
/// - [`QuotaError::NoActivePlan`] when the user has no subscription and no
///   free tier is configured.
/// - [`QuotaError::PlanNotFound`] when the subscription references a
///   missing tier.
/// - [`QuotaError::Storage`] for storage failures (after one schema-repair
///   retry).
pub(crate) fn load_entitlements(
    store: &dyn Store,
    renewal: &RenewalManager,
    user_id: &UserId,
) -> Result<EntitlementSnapshot, QuotaError> {
    let subscription =
        with_schema_retry(store, || store.get_subscription(user_id)).map_err(storage_err)?;

    // An inactive row is no entitlement; the free tier applies.
    let subscription = subscription.filter(|s| s.is_active);

    let subscription = match subscription {
        Some(sub) => {
            let sub = renewal.ensure_current(sub)?;
            if sub.is_expired(Utc::now()) {
                return Err(QuotaError::SubscriptionExpired {
                    user_id: user_id.to_string(),
                });
            }
            Some(sub)
        }
        None => None,
    };

    let plan = match &subscription {
        Some(sub) => with_schema_retry(store, || store.get_plan(&sub.plan_tier))
            .map_err(storage_err)?
            .ok_or_else(|| QuotaError::PlanNotFound {
                tier: sub.plan_tier.clone(),
            })?,
        None => with_schema_retry(store, || store.get_plan(FREE_TIER))
            .map_err(storage_err)?
            .ok_or_else(|| QuotaError::NoActivePlan {
                user_id: user_id.to_string(),
            })?,
    };

    let period_key = subscription
        .as_ref()
        .map_or_else(|| Utc::now().format("%Y-%m").to_string(), Subscription::period_key);

    let summary = with_schema_retry(store, || store.get_summary(user_id, &period_key))
        .map_err(storage_err)?
        .unwrap_or_else(|| UsageSummary::new(*user_id, period_key.clone()));

    Ok(EntitlementSnapshot {
        plan,
        subscription,
        summary,
        period_key,
    })
}

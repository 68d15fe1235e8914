//! Usage accounting for completed external calls.
//!
//! The tracker is the only writer of ledger state. Each completed call
//! becomes one immutable audit log row plus an in-place update of the
//! current-period summary, committed in a single atomic write. Threshold
//! alerts are emitted after the commit, best effort: an alert failure is
//! logged and never fails the recording.

use std::sync::Arc;

use chrono::Utc;

use quota_core::{
    CostBreakdown, LogEntryId, Plan, PriceTable, QuotaError, ResourceCategory, UsageAlert,
    UsageLogEntry, UsageStatus, UsageSummary, UserId, FREE_TIER,
};
use quota_store::Store;

use crate::cache::QuotaCache;
use crate::config::EngineConfig;
use crate::renewal::RenewalManager;
use crate::snapshot::{storage_err, with_schema_retry};

/// One completed external call to be charged to a user's ledger.
#[derive(Debug, Clone)]
pub struct RecordUsage {
    /// The user to charge.
    pub user_id: UserId,

    /// Logical resource category of the call.
    pub category: ResourceCategory,

    /// The vendor that fulfilled the call.
    pub provider: String,

    /// The resolved model name (may be unknown to the price table).
    pub model: String,

    /// Input (prompt) tokens consumed.
    pub input_tokens: u64,

    /// Output (completion) tokens produced.
    pub output_tokens: u64,

    /// Images generated, for per-image priced calls.
    pub images: u64,

    /// Pages processed, for per-page priced calls.
    pub pages: u64,

    /// Call latency in milliseconds.
    pub latency_ms: u64,

    /// HTTP-style status code of the call.
    pub status_code: u16,

    /// Error text if the call failed.
    pub error: Option<String>,

    /// Caller-supplied total cost in micro-dollars, overriding the price
    /// table (for vendors that return authoritative billing figures).
    pub cost_override_micros: Option<i64>,
}

impl RecordUsage {
    /// A successful call with the given token counts.
    #[must_use]
    pub fn success(
        user_id: UserId,
        category: ResourceCategory,
        provider: impl Into<String>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Self {
        Self {
            user_id,
            category,
            provider: provider.into(),
            model: model.into(),
            input_tokens,
            output_tokens,
            images: 0,
            pages: 0,
            latency_ms: 0,
            status_code: 200,
            error: None,
            cost_override_micros: None,
        }
    }

    /// Set the latency (builder style).
    #[must_use]
    pub const fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Mark the call failed with a status code and error text.
    #[must_use]
    pub fn failed(mut self, status_code: u16, error: impl Into<String>) -> Self {
        self.status_code = status_code;
        self.error = Some(error.into());
        self
    }
}

/// What one recording changed in the ledger.
#[derive(Debug, Clone)]
pub struct LedgerDelta {
    /// The billing-period key the call accrued under.
    pub period_key: String,

    /// The computed (or overridden) cost of the call.
    pub cost: CostBreakdown,

    /// Tokens added to the ledger.
    pub tokens_delta: u64,

    /// The summary's health after this recording.
    pub new_status: UsageStatus,
}

/// Records completed calls into the usage ledger.
pub struct UsageTracker {
    store: Arc<dyn Store>,
    renewal: RenewalManager,
    prices: PriceTable,
    alert_thresholds: Vec<u8>,
}

impl UsageTracker {
    /// Create a tracker over a store and an injected cache service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn QuotaCache>, config: &EngineConfig) -> Self {
        let renewal = RenewalManager::new(Arc::clone(&store), cache);
        Self {
            store,
            renewal,
            prices: config.price_table(),
            alert_thresholds: config.alert_thresholds.clone(),
        }
    }

    /// Record one completed call.
    ///
    /// The call already happened, so recording proceeds regardless of limit
    /// state: an over-limit or expired user is still billed for usage that
    /// slipped through. Appends the audit row and updates the summary in
    /// one atomic write, then emits threshold alerts best effort.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Storage`] if the ledger write fails (after one
    /// schema-repair retry).
    pub fn record(&self, request: RecordUsage) -> Result<LedgerDelta, QuotaError> {
        let subscription = self.renewal.ensure_user_current(&request.user_id)?;
        let period_key = subscription.as_ref().map_or_else(
            || Utc::now().format("%Y-%m").to_string(),
            quota_core::Subscription::period_key,
        );

        let plan = self.effective_plan(subscription.as_ref().map(|s| s.plan_tier.as_str()))?;
        let cost = self.compute_cost(&request);
        let tokens = request.input_tokens + request.output_tokens;

        let entry = UsageLogEntry {
            id: LogEntryId::generate(),
            user_id: request.user_id,
            period_key: period_key.clone(),
            category: request.category.clone(),
            provider: request.provider.clone(),
            model: request.model.clone(),
            input_tokens: request.input_tokens,
            output_tokens: request.output_tokens,
            cost,
            latency_ms: request.latency_ms,
            status_code: request.status_code,
            error: request.error.clone(),
            timestamp: Utc::now(),
        };

        let mut summary = with_schema_retry(self.store.as_ref(), || {
            self.store.get_summary(&request.user_id, &period_key)
        })
        .map_err(storage_err)?
        .unwrap_or_else(|| UsageSummary::new(request.user_id, period_key.clone()));

        summary.record(
            request.category.clone(),
            &request.provider,
            tokens,
            cost.total_micros,
            request.latency_ms,
            entry.is_success(),
        );
        summary.status = UsageStatus::from_percent(max_usage_percent(&plan, &summary));

        with_schema_retry(self.store.as_ref(), || {
            self.store.record_usage(&entry, &summary)
        })
        .map_err(storage_err)?;

        tracing::debug!(
            user_id = %request.user_id,
            period_key = %period_key,
            category = %request.category,
            provider = %request.provider,
            cost_micros = cost.total_micros,
            status = ?summary.status,
            "Usage recorded"
        );

        self.emit_alerts(&plan, &summary, &request.category);

        Ok(LedgerDelta {
            period_key,
            cost,
            tokens_delta: tokens,
            new_status: summary.status,
        })
    }

    /// The plan to measure usage against. A missing plan row must not
    /// block billing, so it degrades to an unlimited placeholder.
    fn effective_plan(&self, tier: Option<&str>) -> Result<Plan, QuotaError> {
        let tier = tier.unwrap_or(FREE_TIER);
        let plan = with_schema_retry(self.store.as_ref(), || self.store.get_plan(tier))
            .map_err(storage_err)?;
        Ok(plan.unwrap_or_else(|| Plan::new(tier)))
    }

    fn compute_cost(&self, request: &RecordUsage) -> CostBreakdown {
        if let Some(total_micros) = request.cost_override_micros {
            return CostBreakdown {
                input_micros: 0,
                output_micros: 0,
                total_micros,
            };
        }
        let entry = self.prices.resolve(&request.provider, &request.model);
        PriceTable::compute_cost(
            entry,
            request.input_tokens,
            request.output_tokens,
            1,
            request.images,
            request.pages,
        )
    }

    /// Emit threshold alerts for the recorded category.
    ///
    /// One alert row exists per (user, period, category, threshold); row
    /// existence is the dedup guard. Failures here are logged and
    /// swallowed: alerting must never fail the recording.
    fn emit_alerts(&self, plan: &Plan, summary: &UsageSummary, category: &ResourceCategory) {
        let observed = category_percent(plan, summary, category);

        for &threshold in &self.alert_thresholds {
            if observed < f64::from(threshold) {
                continue;
            }

            let exists = match with_schema_retry(self.store.as_ref(), || {
                self.store
                    .has_alert(&summary.user_id, &summary.period_key, category, threshold)
            }) {
                Ok(exists) => exists,
                Err(e) => {
                    tracing::warn!(error = %e, threshold, "Alert dedup check failed; skipping");
                    continue;
                }
            };
            if exists {
                continue;
            }

            let alert = UsageAlert::new(
                summary.user_id,
                summary.period_key.clone(),
                category.clone(),
                threshold,
                observed,
            );
            if let Err(e) =
                with_schema_retry(self.store.as_ref(), || self.store.put_alert(&alert))
            {
                tracing::warn!(error = %e, threshold, "Alert insert failed; continuing");
            } else {
                tracing::info!(
                    user_id = %summary.user_id,
                    period_key = %summary.period_key,
                    category = %category,
                    threshold,
                    usage_percent = observed,
                    severity = ?alert.severity,
                    "Usage threshold crossed"
                );
            }
        }
    }
}

fn ratio_percent(current: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let p = current as f64 / limit as f64 * 100.0;
        p
    }
}

fn spend_percent(current: i64, limit: i64) -> f64 {
    if limit <= 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let p = current as f64 / limit as f64 * 100.0;
        p
    }
}

/// Highest usage percentage for one category, with the monetary ceiling
/// folded in (a cost-driven alert reports under the category that tipped
/// it).
fn category_percent(plan: &Plan, summary: &UsageSummary, category: &ResourceCategory) -> f64 {
    let mut max = spend_percent(summary.total_cost_micros, plan.monthly_cost_limit_micros);

    if let Some(usage) = summary.categories.get(category) {
        if let Some(limits) = plan.categories.get(category) {
            let totals = usage.totals();
            max = max.max(ratio_percent(totals.calls, limits.max_calls));
            max = max.max(ratio_percent(totals.tokens, limits.max_tokens));
        } else {
            for (provider, counters) in &usage.providers {
                let limits = plan.limits_for(category, provider);
                max = max.max(ratio_percent(counters.calls, limits.max_calls));
                max = max.max(ratio_percent(counters.tokens, limits.max_tokens));
            }
        }
    }
    max
}

/// Highest usage percentage across every limit dimension of the summary.
fn max_usage_percent(plan: &Plan, summary: &UsageSummary) -> f64 {
    let mut max = spend_percent(summary.total_cost_micros, plan.monthly_cost_limit_micros);
    for category in summary.categories.keys() {
        max = max.max(category_percent(plan, summary, category));
    }
    max
}

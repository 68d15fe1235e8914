//! Limit validation: single-operation and batch admission checks.
//!
//! Both checks are pure read + simulate: nothing is ever written, so a
//! caller can re-run them cheaply. Denials are ordinary return values with
//! structured diagnostics a UI can render; internal storage failures are
//! caught at this boundary and converted to a fail-closed denial.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quota_core::{
    Counters, PriceTable, QuotaError, ResourceCategory, UserId, DEFAULT_MODEL,
};
use quota_store::Store;

use crate::cache::QuotaCache;
use crate::config::EngineConfig;
use crate::renewal::RenewalManager;
use crate::snapshot::{load_entitlements, EntitlementSnapshot};

/// Denial reason when validation itself failed (fail closed).
pub const VALIDATION_FAILED: &str = "failed to validate limits";

/// Denial reason for a lapsed, non-renewing subscription.
pub const SUBSCRIPTION_EXPIRED: &str = "subscription expired";

/// Denial reason when neither a subscription nor a free tier exists.
pub const NO_ACTIVE_PLAN: &str = "no active plan";

/// The outcome of a single-operation admission check.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    /// Whether the operation may proceed.
    pub allowed: bool,

    /// Denial reason, present when `allowed` is false.
    pub reason: Option<String>,

    /// Current/limit numbers and usage percentages for UI display.
    pub details: DecisionDetails,
}

impl Decision {
    /// An allowing decision.
    #[must_use]
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            details: DecisionDetails::default(),
        }
    }

    /// A denying decision.
    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            details: DecisionDetails::default(),
        }
    }

    /// Attach diagnostics.
    #[must_use]
    pub fn with_details(mut self, details: DecisionDetails) -> Self {
        self.details = details;
        self
    }
}

/// Diagnostics attached to a decision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecisionDetails {
    /// Calls used in the current period (unified sum for LLM categories).
    pub current_calls: u64,

    /// Call limit (0 = unlimited).
    pub call_limit: u64,

    /// Tokens used in the current period.
    pub current_tokens: u64,

    /// Tokens this check was asked about.
    pub requested_tokens: u64,

    /// Token limit (0 = unlimited).
    pub token_limit: u64,

    /// Monetary cost accrued this period, in micro-dollars.
    pub current_cost_micros: i64,

    /// Monthly cost ceiling in micro-dollars (0 = unlimited).
    pub cost_limit_micros: i64,

    /// Call usage percentage (0 when unlimited).
    pub call_percent: f64,

    /// Token usage percentage (0 when unlimited).
    pub token_percent: f64,

    /// Cost usage percentage (0 when unlimited).
    pub cost_percent: f64,
}

/// One planned external call in a batch admission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Logical resource category of the planned call.
    pub category: ResourceCategory,

    /// Tokens the call is expected to consume (0 still counts one call).
    pub tokens_requested: u64,

    /// Vendor display name the call will route to.
    pub provider: String,

    /// Free-form operation label for diagnostics (e.g. "scene_render").
    pub operation_type: String,
}

impl Operation {
    /// Create an operation.
    #[must_use]
    pub fn new(
        category: ResourceCategory,
        provider: impl Into<String>,
        tokens_requested: u64,
    ) -> Self {
        Self {
            category,
            tokens_requested,
            provider: provider.into(),
            operation_type: String::new(),
        }
    }

    /// Set the operation label (builder style).
    #[must_use]
    pub fn with_operation_type(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = operation_type.into();
        self
    }
}

/// The outcome of a batch admission check.
#[derive(Debug, Clone, Serialize)]
pub struct BatchDecision {
    /// Whether the whole batch may proceed.
    pub allowed: bool,

    /// Denial message naming the failing step and the numbers behind it.
    pub message: Option<String>,

    /// Zero-based index of the first operation that would fail.
    pub failing_index: Option<usize>,

    /// Diagnostics for the batch as a whole.
    pub details: DecisionDetails,
}

impl BatchDecision {
    fn allowed(details: DecisionDetails) -> Self {
        Self {
            allowed: true,
            message: None,
            failing_index: None,
            details,
        }
    }

    fn denied(message: impl Into<String>, failing_index: Option<usize>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
            failing_index,
            details: DecisionDetails::default(),
        }
    }
}

/// Pre-flight admission control against plan limits.
pub struct LimitValidator {
    store: Arc<dyn Store>,
    cache: Arc<dyn QuotaCache>,
    renewal: RenewalManager,
    prices: PriceTable,
}

impl LimitValidator {
    /// Create a validator over a store and an injected cache service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn QuotaCache>, config: &EngineConfig) -> Self {
        let renewal = RenewalManager::new(Arc::clone(&store), Arc::clone(&cache));
        Self {
            store,
            cache,
            renewal,
            prices: config.price_table(),
        }
    }

    /// Check whether one operation is admissible.
    ///
    /// The provider names the vendor the call would route to; unified
    /// categories pool all vendors so it only disambiguates per-vendor
    /// budgets and legacy per-provider plan rows.
    ///
    /// A cached decision for the same (user, category) within the TTL is
    /// returned as-is; the ledger may have moved underneath (bounded
    /// staleness).
    pub fn check_single(
        &self,
        user_id: &UserId,
        category: &ResourceCategory,
        provider: &str,
        tokens_requested: u64,
    ) -> Decision {
        if let Some(cached) = self.cache.get_decision(user_id, category) {
            return cached;
        }

        match self.load_snapshot(user_id) {
            Ok(snapshot) => {
                let decision = evaluate_single(&snapshot, category, provider, tokens_requested);
                self.cache.set_decision(user_id, category, decision.clone());
                decision
            }
            Err(e) => Decision::denied(fail_closed_reason(user_id, &e)),
        }
    }

    /// Check whether an entire planned sequence of operations is
    /// admissible, before the first one is issued.
    ///
    /// Simulates the cumulative effect of the batch against one consistent
    /// ledger snapshot; on denial the message pinpoints the failing step.
    /// Never writes, so re-running is free of side effects.
    pub fn check_batch(&self, user_id: &UserId, operations: &[Operation]) -> BatchDecision {
        match self.load_snapshot(user_id) {
            Ok(snapshot) => simulate_batch(&snapshot, operations, &self.prices),
            Err(e) => BatchDecision::denied(fail_closed_reason(user_id, &e), None),
        }
    }

    /// Drop all cached decisions and snapshots for a user.
    ///
    /// Call on any entitlement change (plan upgrade, renewal,
    /// reactivation) so a stale denial cannot outlive it.
    pub fn invalidate_user(&self, user_id: &UserId) {
        tracing::debug!(user_id = %user_id, "Invalidating cached quota decisions");
        self.cache.invalidate_user(user_id);
    }

    fn load_snapshot(&self, user_id: &UserId) -> Result<EntitlementSnapshot, QuotaError> {
        if let Some(snapshot) = self.cache.get_snapshot(user_id) {
            return Ok(snapshot);
        }
        let snapshot = load_entitlements(self.store.as_ref(), &self.renewal, user_id)?;
        self.cache.set_snapshot(user_id, snapshot.clone());
        Ok(snapshot)
    }
}

/// Convert an internal failure into a caller-renderable denial reason.
///
/// Entitlement states map to their specific reasons; anything else is a
/// storage-level failure and fails closed behind a generic message.
fn fail_closed_reason(user_id: &UserId, error: &QuotaError) -> String {
    match error {
        QuotaError::SubscriptionExpired { .. } => SUBSCRIPTION_EXPIRED.to_string(),
        QuotaError::NoActivePlan { .. } | QuotaError::PlanNotFound { .. } => {
            NO_ACTIVE_PLAN.to_string()
        }
        other => {
            tracing::error!(user_id = %user_id, error = %other, "Limit validation failed; denying");
            VALIDATION_FAILED.to_string()
        }
    }
}

fn percent(current: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let p = current as f64 / limit as f64 * 100.0;
        p
    }
}

fn cost_percent(current: i64, limit: i64) -> f64 {
    if limit <= 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let p = current as f64 / limit as f64 * 100.0;
        p
    }
}

fn evaluate_single(
    snapshot: &EntitlementSnapshot,
    category: &ResourceCategory,
    provider: &str,
    tokens_requested: u64,
) -> Decision {
    let summary = &snapshot.summary;
    // Unified categories draw on the pooled counters; everything else is
    // budgeted per vendor, mirroring the batch simulation.
    let usage = if category.is_unified() {
        summary.category_totals(category)
    } else {
        summary.provider_counters(category, provider)
    };
    let limits = snapshot.plan.limits_for(category, provider);
    let cost_limit = snapshot.plan.monthly_cost_limit_micros;

    let details = DecisionDetails {
        current_calls: usage.calls,
        call_limit: limits.max_calls,
        current_tokens: usage.tokens,
        requested_tokens: tokens_requested,
        token_limit: limits.max_tokens,
        current_cost_micros: summary.total_cost_micros,
        cost_limit_micros: cost_limit,
        call_percent: percent(usage.calls, limits.max_calls),
        token_percent: percent(usage.tokens, limits.max_tokens),
        cost_percent: cost_percent(summary.total_cost_micros, cost_limit),
    };

    // Call-count check. A limit of 0 always passes (unlimited).
    if limits.max_calls > 0 && usage.calls + 1 > limits.max_calls {
        return Decision::denied(format!(
            "{category} call limit reached: {used} of {limit} calls used this period",
            used = usage.calls,
            limit = limits.max_calls,
        ))
        .with_details(details);
    }

    // Token check applies only to unified (LLM-style) categories.
    if category.is_unified()
        && limits.max_tokens > 0
        && usage.tokens + tokens_requested > limits.max_tokens
    {
        return Decision::denied(format!(
            "{category} token limit exceeded: {used} used, {requested} requested, limit {limit}",
            used = usage.tokens,
            requested = tokens_requested,
            limit = limits.max_tokens,
        ))
        .with_details(details);
    }

    // Monetary ceiling.
    if cost_limit > 0 && summary.total_cost_micros >= cost_limit {
        return Decision::denied(format!(
            "monthly cost limit reached: {used} of {limit} micro-dollars used",
            used = summary.total_cost_micros,
            limit = cost_limit,
        ))
        .with_details(details);
    }

    Decision::allowed().with_details(details)
}

/// Budget bucket an operation draws from during simulation.
///
/// Unified (LLM-style) categories pool all vendors into one bucket;
/// everything else is isolated per (category, vendor).
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum BudgetKey {
    Unified(ResourceCategory),
    PerProvider(ResourceCategory, String),
}

struct RunningBudget {
    base: Counters,
    projected: Counters,
}

fn estimate_operation_cost(prices: &PriceTable, op: &Operation) -> i64 {
    // Operations carry no model, so project against the vendor's default
    // price row; the authoritative cost is computed at record time.
    let entry = prices.resolve(&op.provider, DEFAULT_MODEL);
    PriceTable::compute_cost(entry, op.tokens_requested, 0, 1, 0, 0).total_micros
}

#[allow(clippy::too_many_lines)]
fn simulate_batch(
    snapshot: &EntitlementSnapshot,
    operations: &[Operation],
    prices: &PriceTable,
) -> BatchDecision {
    let summary = &snapshot.summary;
    let plan = &snapshot.plan;
    let cost_limit = plan.monthly_cost_limit_micros;

    // Running totals live only for this simulation; nothing is persisted.
    let mut budgets: BTreeMap<BudgetKey, RunningBudget> = BTreeMap::new();
    let base_cost = summary.total_cost_micros;
    let mut projected_cost = base_cost;

    for (index, op) in operations.iter().enumerate() {
        let key = if op.category.is_unified() {
            BudgetKey::Unified(op.category.clone())
        } else {
            BudgetKey::PerProvider(op.category.clone(), op.provider.clone())
        };
        let budget = budgets.entry(key).or_insert_with(|| {
            let base = if op.category.is_unified() {
                summary.category_totals(&op.category)
            } else {
                summary.provider_counters(&op.category, &op.provider)
            };
            RunningBudget {
                base,
                projected: base,
            }
        });
        let limits = plan.limits_for(&op.category, &op.provider);

        // Calls: a zero-token operation still consumes one call.
        let projected_calls = budget.projected.calls + 1;
        if limits.max_calls > 0 && projected_calls > limits.max_calls {
            return BatchDecision::denied(
                format!(
                    "operation {index} ({kind} via {provider}) exceeds the {category} call \
                     limit: {base} calls used before this batch, {earlier} added by earlier \
                     operations, 1 requested, limit {limit}",
                    kind = op.operation_type,
                    provider = op.provider,
                    category = op.category,
                    base = budget.base.calls,
                    earlier = budget.projected.calls - budget.base.calls,
                    limit = limits.max_calls,
                ),
                Some(index),
            );
        }

        // Tokens: unified categories only; a zero limit never denies.
        let projected_tokens = budget.projected.tokens + op.tokens_requested;
        if op.category.is_unified() && limits.max_tokens > 0 && projected_tokens > limits.max_tokens
        {
            return BatchDecision::denied(
                format!(
                    "operation {index} ({kind} via {provider}) exceeds the {category} token \
                     limit: {base} tokens used before this batch, {earlier} projected by \
                     earlier operations, {requested} requested, limit {limit}",
                    kind = op.operation_type,
                    provider = op.provider,
                    category = op.category,
                    base = budget.base.tokens,
                    earlier = budget.projected.tokens - budget.base.tokens,
                    requested = op.tokens_requested,
                    limit = limits.max_tokens,
                ),
                Some(index),
            );
        }

        // Projected spend against the monthly ceiling.
        let cost_estimate = estimate_operation_cost(prices, op);
        if cost_limit > 0 && projected_cost + cost_estimate > cost_limit {
            return BatchDecision::denied(
                format!(
                    "operation {index} ({kind} via {provider}) exceeds the monthly cost \
                     limit: {base} micro-dollars spent before this batch, {earlier} projected \
                     by earlier operations, {requested} estimated for this operation, \
                     limit {limit}",
                    kind = op.operation_type,
                    provider = op.provider,
                    base = base_cost,
                    earlier = projected_cost - base_cost,
                    requested = cost_estimate,
                    limit = cost_limit,
                ),
                Some(index),
            );
        }

        // Commit the projection (in memory only) and continue.
        budget.projected.calls = projected_calls;
        budget.projected.tokens = projected_tokens;
        budget.projected.cost_micros += cost_estimate;
        projected_cost += cost_estimate;
    }

    BatchDecision::allowed(DecisionDetails {
        current_cost_micros: base_cost,
        cost_limit_micros: cost_limit,
        cost_percent: cost_percent(base_cost, cost_limit),
        ..DecisionDetails::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quota_core::{CategoryLimits, Plan, UsageSummary};

    fn snapshot_with(plan: Plan, summary: UsageSummary) -> EntitlementSnapshot {
        let period_key = summary.period_key.clone();
        EntitlementSnapshot {
            plan,
            subscription: None,
            summary,
            period_key,
        }
    }

    fn text_plan(max_calls: u64, max_tokens: u64) -> Plan {
        Plan::new("test").with_category(
            ResourceCategory::TextGeneration,
            CategoryLimits::new(max_calls, max_tokens),
        )
    }

    fn text_op(tokens: u64) -> Operation {
        Operation::new(ResourceCategory::TextGeneration, "anthropic", tokens)
            .with_operation_type("prompt_expansion")
    }

    #[test]
    fn single_allows_under_limits() {
        let summary = UsageSummary::new(UserId::generate(), "2026-08");
        let snapshot = snapshot_with(text_plan(10, 10_000), summary);

        let decision =
            evaluate_single(&snapshot, &ResourceCategory::TextGeneration, "anthropic", 500);
        assert!(decision.allowed);
        assert_eq!(decision.details.call_limit, 10);
    }

    #[test]
    fn single_denies_at_call_limit_with_diagnostics() {
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        for _ in 0..10 {
            summary.record(ResourceCategory::TextGeneration, "anthropic", 10, 1, 100, true);
        }
        let snapshot = snapshot_with(text_plan(10, 0), summary);

        let decision =
            evaluate_single(&snapshot, &ResourceCategory::TextGeneration, "anthropic", 0);
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("call limit"), "{reason}");
        assert_eq!(decision.details.current_calls, 10);
        assert!((decision.details.call_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_token_denial_carries_current_requested_limit() {
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        summary.record(ResourceCategory::TextGeneration, "anthropic", 9_000, 1, 100, true);
        let snapshot = snapshot_with(text_plan(0, 10_000), summary);

        let decision =
            evaluate_single(&snapshot, &ResourceCategory::TextGeneration, "anthropic", 2_000);
        assert!(!decision.allowed);
        assert_eq!(decision.details.current_tokens, 9_000);
        assert_eq!(decision.details.requested_tokens, 2_000);
        assert_eq!(decision.details.token_limit, 10_000);
    }

    #[test]
    fn single_zero_limits_never_deny() {
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        for _ in 0..1_000 {
            summary.record(ResourceCategory::TextGeneration, "anthropic", 1_000, 500, 100, true);
        }
        let snapshot = snapshot_with(text_plan(0, 0), summary);

        let decision = evaluate_single(
            &snapshot,
            &ResourceCategory::TextGeneration,
            "anthropic",
            u64::MAX / 2,
        );
        assert!(decision.allowed);
    }

    #[test]
    fn single_denies_at_cost_ceiling() {
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        summary.record(ResourceCategory::TextGeneration, "anthropic", 10, 1_000_000, 100, true);
        let snapshot = snapshot_with(text_plan(0, 0).with_cost_limit(1_000_000), summary);

        let decision =
            evaluate_single(&snapshot, &ResourceCategory::TextGeneration, "anthropic", 10);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("cost limit"));
    }

    #[test]
    fn single_enforces_legacy_provider_rows() {
        // No category entry; only a legacy per-vendor row.
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        summary.record(ResourceCategory::VideoGeneration, "runway", 0, 0, 100, true);
        let plan = Plan::new("test").with_provider("runway", CategoryLimits::new(1, 0));
        let snapshot = snapshot_with(plan, summary);

        let decision =
            evaluate_single(&snapshot, &ResourceCategory::VideoGeneration, "runway", 0);
        assert!(!decision.allowed);
        assert_eq!(decision.details.current_calls, 1);
        assert_eq!(decision.details.call_limit, 1);

        // A different vendor has its own (unconfigured, unlimited) budget.
        let decision =
            evaluate_single(&snapshot, &ResourceCategory::VideoGeneration, "pika", 0);
        assert!(decision.allowed);
    }

    #[test]
    fn batch_failing_index_is_remaining_call_budget() {
        // call_limit = 10, 7 calls used: ops 0..2 fit, op 3 fails.
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        for _ in 0..7 {
            summary.record(ResourceCategory::TextGeneration, "anthropic", 0, 0, 100, true);
        }
        let snapshot = snapshot_with(text_plan(10, 0), summary);

        let ops: Vec<Operation> = (0..5).map(|_| text_op(0)).collect();
        let decision = simulate_batch(&snapshot, &ops, &PriceTable::default());
        assert!(!decision.allowed);
        assert_eq!(decision.failing_index, Some(3));
    }

    #[test]
    fn batch_failing_index_for_tokens() {
        // token_limit = 10_000, 2_500 used, 2_000 per op:
        // floor((10_000 - 2_500) / 2_000) = 3.
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        summary.record(ResourceCategory::TextGeneration, "anthropic", 2_500, 0, 100, true);
        let snapshot = snapshot_with(text_plan(0, 10_000), summary);

        let ops: Vec<Operation> = (0..5).map(|_| text_op(2_000)).collect();
        let decision = simulate_batch(&snapshot, &ops, &PriceTable::default());
        assert!(!decision.allowed);
        assert_eq!(decision.failing_index, Some(3));

        let message = decision.message.unwrap();
        assert!(message.contains("2500 tokens used before this batch"), "{message}");
        assert!(message.contains("6000 projected by earlier operations"), "{message}");
        assert!(message.contains("2000 requested"), "{message}");
        assert!(message.contains("limit 10000"), "{message}");
    }

    #[test]
    fn batch_fits_exactly_when_budget_suffices() {
        let user_id = UserId::generate();
        let mut summary = UsageSummary::new(user_id, "2026-08");
        summary.record(ResourceCategory::TextGeneration, "anthropic", 2_000, 0, 100, true);
        let snapshot = snapshot_with(text_plan(0, 10_000), summary);

        // 2_000 + 4 * 2_000 = 10_000 exactly.
        let ops: Vec<Operation> = (0..4).map(|_| text_op(2_000)).collect();
        let decision = simulate_batch(&snapshot, &ops, &PriceTable::default());
        assert!(decision.allowed);
    }

    #[test]
    fn batch_unified_budget_pools_vendors() {
        // Two vendors draw from the same text-generation budget.
        let user_id = UserId::generate();
        let summary = UsageSummary::new(user_id, "2026-08");
        let snapshot = snapshot_with(text_plan(2, 0), summary);

        let ops = vec![
            Operation::new(ResourceCategory::TextGeneration, "anthropic", 0),
            Operation::new(ResourceCategory::TextGeneration, "openai", 0),
            Operation::new(ResourceCategory::TextGeneration, "google", 0),
        ];
        let decision = simulate_batch(&snapshot, &ops, &PriceTable::default());
        assert!(!decision.allowed);
        assert_eq!(decision.failing_index, Some(2));
    }

    #[test]
    fn batch_isolated_budgets_per_vendor() {
        // Per-provider rows: each image vendor has its own budget of 1.
        let user_id = UserId::generate();
        let summary = UsageSummary::new(user_id, "2026-08");
        let plan = Plan::new("test")
            .with_provider("openai-images", CategoryLimits::new(1, 0))
            .with_provider("stability", CategoryLimits::new(1, 0));
        let snapshot = snapshot_with(plan, summary);

        let ops = vec![
            Operation::new(ResourceCategory::ImageGeneration, "openai-images", 0),
            Operation::new(ResourceCategory::ImageGeneration, "stability", 0),
        ];
        let decision = simulate_batch(&snapshot, &ops, &PriceTable::default());
        assert!(decision.allowed);

        // A second call to either vendor fails on that vendor's budget.
        let ops = vec![
            Operation::new(ResourceCategory::ImageGeneration, "openai-images", 0),
            Operation::new(ResourceCategory::ImageGeneration, "openai-images", 0),
        ];
        let decision = simulate_batch(&snapshot, &ops, &PriceTable::default());
        assert!(!decision.allowed);
        assert_eq!(decision.failing_index, Some(1));
    }

    #[test]
    fn batch_projects_cost_against_ceiling() {
        let user_id = UserId::generate();
        let summary = UsageSummary::new(user_id, "2026-08");
        let plan = text_plan(0, 0).with_cost_limit(10_000); // $0.01
        let snapshot = snapshot_with(plan, summary);

        // 1M input tokens at anthropic default $3/1M = $3 >> $0.01.
        let ops = vec![text_op(1_000_000)];
        let decision = simulate_batch(&snapshot, &ops, &PriceTable::default());
        assert!(!decision.allowed);
        assert_eq!(decision.failing_index, Some(0));
        assert!(decision.message.unwrap().contains("cost limit"));
    }

    #[test]
    fn batch_empty_is_allowed() {
        let summary = UsageSummary::new(UserId::generate(), "2026-08");
        let snapshot = snapshot_with(text_plan(1, 1), summary);

        let decision = simulate_batch(&snapshot, &[], &PriceTable::default());
        assert!(decision.allowed);
    }
}

//! Usage ledger types for the quota engine.
//!
//! One `UsageSummary` row exists per (user, billing-period key) and carries
//! the counters the admission checks read. One `UsageLogEntry` row is
//! appended per completed external call and is never mutated afterwards; it
//! is the durable source of truth from which summaries can be rebuilt if
//! counters drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CostBreakdown, LogEntryId, ResourceCategory, UserId};

/// Usage percentage at which a summary moves to `Warning`.
pub const WARNING_PERCENT: f64 = 80.0;

/// Usage percentage at which a summary moves to `LimitReached`.
pub const LIMIT_REACHED_PERCENT: f64 = 100.0;

/// Cumulative counters for one vendor within one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Cumulative call count.
    pub calls: u64,

    /// Cumulative token count.
    pub tokens: u64,

    /// Cumulative monetary cost in micro-dollars.
    pub cost_micros: i64,
}

impl Counters {
    /// Add another counter set into this one.
    pub fn add(&mut self, other: Counters) {
        self.calls += other.calls;
        self.tokens += other.tokens;
        self.cost_micros += other.cost_micros;
    }
}

/// Per-vendor counters within one resource category.
///
/// The category totals are defined as the sum over vendors, so a unified
/// (LLM-style) budget check reads the sum and a per-vendor check reads one
/// entry; there is no separate aggregate to keep consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUsage {
    /// Counters keyed by vendor name.
    pub providers: BTreeMap<String, Counters>,
}

impl CategoryUsage {
    /// Sum of all vendor counters in this category.
    #[must_use]
    pub fn totals(&self) -> Counters {
        let mut total = Counters::default();
        for c in self.providers.values() {
            total.add(*c);
        }
        total
    }

    /// Counters for one vendor (zero if the vendor has no usage yet).
    #[must_use]
    pub fn provider(&self, provider: &str) -> Counters {
        self.providers.get(provider).copied().unwrap_or_default()
    }
}

/// Health of a usage summary relative to its plan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    /// All dimensions below the warning threshold.
    Active,

    /// At least one dimension at or above 80%.
    Warning,

    /// At least one dimension at or above 100%.
    LimitReached,
}

impl UsageStatus {
    /// Classify the maximum usage percentage across all limit dimensions.
    #[must_use]
    pub fn from_percent(max_percent: f64) -> Self {
        if max_percent >= LIMIT_REACHED_PERCENT {
            Self::LimitReached
        } else if max_percent >= WARNING_PERCENT {
            Self::Warning
        } else {
            Self::Active
        }
    }
}

/// The per-period usage ledger row for one user.
///
/// Counters are monotonically non-decreasing within a period; the only
/// reset is the explicit renewal reset, which writes a fresh zeroed row for
/// the new period key while historical audit rows stay intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    /// The user this ledger row belongs to.
    pub user_id: UserId,

    /// Billing-period key (`YYYY-MM`).
    pub period_key: String,

    /// Per-category, per-vendor counters.
    pub categories: BTreeMap<ResourceCategory, CategoryUsage>,

    /// Aggregate call count across all categories.
    pub total_calls: u64,

    /// Aggregate token count across all categories.
    pub total_tokens: u64,

    /// Aggregate cost in micro-dollars across all categories.
    pub total_cost_micros: i64,

    /// Number of recorded calls with a non-success status.
    pub error_count: u64,

    /// Online running mean of recorded latencies, in milliseconds.
    pub avg_response_time_ms: f64,

    /// Percentage of recorded calls with a non-success status.
    pub error_rate: f64,

    /// Health relative to plan limits, recomputed on every record.
    pub status: UsageStatus,

    /// When this row was created.
    pub created_at: DateTime<Utc>,

    /// When this row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl UsageSummary {
    /// Create a zeroed summary for a user and period.
    #[must_use]
    pub fn new(user_id: UserId, period_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            period_key: period_key.into(),
            categories: BTreeMap::new(),
            total_calls: 0,
            total_tokens: 0,
            total_cost_micros: 0,
            error_count: 0,
            avg_response_time_ms: 0.0,
            error_rate: 0.0,
            status: UsageStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Summed counters for a category (the unified-budget view).
    #[must_use]
    pub fn category_totals(&self, category: &ResourceCategory) -> Counters {
        self.categories
            .get(category)
            .map(CategoryUsage::totals)
            .unwrap_or_default()
    }

    /// Counters for one vendor within a category.
    #[must_use]
    pub fn provider_counters(&self, category: &ResourceCategory, provider: &str) -> Counters {
        self.categories
            .get(category)
            .map(|c| c.provider(provider))
            .unwrap_or_default()
    }

    /// Apply one completed call to the ledger.
    ///
    /// Increments the (category, vendor) counters and aggregate totals,
    /// folds the latency into the online running mean
    /// (`new_avg = (old_avg * (n - 1) + latency) / n`), and recomputes the
    /// running error rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(
        &mut self,
        category: ResourceCategory,
        provider: &str,
        tokens: u64,
        cost_micros: i64,
        latency_ms: u64,
        success: bool,
    ) {
        let delta = Counters {
            calls: 1,
            tokens,
            cost_micros,
        };
        self.categories
            .entry(category)
            .or_default()
            .providers
            .entry(provider.to_string())
            .or_default()
            .add(delta);

        self.total_calls += 1;
        self.total_tokens += tokens;
        self.total_cost_micros += cost_micros;
        if !success {
            self.error_count += 1;
        }

        let n = self.total_calls as f64;
        self.avg_response_time_ms =
            (self.avg_response_time_ms * (n - 1.0) + latency_ms as f64) / n;
        self.error_rate = self.error_count as f64 / n * 100.0;
        self.updated_at = Utc::now();
    }
}

/// An immutable audit row for one completed external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
    /// Time-ordered entry ID.
    pub id: LogEntryId,

    /// The user charged for the call.
    pub user_id: UserId,

    /// Billing-period key the call accrued under.
    pub period_key: String,

    /// Logical resource category of the call.
    pub category: ResourceCategory,

    /// The actual vendor that fulfilled the call (several logical
    /// categories are served by swappable underlying vendors).
    pub provider: String,

    /// The resolved model name.
    pub model: String,

    /// Input (prompt) tokens.
    pub input_tokens: u64,

    /// Output (completion) tokens.
    pub output_tokens: u64,

    /// Cost breakdown in micro-dollars.
    pub cost: CostBreakdown,

    /// Call latency in milliseconds.
    pub latency_ms: u64,

    /// HTTP-style status code of the call.
    pub status_code: u16,

    /// Error text if the call failed.
    pub error: Option<String>,

    /// When the call completed.
    pub timestamp: DateTime<Utc>,
}

impl UsageLogEntry {
    /// Whether the recorded call succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// Severity of a threshold alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// 80% threshold.
    Info,

    /// 90% threshold.
    Warning,

    /// 100% threshold.
    Error,
}

impl AlertSeverity {
    /// Severity escalates with the crossed threshold.
    #[must_use]
    pub fn for_threshold(threshold: u8) -> Self {
        if threshold >= 100 {
            Self::Error
        } else if threshold >= 90 {
            Self::Warning
        } else {
            Self::Info
        }
    }
}

/// One alert row per (user, period, category, threshold).
///
/// Row existence is the deduplication guard: crossing the same threshold
/// twice within a period creates no second row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAlert {
    /// The user the alert is for.
    pub user_id: UserId,

    /// Billing-period key.
    pub period_key: String,

    /// Resource category whose usage crossed the threshold.
    pub category: ResourceCategory,

    /// The crossed threshold percentage (80, 90, or 100).
    pub threshold: u8,

    /// Escalating severity derived from the threshold.
    pub severity: AlertSeverity,

    /// Usage percentage observed when the threshold was crossed.
    pub usage_percent: f64,

    /// Whether the notification for this alert has been dispatched.
    pub is_sent: bool,

    /// When the alert was created.
    pub created_at: DateTime<Utc>,
}

impl UsageAlert {
    /// Create an alert for a crossed threshold.
    #[must_use]
    pub fn new(
        user_id: UserId,
        period_key: impl Into<String>,
        category: ResourceCategory,
        threshold: u8,
        usage_percent: f64,
    ) -> Self {
        Self {
            user_id,
            period_key: period_key.into(),
            category,
            threshold,
            severity: AlertSeverity::for_threshold(threshold),
            usage_percent,
            is_sent: false,
            created_at: Utc::now(),
        }
    }
}

//! Plan and subscription types for the quota engine.
//!
//! Plans are immutable reference data created by administrators; the engine
//! only reads them. A subscription binds a user to a plan for a recurring
//! billing period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ResourceCategory, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Tier name of the built-in free plan.
pub const FREE_TIER: &str = "free";

/// Free tier monthly call allowance for LLM text generation.
pub const FREE_TEXT_CALLS: u64 = 50;

/// Free tier monthly token allowance for LLM text generation.
pub const FREE_TEXT_TOKENS: u64 = 100_000;

/// Free tier monthly call allowance for image generation.
pub const FREE_IMAGE_CALLS: u64 = 10;

/// Free tier monthly cost ceiling in micro-dollars ($1).
pub const FREE_COST_LIMIT_MICROS: i64 = 1_000_000;

/// Days in a monthly billing period.
pub const MONTHLY_PERIOD_DAYS: i64 = 30;

/// Days in a yearly billing period.
pub const YEARLY_PERIOD_DAYS: i64 = 365;

// ============================================================================
// Limits
// ============================================================================

/// Call and token limits for one resource category or provider.
///
/// A limit value of **0 means unlimited** for that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLimits {
    /// Maximum calls per billing period (0 = unlimited).
    pub max_calls: u64,

    /// Maximum tokens per billing period (0 = unlimited).
    pub max_tokens: u64,
}

impl CategoryLimits {
    /// Create limits for both dimensions.
    #[must_use]
    pub const fn new(max_calls: u64, max_tokens: u64) -> Self {
        Self {
            max_calls,
            max_tokens,
        }
    }
}

/// A subscription plan: per-category entitlements plus a monetary ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Tier name (e.g. "free", "standard", "pro").
    pub tier: String,

    /// Unified limits per resource category.
    pub categories: BTreeMap<ResourceCategory, CategoryLimits>,

    /// Legacy per-provider limits, consulted only when the operation's
    /// category has no entry in `categories`.
    pub providers: BTreeMap<String, CategoryLimits>,

    /// Monthly monetary cost ceiling in micro-dollars (0 = unlimited).
    pub monthly_cost_limit_micros: i64,
}

impl Plan {
    /// Create an empty plan with the given tier name (all limits unlimited).
    #[must_use]
    pub fn new(tier: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            categories: BTreeMap::new(),
            providers: BTreeMap::new(),
            monthly_cost_limit_micros: 0,
        }
    }

    /// The built-in free tier, used when a user has no subscription.
    #[must_use]
    pub fn free() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            ResourceCategory::TextGeneration,
            CategoryLimits::new(FREE_TEXT_CALLS, FREE_TEXT_TOKENS),
        );
        categories.insert(
            ResourceCategory::ImageGeneration,
            CategoryLimits::new(FREE_IMAGE_CALLS, 0),
        );
        categories.insert(ResourceCategory::VideoGeneration, CategoryLimits::new(0, 0));
        Self {
            tier: FREE_TIER.to_string(),
            categories,
            providers: BTreeMap::new(),
            monthly_cost_limit_micros: FREE_COST_LIMIT_MICROS,
        }
    }

    /// Set the limits for a category (builder style).
    #[must_use]
    pub fn with_category(mut self, category: ResourceCategory, limits: CategoryLimits) -> Self {
        self.categories.insert(category, limits);
        self
    }

    /// Set legacy limits for a specific provider (builder style).
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>, limits: CategoryLimits) -> Self {
        self.providers.insert(provider.into(), limits);
        self
    }

    /// Set the monthly cost ceiling (builder style).
    #[must_use]
    pub const fn with_cost_limit(mut self, micros: i64) -> Self {
        self.monthly_cost_limit_micros = micros;
        self
    }

    /// Resolve the effective limits for an operation.
    ///
    /// Category-level (unified) limits win; when the category is not
    /// configured the legacy per-provider row is consulted; absent both,
    /// the operation is unlimited.
    #[must_use]
    pub fn limits_for(&self, category: &ResourceCategory, provider: &str) -> CategoryLimits {
        self.categories
            .get(category)
            .or_else(|| self.providers.get(provider))
            .copied()
            .unwrap_or_default()
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Length of the recurring billing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    /// 30-day periods.
    Monthly,

    /// 365-day periods.
    Yearly,
}

impl BillingCycle {
    /// Length of one period in days.
    #[must_use]
    pub const fn period_days(self) -> i64 {
        match self {
            Self::Monthly => MONTHLY_PERIOD_DAYS,
            Self::Yearly => YEARLY_PERIOD_DAYS,
        }
    }
}

/// A user's subscription to a plan.
///
/// At most one active subscription exists per user; storage is keyed on
/// `user_id` so the invariant holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscribed user.
    pub user_id: UserId,

    /// Tier name of the referenced plan.
    pub plan_tier: String,

    /// Start of the current billing period.
    pub period_start: DateTime<Utc>,

    /// End of the current billing period.
    pub period_end: DateTime<Utc>,

    /// Period length.
    pub billing_cycle: BillingCycle,

    /// Whether lapsed periods roll over automatically.
    pub auto_renew: bool,

    /// Whether the subscription is active.
    pub is_active: bool,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,

    /// When the subscription was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Create a subscription starting now.
    #[must_use]
    pub fn new(user_id: UserId, plan_tier: impl Into<String>, cycle: BillingCycle) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            plan_tier: plan_tier.into(),
            period_start: now,
            period_end: now + chrono::Duration::days(cycle.period_days()),
            billing_cycle: cycle,
            auto_renew: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the current period has lapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.period_end < now
    }

    /// The billing-period key (`YYYY-MM`) derived from the period start.
    #[must_use]
    pub fn period_key(&self) -> String {
        self.period_start.format("%Y-%m").to_string()
    }
}

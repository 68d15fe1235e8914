//! Error types for the quota engine.
//!
//! Entitlement denials are ordinary return values carrying diagnostics, not
//! errors; this enum covers the internal failures behind them.

use crate::ids::IdError;

/// Result type for quota operations.
pub type Result<T> = std::result::Result<T, QuotaError>;

/// Errors that can occur in quota operations.
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// The user has no subscription and no free-tier plan is configured.
    #[error("no active plan for user {user_id}")]
    NoActivePlan {
        /// The user without a plan.
        user_id: String,
    },

    /// The subscription lapsed and auto-renew is disabled.
    #[error("subscription expired for user {user_id}")]
    SubscriptionExpired {
        /// The user with the lapsed subscription.
        user_id: String,
    },

    /// A referenced plan tier does not exist.
    #[error("plan not found: {tier}")]
    PlanNotFound {
        /// The missing tier name.
        tier: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

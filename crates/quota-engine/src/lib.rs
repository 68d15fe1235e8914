//! Admission control and usage accounting for the quota platform.
//!
//! This crate ties the core types and the storage layer together into the
//! three services callers interact with:
//!
//! - [`LimitValidator`]: pre-flight admission checks, single and batch
//! - [`UsageTracker`]: post-flight accounting of completed calls
//! - [`RenewalManager`]: billing-period rollover and counter resets
//!
//! [`QuotaEngine`] bundles the three over one store and one cache for the
//! common case.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quota_core::{ResourceCategory, UserId};
//! use quota_engine::{EngineConfig, QuotaEngine};
//! use quota_store::RocksStore;
//!
//! let store = Arc::new(RocksStore::open("/var/lib/quota-db").unwrap());
//! let engine = QuotaEngine::new(store, EngineConfig::from_env());
//!
//! let user_id = UserId::generate();
//! let decision =
//!     engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 4_000);
//! if decision.allowed {
//!     // issue the vendor call, then engine.record(...) what it consumed
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod config;
pub mod renewal;
pub mod snapshot;
pub mod tracker;
pub mod validator;

pub use cache::{NoCache, QuotaCache, TtlCache};
pub use config::{EngineConfig, DEFAULT_ALERT_THRESHOLDS, DEFAULT_CACHE_TTL_SECS};
pub use renewal::RenewalManager;
pub use snapshot::EntitlementSnapshot;
pub use tracker::{LedgerDelta, RecordUsage, UsageTracker};
pub use validator::{
    BatchDecision, Decision, DecisionDetails, LimitValidator, Operation, NO_ACTIVE_PLAN,
    SUBSCRIPTION_EXPIRED, VALIDATION_FAILED,
};

use std::sync::Arc;

use quota_core::{QuotaError, ResourceCategory, UserId};
use quota_store::Store;

/// The three quota services bundled over one store and one cache.
pub struct QuotaEngine {
    validator: LimitValidator,
    tracker: UsageTracker,
    renewal: RenewalManager,
}

impl QuotaEngine {
    /// Create an engine with the built-in TTL cache.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        let cache: Arc<dyn QuotaCache> = Arc::new(TtlCache::new(config.cache_ttl));
        Self::with_cache(store, cache, config)
    }

    /// Create an engine with an injected cache service.
    #[must_use]
    pub fn with_cache(
        store: Arc<dyn Store>,
        cache: Arc<dyn QuotaCache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            validator: LimitValidator::new(Arc::clone(&store), Arc::clone(&cache), &config),
            tracker: UsageTracker::new(Arc::clone(&store), Arc::clone(&cache), &config),
            renewal: RenewalManager::new(store, cache),
        }
    }

    /// Check whether one operation via the named vendor is admissible.
    pub fn check_single(
        &self,
        user_id: &UserId,
        category: &ResourceCategory,
        provider: &str,
        tokens_requested: u64,
    ) -> Decision {
        self.validator
            .check_single(user_id, category, provider, tokens_requested)
    }

    /// Check whether a planned sequence of operations is admissible.
    pub fn check_batch(&self, user_id: &UserId, operations: &[Operation]) -> BatchDecision {
        self.validator.check_batch(user_id, operations)
    }

    /// Record one completed call into the usage ledger.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Storage`] if the ledger write fails.
    pub fn record(&self, request: RecordUsage) -> Result<LedgerDelta, QuotaError> {
        self.tracker.record(request)
    }

    /// The current billing-period key for a user, advancing a lapsed
    /// auto-renewing subscription first.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Storage`] on storage failure.
    pub fn current_period_key(&self, user_id: &UserId) -> Result<String, QuotaError> {
        self.renewal.current_period_key(user_id)
    }

    /// Drop all cached decisions and snapshots for a user. Call on any
    /// entitlement change.
    pub fn invalidate_user(&self, user_id: &UserId) {
        self.validator.invalidate_user(user_id);
    }
}

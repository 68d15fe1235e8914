//! Storage layer for the quota admission-control engine.
//!
//! This crate provides persistent storage for plans, subscriptions, usage
//! summaries, the append-only usage log, and threshold alerts using
//! `RocksDB` with column families for efficient indexing. A mutex-protected
//! `MemoryStore` backs engine tests.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `plans`: Plan reference data, keyed by tier name
//! - `subscriptions`: One subscription per user, keyed by `user_id`
//! - `usage_summaries`: Per-period ledger rows, keyed by `user_id || period`
//! - `usage_log`: Append-only audit rows, keyed by ULID
//! - `usage_log_by_user`: Index for listing a user's audit rows
//! - `usage_alerts`: Deduplicated threshold alerts
//!
//! # Example
//!
//! ```no_run
//! use quota_store::{RocksStore, Store};
//! use quota_core::{Plan, UserId};
//!
//! let store = RocksStore::open("/tmp/quota-db").unwrap();
//!
//! store.put_plan(&Plan::free()).unwrap();
//! let plan = store.get_plan("free").unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use rocks::RocksStore;

use quota_core::{Plan, ResourceCategory, Subscription, UsageAlert, UsageLogEntry, UsageSummary, UserId};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (`RocksDB` for production, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Plan Operations
    // =========================================================================

    /// Insert or update a plan (administrator reference data).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_plan(&self, plan: &Plan) -> Result<()>;

    /// Get a plan by tier name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_plan(&self, tier: &str) -> Result<Option<Plan>>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Insert or update a user's subscription.
    ///
    /// Keyed on `user_id`, so at most one subscription row exists per user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Get a user's subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, user_id: &UserId) -> Result<Option<Subscription>>;

    // =========================================================================
    // Usage Summary Operations
    // =========================================================================

    /// Get the ledger row for a (user, period).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_summary(&self, user_id: &UserId, period_key: &str) -> Result<Option<UsageSummary>>;

    /// Insert or update a ledger row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_summary(&self, summary: &UsageSummary) -> Result<()>;

    // =========================================================================
    // Audit Log Operations
    // =========================================================================

    /// Append an immutable audit row. Also maintains the user index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_log_entry(&self, entry: &UsageLogEntry) -> Result<()>;

    /// List audit rows for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_log_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageLogEntry>>;

    // =========================================================================
    // Alert Operations
    // =========================================================================

    /// Whether an alert row exists for (user, period, category, threshold).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_alert(
        &self,
        user_id: &UserId,
        period_key: &str,
        category: &ResourceCategory,
        threshold: u8,
    ) -> Result<bool>;

    /// Insert an alert row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_alert(&self, alert: &UsageAlert) -> Result<()>;

    /// List alert rows for a (user, period).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_alerts(&self, user_id: &UserId, period_key: &str) -> Result<Vec<UsageAlert>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Persist one completed call: audit row, user index, and updated
    /// summary in a single atomic write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; on error nothing
    /// is written.
    fn record_usage(&self, entry: &UsageLogEntry, summary: &UsageSummary) -> Result<()>;

    /// Persist a billing-period rollover: the advanced subscription and a
    /// zeroed summary for the new period in a single atomic write.
    /// Historical audit rows are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; on error nothing
    /// is written.
    fn renew_subscription(
        &self,
        subscription: &Subscription,
        reset_summary: &UsageSummary,
    ) -> Result<()>;

    // =========================================================================
    // Schema Maintenance
    // =========================================================================

    /// Idempotently create any missing column families.
    ///
    /// Run when an operation fails with the
    /// [`StoreError::MissingColumnFamily`] schema-drift signature, then
    /// retry the operation once.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn repair_schema(&self) -> Result<()>;
}

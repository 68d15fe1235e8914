//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Plan reference data, keyed by tier name.
    pub const PLANS: &str = "plans";

    /// Subscriptions, keyed by `user_id` (one row per user).
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Per-period usage summaries, keyed by `user_id || period_key`.
    pub const USAGE_SUMMARIES: &str = "usage_summaries";

    /// Append-only audit log, keyed by `log_entry_id` (ULID).
    pub const USAGE_LOG: &str = "usage_log";

    /// Index: log entries by user, keyed by `user_id || log_entry_id`.
    /// Value is empty (index only).
    pub const USAGE_LOG_BY_USER: &str = "usage_log_by_user";

    /// Threshold alerts, keyed by
    /// `user_id || period_key || category || threshold`.
    pub const USAGE_ALERTS: &str = "usage_alerts";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PLANS,
        cf::SUBSCRIPTIONS,
        cf::USAGE_SUMMARIES,
        cf::USAGE_LOG,
        cf::USAGE_LOG_BY_USER,
        cf::USAGE_ALERTS,
    ]
}

//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait. Values are CBOR-encoded; compound operations use a `WriteBatch`
//! so the audit row and the summary it rolls up into can never diverge.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use quota_core::{
    Plan, ResourceCategory, Subscription, UsageAlert, UsageLogEntry, UsageSummary, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_column_families(path, &all_column_families())
    }

    /// Open a database with an explicit column family set.
    ///
    /// Production code uses [`RocksStore::open`]; this entry point exists
    /// so schema drift (a column family added by a newer build but absent
    /// from the physical store) can be reproduced and repaired under test.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with_column_families<P: AsRef<Path>>(
        path: P,
        column_families: &[&str],
    ) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = column_families
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    ///
    /// A missing handle is the schema-drift signature, reported as
    /// `MissingColumnFamily` so callers can repair and retry.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::MissingColumnFamily {
                name: name.to_string(),
            })
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_value<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Plan Operations
    // =========================================================================

    fn put_plan(&self, plan: &Plan) -> Result<()> {
        self.put_value(cf::PLANS, &keys::plan_key(&plan.tier), plan)
    }

    fn get_plan(&self, tier: &str) -> Result<Option<Plan>> {
        self.get_value(cf::PLANS, &keys::plan_key(tier))
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    fn put_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.put_value(
            cf::SUBSCRIPTIONS,
            &keys::subscription_key(&subscription.user_id),
            subscription,
        )
    }

    fn get_subscription(&self, user_id: &UserId) -> Result<Option<Subscription>> {
        self.get_value(cf::SUBSCRIPTIONS, &keys::subscription_key(user_id))
    }

    // =========================================================================
    // Usage Summary Operations
    // =========================================================================

    fn get_summary(&self, user_id: &UserId, period_key: &str) -> Result<Option<UsageSummary>> {
        self.get_value(cf::USAGE_SUMMARIES, &keys::summary_key(user_id, period_key))
    }

    fn put_summary(&self, summary: &UsageSummary) -> Result<()> {
        self.put_value(
            cf::USAGE_SUMMARIES,
            &keys::summary_key(&summary.user_id, &summary.period_key),
            summary,
        )
    }

    // =========================================================================
    // Audit Log Operations
    // =========================================================================

    fn append_log_entry(&self, entry: &UsageLogEntry) -> Result<()> {
        let cf_log = self.cf(cf::USAGE_LOG)?;
        let cf_by_user = self.cf(cf::USAGE_LOG_BY_USER)?;

        let log_key = keys::log_entry_key(&entry.id);
        let user_key = keys::user_log_key(&entry.user_id, &entry.id);
        let value = Self::serialize(entry)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_log, &log_key, &value);
        batch.put_cf(&cf_by_user, &user_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_log_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageLogEntry>> {
        let cf_by_user = self.cf(cf::USAGE_LOG_BY_USER)?;
        let prefix = keys::user_log_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // ULIDs sort chronologically, so collecting forward and reversing
        // yields newest first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }
        all_keys.reverse();

        let mut entries = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if entries.len() >= limit {
                break;
            }

            let id = keys::extract_log_entry_id_from_user_key(&key)?;
            if let Some(entry) =
                self.get_value::<UsageLogEntry>(cf::USAGE_LOG, &keys::log_entry_key(&id))?
            {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    // =========================================================================
    // Alert Operations
    // =========================================================================

    fn has_alert(
        &self,
        user_id: &UserId,
        period_key: &str,
        category: &ResourceCategory,
        threshold: u8,
    ) -> Result<bool> {
        let cf = self.cf(cf::USAGE_ALERTS)?;
        let key = keys::alert_key(user_id, period_key, category, threshold);

        let exists = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        Ok(exists)
    }

    fn put_alert(&self, alert: &UsageAlert) -> Result<()> {
        self.put_value(
            cf::USAGE_ALERTS,
            &keys::alert_key(
                &alert.user_id,
                &alert.period_key,
                &alert.category,
                alert.threshold,
            ),
            alert,
        )
    }

    fn list_alerts(&self, user_id: &UserId, period_key: &str) -> Result<Vec<UsageAlert>> {
        let cf = self.cf(cf::USAGE_ALERTS)?;
        let prefix = keys::alerts_prefix(user_id, period_key);

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward));

        let mut alerts = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            alerts.push(Self::deserialize(&value)?);
        }

        Ok(alerts)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn record_usage(&self, entry: &UsageLogEntry, summary: &UsageSummary) -> Result<()> {
        let cf_log = self.cf(cf::USAGE_LOG)?;
        let cf_by_user = self.cf(cf::USAGE_LOG_BY_USER)?;
        let cf_summaries = self.cf(cf::USAGE_SUMMARIES)?;

        let log_key = keys::log_entry_key(&entry.id);
        let user_key = keys::user_log_key(&entry.user_id, &entry.id);
        let summary_key = keys::summary_key(&summary.user_id, &summary.period_key);

        let entry_value = Self::serialize(entry)?;
        let summary_value = Self::serialize(summary)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_log, &log_key, &entry_value);
        batch.put_cf(&cf_by_user, &user_key, []);
        batch.put_cf(&cf_summaries, &summary_key, &summary_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn renew_subscription(
        &self,
        subscription: &Subscription,
        reset_summary: &UsageSummary,
    ) -> Result<()> {
        let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_summaries = self.cf(cf::USAGE_SUMMARIES)?;

        let sub_key = keys::subscription_key(&subscription.user_id);
        let summary_key = keys::summary_key(&reset_summary.user_id, &reset_summary.period_key);

        let sub_value = Self::serialize(subscription)?;
        let summary_value = Self::serialize(reset_summary)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_subs, &sub_key, &sub_value);
        batch.put_cf(&cf_summaries, &summary_key, &summary_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Schema Maintenance
    // =========================================================================

    fn repair_schema(&self) -> Result<()> {
        for name in all_column_families() {
            if self.db.cf_handle(name).is_none() {
                tracing::info!(column_family = %name, "Creating missing column family");
                self.db
                    .create_cf(name, &Options::default())
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }
        Ok(())
    }
}

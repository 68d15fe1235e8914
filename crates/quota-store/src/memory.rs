//! In-memory storage implementation.
//!
//! Mutex-protected maps behind the same `Store` trait as the `RocksDB`
//! backend. Used by engine tests; carries fault-injection switches so the
//! fail-closed and schema-repair paths can be exercised, plus a write
//! counter so tests can assert that admission checks never write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use quota_core::{
    Plan, ResourceCategory, Subscription, UsageAlert, UsageLogEntry, UsageSummary, UserId,
};

use crate::error::{Result, StoreError};
use crate::schema::cf;
use crate::Store;

#[derive(Default)]
struct Inner {
    plans: HashMap<String, Plan>,
    subscriptions: HashMap<UserId, Subscription>,
    summaries: HashMap<(UserId, String), UsageSummary>,
    log: Vec<UsageLogEntry>,
    alerts: HashMap<(UserId, String, String, u8), UsageAlert>,
}

/// In-memory `Store` implementation for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    schema_drift: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    repairs: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail with a database error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate schema drift: every operation fails with the
    /// missing-column-family signature until `repair_schema` runs.
    pub fn set_schema_drift(&self, drifted: bool) {
        self.schema_drift.store(drifted, Ordering::SeqCst);
    }

    /// Number of read operations performed.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write operations performed.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `repair_schema` calls.
    #[must_use]
    pub fn repair_count(&self) -> u64 {
        self.repairs.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<()> {
        self.check_drift()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.check_drift()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        Ok(())
    }

    fn check_drift(&self) -> Result<()> {
        if self.schema_drift.load(Ordering::SeqCst) {
            return Err(StoreError::MissingColumnFamily {
                name: cf::USAGE_ALERTS.to_string(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex in a test store is unrecoverable anyway.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn put_plan(&self, plan: &Plan) -> Result<()> {
        self.check_write()?;
        self.lock().plans.insert(plan.tier.clone(), plan.clone());
        Ok(())
    }

    fn get_plan(&self, tier: &str) -> Result<Option<Plan>> {
        self.check_read()?;
        Ok(self.lock().plans.get(tier).cloned())
    }

    fn put_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.check_write()?;
        self.lock()
            .subscriptions
            .insert(subscription.user_id, subscription.clone());
        Ok(())
    }

    fn get_subscription(&self, user_id: &UserId) -> Result<Option<Subscription>> {
        self.check_read()?;
        Ok(self.lock().subscriptions.get(user_id).cloned())
    }

    fn get_summary(&self, user_id: &UserId, period_key: &str) -> Result<Option<UsageSummary>> {
        self.check_read()?;
        Ok(self
            .lock()
            .summaries
            .get(&(*user_id, period_key.to_string()))
            .cloned())
    }

    fn put_summary(&self, summary: &UsageSummary) -> Result<()> {
        self.check_write()?;
        self.lock()
            .summaries
            .insert((summary.user_id, summary.period_key.clone()), summary.clone());
        Ok(())
    }

    fn append_log_entry(&self, entry: &UsageLogEntry) -> Result<()> {
        self.check_write()?;
        self.lock().log.push(entry.clone());
        Ok(())
    }

    fn list_log_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UsageLogEntry>> {
        self.check_read()?;
        let inner = self.lock();
        let mut entries: Vec<UsageLogEntry> = inner
            .log
            .iter()
            .filter(|e| e.user_id == *user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.id.to_bytes().cmp(&a.id.to_bytes())); // Newest first
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    fn has_alert(
        &self,
        user_id: &UserId,
        period_key: &str,
        category: &ResourceCategory,
        threshold: u8,
    ) -> Result<bool> {
        self.check_read()?;
        Ok(self.lock().alerts.contains_key(&(
            *user_id,
            period_key.to_string(),
            category.as_str().to_string(),
            threshold,
        )))
    }

    fn put_alert(&self, alert: &UsageAlert) -> Result<()> {
        self.check_write()?;
        self.lock().alerts.insert(
            (
                alert.user_id,
                alert.period_key.clone(),
                alert.category.as_str().to_string(),
                alert.threshold,
            ),
            alert.clone(),
        );
        Ok(())
    }

    fn list_alerts(&self, user_id: &UserId, period_key: &str) -> Result<Vec<UsageAlert>> {
        self.check_read()?;
        let inner = self.lock();
        let mut alerts: Vec<UsageAlert> = inner
            .alerts
            .values()
            .filter(|a| a.user_id == *user_id && a.period_key == period_key)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.threshold);
        Ok(alerts)
    }

    fn record_usage(&self, entry: &UsageLogEntry, summary: &UsageSummary) -> Result<()> {
        self.check_write()?;
        let mut inner = self.lock();
        inner.log.push(entry.clone());
        inner
            .summaries
            .insert((summary.user_id, summary.period_key.clone()), summary.clone());
        Ok(())
    }

    fn renew_subscription(
        &self,
        subscription: &Subscription,
        reset_summary: &UsageSummary,
    ) -> Result<()> {
        self.check_write()?;
        let mut inner = self.lock();
        inner
            .subscriptions
            .insert(subscription.user_id, subscription.clone());
        inner.summaries.insert(
            (reset_summary.user_id, reset_summary.period_key.clone()),
            reset_summary.clone(),
        );
        Ok(())
    }

    fn repair_schema(&self) -> Result<()> {
        self.repairs.fetch_add(1, Ordering::SeqCst);
        self.schema_drift.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quota_core::BillingCycle;

    #[test]
    fn basic_crud() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();

        store.put_plan(&Plan::free()).unwrap();
        assert!(store.get_plan("free").unwrap().is_some());

        let sub = Subscription::new(user_id, "free", BillingCycle::Monthly);
        store.put_subscription(&sub).unwrap();
        assert!(store.get_subscription(&user_id).unwrap().is_some());

        let summary = UsageSummary::new(user_id, "2026-08");
        store.put_summary(&summary).unwrap();
        assert!(store.get_summary(&user_id, "2026-08").unwrap().is_some());
    }

    #[test]
    fn injected_read_failure() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        assert!(store.get_plan("free").is_err());

        store.set_fail_reads(false);
        assert!(store.get_plan("free").is_ok());
    }

    #[test]
    fn schema_drift_until_repaired() {
        let store = MemoryStore::new();
        store.set_schema_drift(true);

        let err = store.get_plan("free").unwrap_err();
        assert!(err.is_schema_drift());

        store.repair_schema().unwrap();
        assert!(store.get_plan("free").is_ok());
        assert_eq!(store.repair_count(), 1);
    }

    #[test]
    fn write_counter_tracks_writes() {
        let store = MemoryStore::new();
        assert_eq!(store.write_count(), 0);

        store.put_plan(&Plan::free()).unwrap();
        assert_eq!(store.write_count(), 1);

        store.get_plan("free").unwrap();
        assert_eq!(store.write_count(), 1);
    }
}

//! Billing-period rollover behavior.

use std::sync::Arc;

use chrono::Utc;

use quota_core::{
    BillingCycle, CategoryLimits, Plan, ResourceCategory, Subscription, UsageSummary, UserId,
};
use quota_engine::{EngineConfig, NoCache, QuotaEngine, RecordUsage, SUBSCRIPTION_EXPIRED};
use quota_store::{MemoryStore, Store};

fn engine_over(store: Arc<MemoryStore>) -> QuotaEngine {
    QuotaEngine::with_cache(store, Arc::new(NoCache), EngineConfig::default())
}

fn lapsed_subscription(user_id: UserId, auto_renew: bool) -> Subscription {
    let mut sub = Subscription::new(user_id, "pro", BillingCycle::Monthly);
    sub.period_start = Utc::now() - chrono::Duration::days(45);
    sub.period_end = Utc::now() - chrono::Duration::days(15);
    sub.auto_renew = auto_renew;
    sub
}

#[test]
fn lapsed_auto_renewing_subscription_rolls_over_on_check() {
    let store = Arc::new(MemoryStore::new());
    let plan = Plan::new("pro").with_category(
        ResourceCategory::TextGeneration,
        CategoryLimits::new(5, 0),
    );
    store.put_plan(&plan).unwrap();

    let user_id = UserId::generate();
    let sub = lapsed_subscription(user_id, true);
    let old_period_key = sub.period_key();
    store.put_subscription(&sub).unwrap();

    // The old period's ledger is maxed out.
    let mut old_summary = UsageSummary::new(user_id, old_period_key.clone());
    for _ in 0..5 {
        old_summary.record(ResourceCategory::TextGeneration, "anthropic", 100, 10, 50, true);
    }
    store.put_summary(&old_summary).unwrap();

    let engine = engine_over(Arc::clone(&store));

    // The first check after the lapse rolls the period and admits.
    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 100);
    assert!(decision.allowed);
    assert_eq!(decision.details.current_calls, 0);

    let renewed = store.get_subscription(&user_id).unwrap().unwrap();
    assert!(renewed.period_end > Utc::now());
    assert_eq!(
        renewed.period_key(),
        Utc::now().format("%Y-%m").to_string()
    );

    // The new period starts zeroed; the old ledger row survives as history.
    let fresh = store
        .get_summary(&user_id, &renewed.period_key())
        .unwrap()
        .unwrap();
    assert_eq!(fresh.total_calls, 0);
    let history = store.get_summary(&user_id, &old_period_key).unwrap().unwrap();
    assert_eq!(history.total_calls, 5);
}

#[test]
fn rollover_preserves_audit_log() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::new("pro")).unwrap();
    let user_id = UserId::generate();

    // Accrue one audit row under an active subscription, then lapse it.
    store
        .put_subscription(&Subscription::new(user_id, "pro", BillingCycle::Monthly))
        .unwrap();
    let engine = engine_over(Arc::clone(&store));
    engine
        .record(RecordUsage::success(
            user_id,
            ResourceCategory::TextGeneration,
            "anthropic",
            "claude-sonnet-4",
            100,
            50,
        ))
        .unwrap();

    store.put_subscription(&lapsed_subscription(user_id, true)).unwrap();
    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10)
        .allowed);

    let log = store.list_log_entries(&user_id, 10, 0).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn lapsed_subscription_without_auto_renew_stays_denied_until_reactivated() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::new("pro")).unwrap();
    let user_id = UserId::generate();
    store.put_subscription(&lapsed_subscription(user_id, false)).unwrap();

    let engine = engine_over(Arc::clone(&store));

    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10);
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_deref(), Some(SUBSCRIPTION_EXPIRED));

    // The subscription row is untouched by the denial.
    let stored = store.get_subscription(&user_id).unwrap().unwrap();
    assert!(stored.is_expired(Utc::now()));

    // External billing reactivates it with a fresh period.
    store
        .put_subscription(&Subscription::new(user_id, "pro", BillingCycle::Monthly))
        .unwrap();
    engine.invalidate_user(&user_id);
    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10)
        .allowed);
}

#[test]
fn yearly_cycle_advances_a_full_year() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::new("pro")).unwrap();
    let user_id = UserId::generate();

    let mut sub = Subscription::new(user_id, "pro", BillingCycle::Yearly);
    sub.period_start = Utc::now() - chrono::Duration::days(400);
    sub.period_end = Utc::now() - chrono::Duration::days(35);
    store.put_subscription(&sub).unwrap();

    let engine = engine_over(Arc::clone(&store));
    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10)
        .allowed);

    let renewed = store.get_subscription(&user_id).unwrap().unwrap();
    let length = renewed.period_end - renewed.period_start;
    assert_eq!(length.num_days(), 365);
}

#[test]
fn free_users_accrue_under_the_calendar_month() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::free()).unwrap();
    let engine = engine_over(Arc::clone(&store));
    let user_id = UserId::generate();

    let key = engine.current_period_key(&user_id).unwrap();
    assert_eq!(key, Utc::now().format("%Y-%m").to_string());

    let delta = engine
        .record(RecordUsage::success(
            user_id,
            ResourceCategory::TextGeneration,
            "anthropic",
            "claude-sonnet-4",
            10,
            5,
        ))
        .unwrap();
    assert_eq!(delta.period_key, key);
}

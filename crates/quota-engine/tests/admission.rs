//! Admission-check behavior against a live store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use quota_core::{
    BillingCycle, CategoryLimits, Plan, ResourceCategory, Subscription, UserId,
};
use quota_engine::{
    EngineConfig, NoCache, Operation, QuotaEngine, RecordUsage, TtlCache, NO_ACTIVE_PLAN,
    SUBSCRIPTION_EXPIRED, VALIDATION_FAILED,
};
use quota_store::{MemoryStore, Store};

fn engine_without_cache(store: Arc<MemoryStore>) -> QuotaEngine {
    QuotaEngine::with_cache(store, Arc::new(NoCache), EngineConfig::default())
}

fn text_usage(user_id: UserId, tokens: u64) -> RecordUsage {
    let mut usage = RecordUsage::success(
        user_id,
        ResourceCategory::TextGeneration,
        "anthropic",
        "claude-sonnet-4",
        tokens,
        0,
    );
    usage.cost_override_micros = Some(0);
    usage
}

#[test]
fn free_tier_applies_without_subscription() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::free()).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 1_000);
    assert!(decision.allowed);
    assert_eq!(decision.details.call_limit, quota_core::plan::FREE_TEXT_CALLS);
}

#[test]
fn no_plan_anywhere_denies() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_without_cache(store);
    let user_id = UserId::generate();

    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10);
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_deref(), Some(NO_ACTIVE_PLAN));
}

#[test]
fn recorded_usage_exhausts_the_call_budget() {
    let store = Arc::new(MemoryStore::new());
    let plan = Plan::new("free").with_category(
        ResourceCategory::TextGeneration,
        CategoryLimits::new(3, 0),
    );
    store.put_plan(&plan).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    for _ in 0..3 {
        assert!(engine
            .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 0)
            .allowed);
        engine.record(text_usage(user_id, 10)).unwrap();
    }

    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 0);
    assert!(!decision.allowed);
    assert!(decision.reason.unwrap().contains("call limit"));
}

#[test]
fn unified_budget_sums_vendors_across_checks() {
    let store = Arc::new(MemoryStore::new());
    let plan = Plan::new("free").with_category(
        ResourceCategory::TextGeneration,
        CategoryLimits::new(0, 1_000),
    );
    store.put_plan(&plan).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    // 600 via one vendor, 300 via another; both draw on one budget.
    engine.record(text_usage(user_id, 600)).unwrap();
    let mut openai = RecordUsage::success(
        user_id,
        ResourceCategory::TextGeneration,
        "openai",
        "gpt-4o",
        300,
        0,
    );
    openai.cost_override_micros = Some(0);
    engine.record(openai).unwrap();

    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 100)
        .allowed);
    assert!(!engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 101)
        .allowed);
}

#[test]
fn legacy_provider_limits_agree_across_check_paths() {
    let store = Arc::new(MemoryStore::new());
    // No category entry; the plan only carries a per-vendor row.
    let plan = Plan::new("free").with_provider("runway", CategoryLimits::new(1, 0));
    store.put_plan(&plan).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    let mut usage = RecordUsage::success(
        user_id,
        ResourceCategory::VideoGeneration,
        "runway",
        "gen-3",
        0,
        0,
    );
    usage.cost_override_micros = Some(0);
    engine.record(usage).unwrap();

    // Both check paths resolve the same per-vendor row.
    let batch = engine.check_batch(
        &user_id,
        &[Operation::new(ResourceCategory::VideoGeneration, "runway", 0)],
    );
    assert!(!batch.allowed);

    let decision = engine.check_single(&user_id, &ResourceCategory::VideoGeneration, "runway", 0);
    assert!(!decision.allowed);
    assert_eq!(decision.details.call_limit, 1);

    // An unconfigured vendor has its own unlimited budget.
    assert!(engine
        .check_single(&user_id, &ResourceCategory::VideoGeneration, "pika", 0)
        .allowed);
}

#[test]
fn batch_check_never_writes() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::free()).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    let ops: Vec<Operation> = (0..5)
        .map(|_| Operation::new(ResourceCategory::TextGeneration, "anthropic", 1_000))
        .collect();

    let before = store.write_count();
    let first = engine.check_batch(&user_id, &ops);
    let second = engine.check_batch(&user_id, &ops);
    assert_eq!(store.write_count(), before);

    // Re-running against unchanged state yields the same outcome.
    assert_eq!(first.allowed, second.allowed);
    assert_eq!(first.failing_index, second.failing_index);
}

#[test]
fn batch_failing_index_matches_remaining_budget() {
    let store = Arc::new(MemoryStore::new());
    let plan = Plan::new("free").with_category(
        ResourceCategory::TextGeneration,
        CategoryLimits::new(10, 0),
    );
    store.put_plan(&plan).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    for _ in 0..7 {
        engine.record(text_usage(user_id, 0)).unwrap();
    }

    let ops: Vec<Operation> = (0..6)
        .map(|_| Operation::new(ResourceCategory::TextGeneration, "anthropic", 0))
        .collect();
    let decision = engine.check_batch(&user_id, &ops);
    assert!(!decision.allowed);
    assert_eq!(decision.failing_index, Some(3));
}

#[test]
fn zero_limits_admit_everything() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::new("free")).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    for _ in 0..100 {
        engine.record(text_usage(user_id, 50_000)).unwrap();
    }
    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 1_000_000)
        .allowed);
}

#[test]
fn expired_subscription_without_auto_renew_denies() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::new("pro")).unwrap();
    let user_id = UserId::generate();

    let mut sub = Subscription::new(user_id, "pro", BillingCycle::Monthly);
    sub.period_start = Utc::now() - chrono::Duration::days(40);
    sub.period_end = Utc::now() - chrono::Duration::days(10);
    sub.auto_renew = false;
    store.put_subscription(&sub).unwrap();

    let engine = engine_without_cache(store);
    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10);
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_deref(), Some(SUBSCRIPTION_EXPIRED));
}

#[test]
fn storage_failure_fails_closed() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::free()).unwrap();
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    store.set_fail_reads(true);

    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10);
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_deref(), Some(VALIDATION_FAILED));

    let batch = engine.check_batch(
        &user_id,
        &[Operation::new(ResourceCategory::TextGeneration, "anthropic", 10)],
    );
    assert!(!batch.allowed);
    assert_eq!(batch.failing_index, None);
    assert_eq!(batch.message.as_deref(), Some(VALIDATION_FAILED));

    // Once storage recovers, checks recover with it.
    store.set_fail_reads(false);
    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10)
        .allowed);
}

#[test]
fn schema_drift_is_repaired_in_flight() {
    let store = Arc::new(MemoryStore::new());
    store.put_plan(&Plan::free()).unwrap();
    store.set_schema_drift(true);
    let engine = engine_without_cache(Arc::clone(&store));
    let user_id = UserId::generate();

    let decision = engine.check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 10);
    assert!(decision.allowed);
    assert!(store.repair_count() >= 1);
}

#[test]
fn cached_decision_is_stale_until_invalidated() {
    let store = Arc::new(MemoryStore::new());
    let plan = Plan::new("free").with_category(
        ResourceCategory::TextGeneration,
        CategoryLimits::new(1, 0),
    );
    store.put_plan(&plan).unwrap();

    let cache = Arc::new(TtlCache::new(Duration::from_secs(3600)));
    let engine = QuotaEngine::with_cache(Arc::clone(&store) as Arc<dyn Store>, cache, EngineConfig::default());
    let user_id = UserId::generate();

    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 0)
        .allowed);

    // The ledger moves past the limit, but the cached decision holds.
    engine.record(text_usage(user_id, 0)).unwrap();
    assert!(engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 0)
        .allowed);

    engine.invalidate_user(&user_id);
    assert!(!engine
        .check_single(&user_id, &ResourceCategory::TextGeneration, "anthropic", 0)
        .allowed);
}

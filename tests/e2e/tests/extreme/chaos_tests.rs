//! Chaos tests
//!
//! Inject store failures at every stage of a consolidation run and check
//! that the run reports an error instead of a partial report.

use std::sync::Arc;

use chrono::Utc;
use hivemem_core::{
    ConsolidationError, ConsolidatorStats, MemoryService, MemoryStore, StoreError,
    COORDINATION_NAMESPACE,
};
use hivemem_e2e_tests::harness::{FaultyStore, StoreOp};
use hivemem_e2e_tests::mocks::TestDataFactory;

fn seeded_service() -> (Arc<FaultyStore>, MemoryService<FaultyStore>) {
    let now = Utc::now().timestamp_millis();
    let scenario = TestDataFactory::create_mixed_scenario("test", now);
    let store = Arc::new(FaultyStore::with_entries(scenario.entries));
    let service = MemoryService::new(Arc::clone(&store), "test", scenario.config).unwrap();
    (store, service)
}

fn is_injected(err: &ConsolidationError) -> bool {
    matches!(err, ConsolidationError::Store(StoreError::Unavailable(_)))
}

#[tokio::test]
async fn test_list_failure_aborts_before_any_change() {
    let (store, service) = seeded_service();
    store.fail_on(StoreOp::List, 1);

    let err = service.run_consolidation().await.unwrap_err();
    assert!(is_injected(&err));
    assert_eq!(store.inner().len("test").await, 7);
    assert_eq!(store.calls(StoreOp::Delete), 0);
}

#[tokio::test]
async fn test_delete_failure_midway_surfaces_error() {
    let (store, service) = seeded_service();
    store.fail_on(StoreOp::Delete, 2);

    let err = service.run_consolidation().await.unwrap_err();
    assert!(is_injected(&err));

    // The first delete landed; nothing after the failure ran
    assert_eq!(store.inner().len("test").await, 6);
    assert_eq!(store.calls(StoreOp::Store), 0);
    assert!(service.verify_consolidation().await.unwrap().is_none());
}

#[tokio::test]
async fn test_status_write_failure_surfaces_error() {
    let (store, service) = seeded_service();
    store.fail_on(StoreOp::Store, 1);

    let err = service.run_consolidation().await.unwrap_err();
    assert!(is_injected(&err));
    assert_eq!(store.inner().len(COORDINATION_NAMESPACE).await, 0);
}

#[tokio::test]
async fn test_archive_failure_deletes_nothing() {
    let now = Utc::now().timestamp_millis();
    let scenario = TestDataFactory::create_mixed_scenario("test", now);
    let store = Arc::new(FaultyStore::with_entries(scenario.entries));
    let config = scenario.config.with_archive_namespace("cold");
    let service = MemoryService::new(Arc::clone(&store), "test", config).unwrap();
    store.fail_on(StoreOp::Store, 1);

    let err = service.run_consolidation().await.unwrap_err();
    assert!(is_injected(&err));
    assert_eq!(store.calls(StoreOp::Delete), 0);
    assert_eq!(store.inner().len("test").await, 7);
}

#[tokio::test]
async fn test_recovery_after_heal() {
    let (store, service) = seeded_service();
    store.fail_on(StoreOp::Delete, 1);
    assert!(service.run_consolidation().await.is_err());

    store.heal();
    let report = service.run_consolidation().await.unwrap();
    // The failed delete removed nothing, so the retry sees all seven
    assert_eq!(report.processed, 7);
    assert_eq!(store.inner().len("test").await, 4);

    let stats = service.stats().await;
    assert_eq!(stats.consolidations, 1);
    assert_eq!(stats.memories_processed, 7);

    let status = service.verify_consolidation().await.unwrap().unwrap();
    assert_eq!(status.consolidation_count, 1);
}

#[tokio::test]
async fn test_failed_runs_leave_stats_untouched() {
    let (store, service) = seeded_service();

    for op in [StoreOp::List, StoreOp::Delete, StoreOp::Store] {
        store.fail_on(op, 1);
        assert!(service.run_consolidation().await.is_err());
        store.heal();
    }

    assert_eq!(service.stats().await, ConsolidatorStats::default());
}

#[tokio::test]
async fn test_empty_namespace_makes_one_call() {
    let store = Arc::new(FaultyStore::new());
    let service =
        MemoryService::new(Arc::clone(&store), "void", TestDataFactory::test_config()).unwrap();

    let report = service.run_consolidation().await.unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.evicted, 0);
    assert_eq!(report.deduplicated, 0);
    assert_eq!(store.calls(StoreOp::List), 1);
    assert_eq!(store.total_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_runs_are_serialized() {
    let (store, service) = seeded_service();
    let service = Arc::new(service);

    let a = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.run_consolidation().await }
    });
    let b = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.run_consolidation().await }
    });

    let first = a.await.unwrap().unwrap();
    let second = b.await.unwrap().unwrap();

    // Exactly one run saw the full namespace; the other saw the result
    let mut processed = [first.processed, second.processed];
    processed.sort_unstable();
    assert_eq!(processed, [4, 7]);

    let status = service.verify_consolidation().await.unwrap().unwrap();
    assert_eq!(status.consolidation_count, 2);
    assert_eq!(store.inner().len("test").await, 4);
    assert_eq!(store.list("test").await.unwrap().len(), 4);
}

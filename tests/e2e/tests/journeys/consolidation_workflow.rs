//! Consolidation workflow journeys
//!
//! Store memories, consolidate, and check both the report and what is left
//! in the store afterwards.

use std::sync::Arc;

use chrono::Utc;
use hivemem_core::{
    status_key, Consolidator, EntryMetadata, InMemoryStore, MemoryCategory, MemoryService,
    MemoryStore, RunStatus, COORDINATION_NAMESPACE,
};
use hivemem_e2e_tests::harness::TestStoreManager;
use hivemem_e2e_tests::mocks::{BatchConfig, TestDataFactory};

fn now() -> i64 {
    Utc::now().timestamp_millis()
}

fn keys(entries: &[hivemem_core::MemoryEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.key.as_str()).collect()
}

#[test]
fn test_mixed_batch_plan() {
    let now = now();
    let scenario = TestDataFactory::create_mixed_scenario("test", now);
    let mut consolidator = Consolidator::new(scenario.config.clone()).unwrap();

    let plan = consolidator.plan_at(scenario.entries, now);

    assert_eq!(plan.report.processed, scenario.expected["processed"]);
    assert_eq!(plan.expired.len(), scenario.expected["expired"]);
    assert_eq!(plan.report.deduplicated, scenario.expected["deduplicated"]);
    assert_eq!(plan.kept.len(), scenario.expected["kept"]);
    assert_eq!(keys(&plan.expired), vec!["context/old1", "task/old2"]);
    assert_eq!(keys(&plan.duplicates), vec!["dup1"]);
    assert_eq!(plan.groups[0].survivor, "dup2");
}

#[test]
fn test_accounting_identity_holds() {
    let now = now();
    let mut entries = TestDataFactory::create_mixed_scenario("test", now).entries;
    entries.extend(TestDataFactory::create_batch(
        &BatchConfig {
            count: 80,
            duplicate_every: Some(7),
            ..BatchConfig::default()
        },
        now,
    ));
    let mut consolidator = Consolidator::new(TestDataFactory::test_config()).unwrap();

    let plan = consolidator.plan_at(entries, now);
    let report = plan.report;

    assert_eq!(report.processed, 87);
    assert_eq!(report.evicted + report.deduplicated + plan.kept.len(), report.processed);
    assert!(plan.kept.len() <= 50);
    assert_eq!(report.retained(), plan.kept.len());
}

#[test]
fn test_capacity_scenario_evicts_oldest_fifty() {
    let now = now();
    let scenario = TestDataFactory::create_capacity_scenario("test", now);
    let mut consolidator = Consolidator::new(scenario.config.clone()).unwrap();

    let plan = consolidator.plan_at(scenario.entries, now);

    assert_eq!(plan.report.deduplicated, 0);
    assert_eq!(plan.report.evicted, scenario.expected["evicted"]);
    assert_eq!(plan.kept.len(), scenario.expected["kept"]);

    let evicted: Vec<String> = (0..50).map(|i| format!("knowledge/{i:04}")).collect();
    assert_eq!(keys(&plan.size_evicted), evicted);
    assert!(plan.kept.iter().all(|e| e.key.as_str() >= "knowledge/0050"));
}

#[test]
fn test_repeated_runs_are_stable() {
    let now = now();
    let scenario = TestDataFactory::create_mixed_scenario("test", now);
    let mut consolidator = Consolidator::new(scenario.config).unwrap();

    let first = consolidator.plan_at(scenario.entries, now);
    let second = consolidator.plan_at(first.kept.clone(), now);

    assert!(second.report.is_noop());
    assert_eq!(second.kept, first.kept);

    let stats = consolidator.stats();
    assert_eq!(stats.consolidations, 2);
    assert_eq!(stats.memories_processed, 7 + 4);
}

#[tokio::test]
async fn test_service_journey_against_json_store() {
    let db = TestStoreManager::new_temp();
    let now = now();
    db.seed_with(&TestDataFactory::create_mixed_scenario("test", now).entries)
        .await;

    let service = MemoryService::new(db.store(), "test", TestDataFactory::test_config()).unwrap();
    let report = service.run_consolidation().await.unwrap();

    assert_eq!(report.processed, 7);
    assert!(report.evicted >= 2);
    assert_eq!(report.deduplicated, 1);

    let remaining = db.keys("test").await;
    assert_eq!(
        remaining,
        vec!["context/ctx1", "dup2", "knowledge/pattern1", "task/task1"]
    );

    let status = service.verify_consolidation().await.unwrap().unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(status.consolidation_count, 1);
    assert_eq!(status.namespace, "test");

    // The status record is a plain entry in the coordination namespace
    let record = db
        .store()
        .retrieve(COORDINATION_NAMESPACE, &status_key("test"))
        .await
        .unwrap()
        .unwrap();
    assert!(record.value.as_text().contains("\"completed\""));
}

#[tokio::test]
async fn test_knowledge_survives_many_runs() {
    let store = Arc::new(InMemoryStore::new());
    let service =
        MemoryService::new(Arc::clone(&store), "agent", TestDataFactory::test_config()).unwrap();

    let ancient = EntryMetadata::at(0).with_category(MemoryCategory::Knowledge);
    service
        .store_memory("decision/db", "Use JSON documents per namespace", Some(ancient))
        .await
        .unwrap();

    for _ in 0..3 {
        service.run_consolidation().await.unwrap();
    }

    assert!(service.retrieve_memory("decision/db").await.unwrap().is_some());
    let status = service.verify_consolidation().await.unwrap().unwrap();
    assert_eq!(status.consolidation_count, 3);
}

#[tokio::test]
async fn test_archive_journey() {
    let store = Arc::new(InMemoryStore::new());
    let config = TestDataFactory::test_config().with_archive_namespace("cold");
    let service = MemoryService::new(Arc::clone(&store), "test", config).unwrap();
    let now = now();

    for entry in TestDataFactory::create_mixed_scenario("test", now).entries {
        service
            .store_memory(&entry.key, entry.value, Some(entry.metadata))
            .await
            .unwrap();
    }

    let report = service.run_consolidation().await.unwrap();
    assert_eq!(report.archived, report.evicted + report.deduplicated);

    let archived: Vec<String> = store
        .list("cold")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(archived, vec!["context/old1", "dup1", "task/old2"]);
    assert_eq!(store.len("test").await, 4);
}

mod common;

use common::{item, today, FaultyStore, Harness};
use srs_core::{
    CompleteRequest, DeleteRequest, ItemStore, LifecycleError, NewItem, OutcomeStatus, Pool,
    RecallRequest, RecallSource,
};

fn seeded() -> Harness {
    Harness::with_items(&[
        item(1, Pool::High, 3, 0),
        item(2, Pool::Medium, 8, 2),
        item(3, Pool::Low, 20, 1),
    ])
}

fn queue_and_stage(harness: &Harness) {
    let mut service = harness.service();
    service
        .recall(RecallRequest {
            source: RecallSource::Custom(vec![1, 2]),
            force: false,
            append: false,
        })
        .unwrap();
    service
        .complete(CompleteRequest {
            id: 3,
            pool_override: Some(Pool::High),
            recall_date: None,
            force: true,
        })
        .unwrap();
}

fn new_item(id: i64, name: &str) -> NewItem {
    NewItem {
        id,
        name: name.to_string(),
        link: format!("https://example.com/{id}"),
        pool: Pool::Medium,
    }
}

#[test]
fn delete_working_touches_only_the_working_set() {
    let harness = seeded();
    queue_and_stage(&harness);
    let mut service = harness.service();

    let outcome = service.delete(DeleteRequest::Working(1)).unwrap();
    assert!(outcome.detail.from_working);
    assert!(!outcome.detail.from_store);
    assert!(!harness.working().contains(1));
    assert!(harness.active().exists(1).unwrap());
    assert!(matches!(
        service.delete(DeleteRequest::Working(1)),
        Err(LifecycleError::Rejected(_))
    ));
}

#[test]
fn delete_completed_drops_the_staged_entry() {
    let harness = seeded();
    queue_and_stage(&harness);
    let mut service = harness.service();

    let outcome = service.delete(DeleteRequest::Completed(3)).unwrap();
    assert!(outcome.is_success());
    assert!(harness.completed().is_empty());
    assert_eq!(harness.active().get_by_id(3).unwrap().unwrap().total_recalls, 1);
}

#[test]
fn delete_database_cleans_session_sets() {
    let harness = seeded();
    queue_and_stage(&harness);
    let mut service = harness.service();

    let outcome = service.delete(DeleteRequest::Database(3)).unwrap();
    assert!(outcome.is_success());
    assert!(outcome.detail.from_store);
    assert!(outcome.detail.from_completed);
    assert!(!outcome.detail.from_working);
    assert!(!harness.active().exists(3).unwrap());
    assert!(!harness.completed().contains(3));
}

#[test]
fn delete_database_cleans_sets_even_when_store_delete_fails() {
    let harness = seeded();
    queue_and_stage(&harness);
    let active = FaultyStore::new(harness.active()).failing("delete");
    let mut service = harness.service_with(active, harness.archive());

    let outcome = service.delete(DeleteRequest::Database(2)).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(!outcome.detail.from_store);
    assert!(outcome.detail.from_working);
    assert!(harness.active().exists(2).unwrap());
    assert!(!harness.working().contains(2));
}

#[test]
fn hard_reset_leaves_archive_untouched() {
    let harness = seeded();
    harness.service().archive_add(2).unwrap();
    queue_and_stage(&harness);
    let mut service = harness.service();

    let outcome = service.delete(DeleteRequest::HardReset).unwrap();
    assert!(outcome.is_success());
    assert!(harness.active().get_all().unwrap().is_empty());
    assert!(harness.working().is_empty());
    assert!(harness.completed().is_empty());
    assert_eq!(harness.archive().get_all().unwrap().len(), 1);
}

#[test]
fn add_item_inserts_and_refuses_duplicates_without_upsert() {
    let harness = seeded();
    let service = harness.service();

    assert!(service.add_item(new_item(10, " lru cache "), false).unwrap().is_success());
    let added = harness.active().get_by_id(10).unwrap().unwrap();
    assert_eq!(added.name, "lru cache");
    assert_eq!(added.last_recall, today());
    assert_eq!(added.total_recalls, 0);

    let duplicate = service.add_item(new_item(10, "other"), false).unwrap();
    assert_eq!(duplicate.status, OutcomeStatus::Failed);
    assert_eq!(harness.active().get_by_id(10).unwrap().unwrap().name, "lru cache");
}

#[test]
fn upsert_overwrites_and_resets_history() {
    let harness = seeded();
    let service = harness.service();

    let outcome = service.add_item(new_item(2, "renamed"), true).unwrap();
    assert!(outcome.is_success());
    let updated = harness.active().get_by_id(2).unwrap().unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.total_recalls, 0);
    assert_eq!(updated.last_recall, today());
}

#[test]
fn add_item_validates_before_touching_stores() {
    let harness = seeded();
    let service = harness.service();
    service.archive_add(1).unwrap();

    let mut bad_link = new_item(11, "graph");
    bad_link.link = "http://example.com".to_string();
    assert!(matches!(
        service.add_item(bad_link, false),
        Err(LifecycleError::Validation(_))
    ));
    assert!(matches!(
        service.add_item(new_item(0, "zero"), false),
        Err(LifecycleError::Validation(_))
    ));
    assert!(matches!(
        service.add_item(new_item(12, "   "), false),
        Err(LifecycleError::Validation(_))
    ));
    assert!(matches!(
        service.add_item(new_item(1, "archived"), true),
        Err(LifecycleError::Rejected(_))
    ));
    assert!(!harness.active().exists(11).unwrap());
}

#[test]
fn search_requires_two_characters() {
    let harness = seeded();
    let service = harness.service();

    assert!(matches!(
        service.search_items(" x "),
        Err(LifecycleError::Rejected(_))
    ));
    assert!(matches!(
        service.search_items("   "),
        Err(LifecycleError::Rejected(_))
    ));
    assert_eq!(service.search_items("Item 2").unwrap().len(), 1);
    assert!(service.item(3).unwrap().is_some());
}

#[test]
fn snapshot_reports_session_state() {
    let harness = seeded();
    queue_and_stage(&harness);
    assert!(harness.active().delete(2).unwrap());
    assert!(harness.archive().insert(&item(7, Pool::Low, 30, 2)).unwrap());
    let service = harness.service();

    let snapshot = service.snapshot().unwrap();
    assert_eq!(snapshot.today, today());
    assert_eq!(
        snapshot.working.iter().map(|item| item.id).collect::<Vec<_>>(),
        vec![1]
    );
    assert_eq!(snapshot.working_missing, vec![2]);
    assert_eq!(snapshot.completed.len(), 1);
    assert_eq!(snapshot.completed[0].pending.pool_override, Some(Pool::High));
    assert!(snapshot.completed[0].item.is_some());
    assert_eq!(snapshot.store_count, 2);
    assert_eq!(snapshot.archive_count, 1);
}

mod common;

use common::{day, item, today, FaultyStore, Harness};
use srs_core::service::recall_service::CustomRecallError;
use srs_core::{
    CompleteRequest, ItemStore, LifecycleError, OutcomeStatus, Pool, RecallRequest, RecallSource,
};

fn top(count: usize) -> RecallRequest {
    RecallRequest {
        source: RecallSource::Top(count),
        force: false,
        append: false,
    }
}

fn complete(id: i64) -> CompleteRequest {
    CompleteRequest {
        id,
        pool_override: None,
        recall_date: None,
        force: false,
    }
}

fn seeded() -> Harness {
    Harness::with_items(&[
        item(1, Pool::High, 13, 0),
        item(2, Pool::Low, 16, 0),
        item(3, Pool::Low, 1, 5),
    ])
}

#[test]
fn recall_fills_working_set_in_score_order() {
    let harness = seeded();
    let mut service = harness.service();

    let outcome = service.recall(top(2)).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.detail, vec![1, 2]);
    assert_eq!(
        harness.working().ids().iter().copied().collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn recall_rejects_zero_count() {
    let harness = seeded();
    let mut service = harness.service();

    assert!(matches!(
        service.recall(top(0)),
        Err(LifecycleError::Rejected(_))
    ));
}

#[test]
fn recall_respects_force_and_append() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(1)).unwrap();

    assert!(matches!(
        service.recall(top(1)),
        Err(LifecycleError::Rejected(_))
    ));

    let appended = service
        .recall(RecallRequest {
            force: true,
            append: true,
            ..top(1)
        })
        .unwrap();
    assert_eq!(appended.detail, vec![2]);
    assert_eq!(service.working().len(), 2);

    let overwritten = service
        .recall(RecallRequest {
            source: RecallSource::Custom(vec![3]),
            force: true,
            append: false,
        })
        .unwrap();
    assert_eq!(overwritten.detail, vec![3]);
    assert_eq!(
        harness.working().ids().iter().copied().collect::<Vec<_>>(),
        vec![3]
    );
}

#[test]
fn failed_overwrite_recall_keeps_working_set() {
    let harness = seeded();
    let mut service = harness.service();
    service
        .recall(RecallRequest {
            source: RecallSource::Custom(vec![1]),
            force: false,
            append: false,
        })
        .unwrap();
    service
        .complete(CompleteRequest {
            force: true,
            ..complete(2)
        })
        .unwrap();

    let outcome = service
        .recall(RecallRequest {
            source: RecallSource::Custom(vec![2]),
            force: true,
            append: false,
        })
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(service.working().contains(1));
    assert_eq!(
        harness.working().ids().iter().copied().collect::<Vec<_>>(),
        vec![1]
    );
}

#[test]
fn overwrite_recall_may_pick_ids_already_queued() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(2)).unwrap();

    let outcome = service
        .recall(RecallRequest {
            force: true,
            ..top(1)
        })
        .unwrap();
    assert_eq!(outcome.detail, vec![1]);
    assert_eq!(
        harness.working().ids().iter().copied().collect::<Vec<_>>(),
        vec![1]
    );
}

#[test]
fn recall_never_requeues_staged_ids() {
    let harness = seeded();
    let mut service = harness.service();
    service
        .complete(CompleteRequest {
            force: true,
            ..complete(1)
        })
        .unwrap();

    let outcome = service.recall(top(2)).unwrap();
    assert_eq!(outcome.detail, vec![2, 3]);
    assert!(!service.working().contains(1));
}

#[test]
fn custom_recall_single_unknown_id_is_rejected() {
    let harness = seeded();
    let mut service = harness.service();

    let err = service
        .recall(RecallRequest {
            source: RecallSource::Custom(vec![42]),
            force: false,
            append: false,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::CustomRecall(CustomRecallError::NotFound(42))
    ));
    assert!(!err.is_fatal());
    assert!(harness.working().is_empty());
}

#[test]
fn complete_moves_id_into_staging() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(2)).unwrap();

    let outcome = service
        .complete(CompleteRequest {
            pool_override: Some(Pool::Medium),
            recall_date: Some(day(2025, 6, 28)),
            ..complete(1)
        })
        .unwrap();
    assert!(outcome.is_success());

    let staged = harness.completed();
    let pending = staged.get(1).unwrap();
    assert_eq!(pending.pool_override, Some(Pool::Medium));
    assert_eq!(pending.recall_date, day(2025, 6, 28));
    assert!(!harness.working().contains(1));
    assert!(harness.working().contains(2));
}

#[test]
fn complete_requires_force_outside_working_set() {
    let harness = seeded();
    let mut service = harness.service();

    assert!(matches!(
        service.complete(complete(2)),
        Err(LifecycleError::Rejected(_))
    ));
    assert!(matches!(
        service.complete(complete(77)),
        Err(LifecycleError::Rejected(_))
    ));
    assert!(matches!(
        service.complete(complete(-1)),
        Err(LifecycleError::Validation(_))
    ));
    assert!(harness.completed().is_empty());
}

#[test]
fn forced_complete_pins_current_pool() {
    let harness = seeded();
    let mut service = harness.service();

    service
        .complete(CompleteRequest {
            force: true,
            ..complete(2)
        })
        .unwrap();

    let pending = *harness.completed().get(2).unwrap();
    assert_eq!(pending.pool_override, Some(Pool::Low));
    assert_eq!(pending.recall_date, today());
}

#[test]
fn complete_all_sweeps_working_set() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(3)).unwrap();

    let outcome = service.complete_all().unwrap();
    assert_eq!(outcome.detail, vec![1, 2, 3]);
    assert!(outcome.warnings.is_empty());
    assert!(harness.working().is_empty());
    assert_eq!(harness.completed().len(), 3);
    assert!(harness
        .completed()
        .entries()
        .values()
        .all(|pending| pending.pool_override.is_none()));
}

#[test]
fn commit_applies_pending_updates() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(2)).unwrap();
    service
        .complete(CompleteRequest {
            pool_override: Some(Pool::Medium),
            recall_date: Some(day(2025, 6, 28)),
            ..complete(1)
        })
        .unwrap();
    service.complete(complete(2)).unwrap();

    let outcome = service.commit(false).unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.detail, vec![1, 2]);

    let first = harness.active().get_by_id(1).unwrap().unwrap();
    assert_eq!(first.pool, Pool::Medium);
    assert_eq!(first.last_recall, day(2025, 6, 28));
    assert_eq!(first.total_recalls, 1);
    let second = harness.active().get_by_id(2).unwrap().unwrap();
    assert_eq!(second.pool, Pool::Low);
    assert_eq!(second.last_recall, today());
    assert_eq!(second.total_recalls, 1);
    assert!(harness.completed().is_empty());
}

#[test]
fn commit_refuses_pending_working_set_and_empty_staging() {
    let harness = seeded();
    let mut service = harness.service();

    assert!(matches!(
        service.commit(false),
        Err(LifecycleError::Rejected(_))
    ));

    service.recall(top(2)).unwrap();
    service.complete(complete(1)).unwrap();
    assert!(matches!(
        service.commit(false),
        Err(LifecycleError::Rejected(_))
    ));

    let forced = service.commit(true).unwrap();
    assert!(forced.is_success());
    assert!(service.working().contains(2));
}

#[test]
fn failed_batch_update_keeps_original_staging() {
    let harness = seeded();
    let active = FaultyStore::new(harness.active()).failing("batch_update");
    let mut service = harness.service_with(active, harness.archive());
    service.recall(top(2)).unwrap();
    service.complete(complete(1)).unwrap();
    service
        .complete(CompleteRequest {
            pool_override: Some(Pool::High),
            recall_date: Some(day(2025, 6, 20)),
            ..complete(2)
        })
        .unwrap();
    let before = harness.completed().entries().clone();

    let outcome = service.commit(false).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.rollback_failures.is_empty());

    let after = harness.completed();
    assert_eq!(after.entries(), &before);
    assert_eq!(after.get(1).unwrap().pool_override, None);
    assert_eq!(harness.active().get_by_id(1).unwrap().unwrap().total_recalls, 0);
    assert_eq!(harness.active().get_by_id(2).unwrap().unwrap().pool, Pool::Low);
}

#[test]
fn unwritable_staging_after_batch_update_is_reported() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(2)).unwrap();
    service.complete_all().unwrap();
    std::fs::remove_file(harness.completed_path()).unwrap();
    std::fs::create_dir(harness.completed_path()).unwrap();

    let outcome = service.commit(false).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.detail, vec![1, 2]);
    assert_eq!(service.completed().len(), 2);
    assert_eq!(harness.active().get_by_id(1).unwrap().unwrap().total_recalls, 1);
    assert_eq!(harness.active().get_by_id(2).unwrap().unwrap().total_recalls, 1);
}

#[test]
fn commit_leaves_missing_items_staged() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(2)).unwrap();
    service.complete_all().unwrap();
    assert!(harness.active().delete(1).unwrap());

    let outcome = service.commit(false).unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.detail, vec![2]);
    assert_eq!(outcome.warnings.len(), 1);
    let staged = harness.completed();
    assert!(staged.contains(1));
    assert!(!staged.contains(2));
}

#[test]
fn rollback_returns_ids_to_working_set() {
    let harness = seeded();
    let mut service = harness.service();
    service.recall(top(3)).unwrap();
    service.complete_all().unwrap();

    assert!(service.rollback(2).unwrap().is_success());
    assert!(harness.working().contains(2));
    assert!(!harness.completed().contains(2));
    assert!(matches!(
        service.rollback(2),
        Err(LifecycleError::Rejected(_))
    ));

    let outcome = service.rollback_all().unwrap();
    assert_eq!(outcome.detail, vec![1, 3]);
    assert_eq!(harness.working().len(), 3);
    assert!(harness.completed().is_empty());
    assert!(matches!(
        service.rollback_all(),
        Err(LifecycleError::Rejected(_))
    ));
}

mod common;

use common::{item, today, Harness};
use srs_core::service::recall_service::{validate_custom_ids, CustomRecallError};
use srs_core::{ItemStore, Pool, RecallParams, RecallService};

#[test]
fn high_pool_item_outranks_older_low_pool_item() {
    let harness = Harness::with_items(&[item(1, Pool::High, 13, 0), item(2, Pool::Low, 16, 0)]);
    let params = RecallParams::default();

    let a = params.score(&harness.active().get_by_id(1).unwrap().unwrap(), today());
    let b = params.score(&harness.active().get_by_id(2).unwrap().unwrap(), today());
    assert!((a - 651.4).abs() < 0.1, "unexpected score {a}");
    assert!((b - 278.6).abs() < 0.1, "unexpected score {b}");

    let mut scheduler = RecallService::load(&harness.active(), params, today()).unwrap();
    assert_eq!(scheduler.recall(2), vec![1, 2]);
}

#[test]
fn recall_yields_non_increasing_scores() {
    let items = vec![
        item(1, Pool::Low, 30, 2),
        item(2, Pool::High, 2, 4),
        item(3, Pool::Medium, 9, 0),
        item(4, Pool::High, 40, 10),
        item(5, Pool::Low, 1, 0),
        item(6, Pool::Medium, 21, 3),
    ];
    let params = RecallParams::default();
    let mut scheduler = RecallService::from_items(&items, params, today());

    let order = scheduler.recall(items.len());
    assert_eq!(order.len(), items.len());
    let scores: Vec<f64> = order
        .iter()
        .map(|id| {
            let item = items.iter().find(|item| item.id == *id).unwrap();
            params.score(item, today())
        })
        .collect();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]), "{scores:?}");
}

#[test]
fn more_recalls_strictly_lower_the_score() {
    let params = RecallParams::default();
    for pool in [Pool::High, Pool::Medium, Pool::Low] {
        let fewer = params.score(&item(1, pool, 10, 2), today());
        let more = params.score(&item(1, pool, 10, 3), today());
        assert!(more < fewer);
    }
}

#[test]
fn recall_stops_when_queue_runs_dry() {
    let items = vec![item(1, Pool::Low, 1, 0)];
    let mut scheduler = RecallService::from_items(&items, RecallParams::default(), today());

    assert_eq!(scheduler.recall(5), vec![1]);
    assert!(scheduler.recall(1).is_empty());
}

#[test]
fn custom_ids_single_request_is_strict() {
    let harness = Harness::with_items(&[item(1, Pool::Low, 1, 0)]);
    let store = harness.active();

    assert_eq!(
        validate_custom_ids(&store, &[0]).unwrap(),
        Err(CustomRecallError::NonPositive(0))
    );
    assert_eq!(
        validate_custom_ids(&store, &[8]).unwrap(),
        Err(CustomRecallError::NotFound(8))
    );
    assert_eq!(
        validate_custom_ids(&store, &[]).unwrap(),
        Err(CustomRecallError::Empty)
    );
    assert_eq!(validate_custom_ids(&store, &[1]).unwrap().unwrap().ids, vec![1]);
}

#[test]
fn custom_ids_list_request_filters_with_warnings() {
    let harness = Harness::with_items(&[item(1, Pool::Low, 1, 0), item(3, Pool::Low, 1, 0)]);
    let store = harness.active();

    let accepted = validate_custom_ids(&store, &[3, -2, 8, 1, 3]).unwrap().unwrap();
    assert_eq!(accepted.ids, vec![3, 1]);
    assert_eq!(accepted.warnings.len(), 2);

    assert_eq!(
        validate_custom_ids(&store, &[-1, 9]).unwrap(),
        Err(CustomRecallError::NoValidIds)
    );
}

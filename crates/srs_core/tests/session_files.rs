mod common;

use common::{day, today};
use srs_core::{CompletedSet, Pool, SessionError, WorkingSet};

#[test]
fn working_set_roundtrips_through_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("working.set");

    let mut set = WorkingSet::open(&path, today()).unwrap();
    assert!(set.fill([17, 42, 3]).unwrap());
    assert!(set.remove(3).unwrap());
    drop(set);

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "2025-06-30\n2\n17\n42\n"
    );
    let reopened = WorkingSet::open(&path, day(2030, 1, 1)).unwrap();
    assert_eq!(reopened.created_on(), today());
    assert_eq!(reopened.ids().iter().copied().collect::<Vec<_>>(), vec![17, 42]);
}

#[test]
fn completed_set_roundtrips_null_and_concrete_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("completed.set");

    let mut set = CompletedSet::open(&path, today()).unwrap();
    assert!(set.add(5, None, day(2025, 6, 29)).unwrap());
    assert!(set.add(2, Some(Pool::Low), today()).unwrap());
    drop(set);

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "2025-06-30\n2\n2 L 2025-06-30\n5 null 2025-06-29\n"
    );
    let reopened = CompletedSet::open(&path, today()).unwrap();
    assert_eq!(reopened.get(5).unwrap().pool_override, None);
    assert_eq!(reopened.get(5).unwrap().recall_date, day(2025, 6, 29));
    assert_eq!(reopened.get(2).unwrap().pool_override, Some(Pool::Low));
}

#[test]
fn completed_set_keeps_first_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut set = CompletedSet::open(dir.path().join("completed.set"), today()).unwrap();

    assert!(set.add(9, Some(Pool::High), today()).unwrap());
    assert!(!set.add(9, None, day(2025, 1, 1)).unwrap());
    assert_eq!(set.get(9).unwrap().pool_override, Some(Pool::High));
    assert!(set.clear().unwrap());
    assert!(set.is_empty());
}

#[test]
fn loader_ignores_blank_lines_and_trusts_records_over_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("completed.set");
    std::fs::write(&path, "2025-06-01\n5\n\n1 h 2025-06-02\n\n2 null 2025-06-03\n").unwrap();

    let set = CompletedSet::open(&path, today()).unwrap();
    assert_eq!(set.created_on(), day(2025, 6, 1));
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(1).unwrap().pool_override, Some(Pool::High));
}

#[test]
fn malformed_record_names_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("working.set");
    std::fs::write(&path, "2025-06-01\n2\n4\nfour\n").unwrap();

    match WorkingSet::open(&path, today()).unwrap_err() {
        SessionError::Malformed { line, .. } => assert_eq!(line, 4),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_header_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("completed.set");
    std::fs::write(&path, "not-a-date\n0\n").unwrap();

    assert!(matches!(
        CompletedSet::open(&path, today()),
        Err(SessionError::Malformed { line: 1, .. })
    ));
}

#[test]
fn completed_set_remove_all_writes_once_and_keeps_memory_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("completed.set");

    let mut set = CompletedSet::open(&path, today()).unwrap();
    for id in [1, 2, 3] {
        assert!(set.add(id, None, today()).unwrap());
    }
    assert_eq!(set.remove_all(&[1, 3, 9]).unwrap(), 2);
    assert_eq!(
        CompletedSet::open(&path, today()).unwrap().entries().keys().copied().collect::<Vec<_>>(),
        vec![2]
    );

    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    assert!(matches!(set.remove_all(&[2]), Err(SessionError::Io { .. })));
    assert!(set.contains(2));
}

//! Store-level scenarios spanning graph, validation and the timeline.

use topdown_core::store::{kind, RowUpdate};
use topdown_core::{CommitPolicy, Error, NoOpReason, Outcome, Row, RowId, RowStatus, Store};

fn ids(list: &[RowId]) -> Vec<&str> {
    list.iter().map(RowId::as_str).collect()
}

#[test]
fn build_lock_and_break_a_chain() {
    let policy = CommitPolicy::lenient();
    let mut store = Store::new();

    store.add_row(Row::new("A", "Alpha"), &policy).unwrap();
    store
        .add_row(Row::new("B", "Beta").with_depends(["A"]), &policy)
        .unwrap();
    store
        .add_row(Row::new("C", "Gamma").with_depends(["B", "A"]), &policy)
        .unwrap();

    let graph = store.graph();
    assert_eq!(graph.compute_max_depth(), 2);
    assert_eq!(graph.node_depths()[&RowId::new("C")], 2);

    let lock = RowUpdate {
        locked: Some(true),
        ..RowUpdate::default()
    };
    store.update_row("A", &lock, &policy).unwrap();
    assert!(store.row("A").unwrap().locked);

    let mut affected = ids(&store.graph().affected_downstream("A"))
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    affected.sort();
    assert_eq!(affected, vec!["B", "C"]);

    let close_loop = RowUpdate {
        depends: Some(vec![RowId::new("C")]),
        ..RowUpdate::default()
    };
    let report = store.update_row("B", &close_loop, &policy).unwrap();

    let cycles = store.graph().detect_cycles();
    assert!(cycles.iter().any(|cycle| {
        cycle.iter().any(|id| id == "B") && cycle.iter().any(|id| id == "C")
    }));

    assert!(report.has_issues);
    assert_eq!(report.cycle_warnings.len(), 1);
    let warning = &report.cycle_warnings[0];
    assert!(warning.starts_with("Circular: "));
    assert!(warning.contains('B') && warning.contains('C'));

    // Cycle members carry the override; the locked root does not.
    assert_eq!(store.row("B").unwrap().status, Some(RowStatus::Error));
    assert_eq!(store.row("C").unwrap().status, Some(RowStatus::Error));
    assert_eq!(store.row("A").unwrap().status, None);
    assert_eq!(store.history().len(), 5);
}

#[test]
fn structural_policy_refuses_the_cycle() {
    let mut store = Store::new();
    let lenient = CommitPolicy::lenient();
    store.add_row(Row::new("A", "A"), &lenient).unwrap();
    store
        .add_row(Row::new("B", "B").with_depends(["A"]), &lenient)
        .unwrap();

    let close_loop = RowUpdate {
        depends: Some(vec![RowId::new("B")]),
        ..RowUpdate::default()
    };
    let err = store
        .update_row("A", &close_loop, &CommitPolicy::structural())
        .unwrap_err();

    match err {
        Error::CommitRejected(report) => assert_eq!(report.cycle_warnings.len(), 1),
        other => panic!("expected CommitRejected, got {other:?}"),
    }
    assert_eq!(store.history().len(), 2);
    assert!(store.row("A").unwrap().depends.is_empty());
}

#[test]
fn restore_is_non_destructive() {
    let policy = CommitPolicy::lenient();
    let mut store = Store::new();
    store.add_row(Row::new("a", "A"), &policy).unwrap();
    store.add_row(Row::new("b", "B"), &policy).unwrap();
    store.delete_row("a", &policy).unwrap();

    let k = 1;
    let before = store.history()[k].clone();
    let len = store.history().len();

    assert!(store.restore_to_index(k).is_applied());

    assert_eq!(store.history().len(), len + 1);
    assert_eq!(store.history()[k], before);
    assert_eq!(
        store.history().last().unwrap().rows_snapshot,
        before.rows_snapshot
    );

    // The restore itself can be undone.
    assert!(store.undo().is_applied());
    assert_eq!(store.rows().len(), 1);
    assert_eq!(store.history().last().unwrap().kind, kind::UNDO);
}

#[test]
fn diff_against_own_state_is_empty() {
    let policy = CommitPolicy::lenient();
    let mut store = Store::new();
    store
        .add_row(Row::new("a", "A").with_args("--x 1"), &policy)
        .unwrap();
    store
        .add_row(Row::new("b", "B").with_depends(["a"]), &policy)
        .unwrap();

    let latest = store.history().len() - 1;
    let diff = store.diff(latest).applied().unwrap();
    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
    assert!(diff.modified.is_empty());
}

#[test]
fn undo_with_short_history_changes_nothing() {
    let mut store = Store::new();
    assert_eq!(store.undo(), Outcome::NoOp(NoOpReason::NothingToUndo));
    assert!(store.history().is_empty());

    store
        .add_row(Row::new("only", "Only"), &CommitPolicy::lenient())
        .unwrap();
    let rows = store.rows().to_vec();
    assert_eq!(store.undo(), Outcome::NoOp(NoOpReason::NothingToUndo));
    assert_eq!(store.rows(), rows.as_slice());
    assert_eq!(store.history().len(), 1);
}

#[test]
fn snapshots_share_unchanged_rows() {
    let policy = CommitPolicy::lenient();
    let mut store = Store::new();
    store.add_row(Row::new("a", "A"), &policy).unwrap();
    store.add_row(Row::new("b", "B"), &policy).unwrap();

    let first = store.history()[1].rows_snapshot.clone().unwrap();
    let rename = RowUpdate {
        name: Some("B2".to_string()),
        ..RowUpdate::default()
    };
    store.update_row("b", &rename, &policy).unwrap();
    let second = store.history()[2].rows_snapshot.clone().unwrap();

    assert!(std::sync::Arc::ptr_eq(&first.rows()[0], &second.rows()[0]));
    assert!(!std::sync::Arc::ptr_eq(&first.rows()[1], &second.rows()[1]));
    assert_eq!(first.rows()[1].name, "B");
}

#[test]
fn bookmarks_survive_timeline_navigation() {
    let policy = CommitPolicy::lenient();
    let mut store = Store::new();
    store.add_row(Row::new("a", "A"), &policy).unwrap();
    let bookmark = store.add_bookmark("one").unwrap();
    store.add_row(Row::new("b", "B"), &policy).unwrap();

    let _ = store.set_playhead(0);
    let _ = store.undo();
    assert_eq!(store.bookmarks(), &[bookmark.clone()]);

    store.add_row(Row::new("c", "C"), &policy).unwrap();
    assert!(store.restore_bookmark(&bookmark.id).is_applied());
    assert_eq!(store.rows().len(), 1);
    assert_eq!(
        store.history().last().unwrap().kind,
        kind::BOOKMARK_RESTORE
    );
}

#[test]
fn persisted_round_trip_preserves_timeline() {
    let policy = CommitPolicy::lenient();
    let mut store = Store::new();
    store.add_row(Row::new("a", "A"), &policy).unwrap();
    store
        .add_row(Row::new("b", "B").with_depends(["a", "missing"]), &policy)
        .unwrap();
    let _ = store.duplicate_as_variant("b").unwrap();

    let json = store.to_json_string().unwrap();
    let (loaded, warnings) = Store::from_json_str(&json);

    assert!(warnings.is_empty());
    assert_eq!(loaded, store);
    assert_eq!(loaded.row("b-2").unwrap().depends, store.row("b").unwrap().depends);
}

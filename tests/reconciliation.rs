//! End-to-end behaviour of the manager against the headless model widget.

use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use table_reconciler::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn section(id: &str, rows: &[&str]) -> Section {
    Section::new(id, rows.iter().map(|r| Row::plain(*r)))
}

fn active(tree: Tree) -> TableManager<ModelWidget> {
    init_logging();
    let mut manager = TableManager::new(ModelWidget::new(), TableConfig::default());
    manager.initialize(tree).expect("initialize");
    manager.widget_mut().take_calls();
    manager
}

fn record_updates(manager: &mut TableManager<ModelWidget>) -> Rc<RefCell<Vec<Tree>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    manager.set_on_sections_updated(move |tree: &Tree| sink.borrow_mut().push(tree.clone()));
    seen
}

// =============================================================================
// Initial display
// =============================================================================

#[test]
fn initialize_performs_full_display() {
    init_logging();
    let mut manager = TableManager::new(ModelWidget::new(), TableConfig::default());
    let tree = Tree::new([section("A", &["r1", "r2", "r3"])]);
    manager.initialize(tree.clone()).unwrap();

    assert_eq!(
        manager.widget().calls(),
        &[
            WidgetCall::ApplyConfig(TableConfig::default()),
            WidgetCall::ReloadData { sections: 1, rows: 3 },
        ]
    );
    assert_eq!(manager.current_tree().unwrap(), &tree);
    assert_eq!(manager.widget().snapshot(), tree);
}

#[test]
fn initialize_does_not_notify_observer() {
    init_logging();
    let mut manager = TableManager::new(ModelWidget::new(), TableConfig::default());
    let seen = record_updates(&mut manager);
    manager.initialize(Tree::new([section("A", &["r1"])])).unwrap();
    assert!(seen.borrow().is_empty());
}

#[test]
fn initialize_from_empty_then_update_inserts_section_only() {
    let mut manager = active(Tree::empty());
    let plan = manager
        .update_tree(Tree::new([section("A", &["r1", "r2", "r3"])]))
        .unwrap();
    assert_eq!(plan.ops, vec![TableOp::InsertSection { index: 0 }]);
    assert_eq!(
        manager.widget().structural_calls(),
        vec![&WidgetCall::InsertSections(vec![0])]
    );
}

// =============================================================================
// update_tree
// =============================================================================

#[test]
fn swapping_rows_issues_exactly_one_move() {
    let mut manager = active(Tree::new([section("A", &["r1", "r2"])]));
    let next = Tree::new([section("A", &["r2", "r1"])]);
    let plan = manager.update_tree(next.clone()).unwrap();

    assert_eq!(plan.len(), 1);
    let structural = manager.widget().structural_calls();
    assert_eq!(structural.len(), 1);
    assert!(matches!(
        structural[0],
        WidgetCall::MoveRow { from, to }
            if (from.row, to.row) == (0, 1) || (from.row, to.row) == (1, 0)
    ));
    assert_eq!(manager.current_tree().unwrap(), &next);
    assert_eq!(manager.widget().snapshot(), next);
}

#[test]
fn same_tree_twice_is_idempotent() {
    let mut manager = active(Tree::new([section("A", &["r1"])]));
    let next = Tree::new([section("A", &["r1", "r2"]), section("B", &["r3"])]);
    assert!(!manager.update_tree(next.clone()).unwrap().is_empty());
    manager.widget_mut().take_calls();

    let again = manager.update_tree(next.clone()).unwrap();
    assert!(again.is_empty());
    assert!(manager.widget().calls().is_empty());
    assert_eq!(manager.current_tree().unwrap(), &next);
}

#[test]
fn observer_receives_committed_tree() {
    let mut manager = active(Tree::new([section("A", &["r1"])]));
    let seen = record_updates(&mut manager);
    let next = Tree::new([section("B", &[]), section("A", &["r1", "r2"])]);
    manager.update_tree(next.clone()).unwrap();
    assert_eq!(*seen.borrow(), vec![next]);
}

#[test]
fn content_change_reloads_only_that_row() {
    let mut manager = active(Tree::new([section("A", &["r1", "r2", "r3"])]));
    let mut next = manager.current_tree().unwrap().clone();
    next.sections[0].rows[1].content = json!({ "title": "renamed" });

    let plan = manager.update_tree(next.clone()).unwrap();
    assert_eq!(plan.ops, vec![TableOp::ReloadRow { at: IndexPath::new(0, 1) }]);
    assert_eq!(
        manager.widget().structural_calls(),
        vec![&WidgetCall::ReloadRows(vec![IndexPath::new(0, 1)])]
    );
    assert_eq!(manager.widget().snapshot(), next);
}

#[test]
fn mixed_update_converges() {
    let mut manager = active(Tree::new([
        section("A", &["a1", "a2", "a3"]),
        section("B", &["b1"]),
        section("C", &["c1", "c2"]),
    ]));
    let next = Tree::new([
        section("C", &["c2", "c1", "c3"]).with_header(json!("C")),
        section("D", &["d1"]),
        section("A", &["a3", "b1"]),
    ]);
    let plan = manager.update_tree(next.clone()).unwrap();

    assert_eq!(plan.section_deletes(), vec![1]);
    assert_eq!(plan.section_inserts(), vec![1]);
    assert_eq!(plan.section_reloads(), vec![2]);
    assert_eq!(manager.widget().snapshot(), next);
}

#[test]
fn selection_survives_reorder() {
    let mut manager = active(Tree::new([section("A", &["r1", "r2", "r3"])]));
    manager.widget_mut().select_row(IndexPath::new(0, 0)).unwrap();
    manager
        .update_tree(Tree::new([section("A", &["r0", "r2", "r3", "r1"])]))
        .unwrap();
    assert_eq!(manager.widget().selected_rows(), vec![IndexPath::new(0, 3)]);

    manager.reload().unwrap();
    assert!(manager.widget().selected_rows().is_empty());
}

// =============================================================================
// Failure and rollback
// =============================================================================

#[test]
fn malformed_update_leaves_tree_untouched() {
    let before = Tree::new([section("A", &["r1", "r2"])]);
    let mut manager = active(before.clone());
    let seen = record_updates(&mut manager);

    let err = manager
        .update_tree(Tree::new([section("A", &["r1", "r1"])]))
        .unwrap_err();
    assert!(matches!(err, ReconcilerError::MalformedTree { .. }));
    assert_eq!(manager.current_tree().unwrap(), &before);
    assert!(manager.widget().calls().is_empty());
    assert!(seen.borrow().is_empty());
}

#[test]
fn duplicate_section_ids_are_rejected() {
    let mut manager = active(Tree::empty());
    let err = manager
        .update_tree(Tree::new([section("A", &[]), section("A", &[])]))
        .unwrap_err();
    assert!(err.to_string().contains("duplicate section id"));
}

#[test]
fn widget_rejection_rolls_back() {
    let before = Tree::new([section("A", &["r1", "r2"])]);
    let mut manager = active(before.clone());
    let seen = record_updates(&mut manager);

    // Something displayed out of band: the widget no longer matches.
    let drifted = Tree::new([section("A", &["r1"])]);
    manager.widget_mut().reload_data(&drifted);

    let err = manager
        .update_tree(Tree::new([section("A", &["r1", "r2", "r3"])]))
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Reconciliation { source: WidgetError::CountMismatch { .. } }
    ));
    assert_eq!(manager.current_tree().unwrap(), &before);
    assert_eq!(manager.widget().snapshot(), drifted);
    assert!(!manager.widget().in_transaction());
    assert!(seen.borrow().is_empty());
}

/// Accepts every call and rejects every commit.
#[derive(Default)]
struct RejectingWidget {
    open: bool,
    commits_attempted: usize,
}

impl TableWidget for RejectingWidget {
    fn reload_data(&mut self, _data: &Tree) {}

    fn begin_updates(&mut self) -> Result<(), WidgetError> {
        self.open = true;
        Ok(())
    }

    fn delete_sections(&mut self, _indices: &[usize]) {}
    fn insert_sections(&mut self, _indices: &[usize]) {}
    fn move_section(&mut self, _from: usize, _to: usize) {}
    fn reload_sections(&mut self, _indices: &[usize]) {}
    fn delete_rows(&mut self, _paths: &[IndexPath]) {}
    fn insert_rows(&mut self, _paths: &[IndexPath]) {}
    fn move_row(&mut self, _from: IndexPath, _to: IndexPath) {}
    fn reload_rows(&mut self, _paths: &[IndexPath]) {}

    fn end_updates(&mut self, _data: &Tree) -> Result<(), WidgetError> {
        self.open = false;
        self.commits_attempted += 1;
        Err(WidgetError::IndexOutOfRange {
            scope: "sections".into(),
            frame: Frame::New,
            index: 0,
            len: 0,
        })
    }

    fn apply_config(&mut self, _config: &TableConfig) {}
}

#[test]
fn rejection_from_any_widget_is_surfaced() {
    init_logging();
    let before = Tree::new([section("A", &["r1"])]);
    let mut manager = TableManager::new(RejectingWidget::default(), TableConfig::default());
    manager.initialize(before.clone()).unwrap();
    manager.set_on_insert_row(|| Row::plain("new"));

    assert!(manager.update_tree(Tree::new([section("A", &[])])).is_err());
    assert!(manager.insert_row_via_user_gesture(IndexPath::new(0, 0)).is_err());
    assert!(manager.delete_row_via_user_gesture(IndexPath::new(0, 0)).is_err());

    assert_eq!(manager.current_tree().unwrap(), &before);
    let widget = manager.into_widget();
    assert_eq!(widget.commits_attempted, 3);
    assert!(!widget.open);
}

// =============================================================================
// User gestures
// =============================================================================

#[test]
fn insert_gesture_places_produced_row() {
    let mut manager = active(Tree::new([section("A", &["r1", "r2", "r3"])]));
    let seen = record_updates(&mut manager);
    manager.set_on_insert_row(|| Row::new("rX", json!({ "title": "new" })));

    let at = manager.insert_row_via_user_gesture(IndexPath::new(0, 2)).unwrap();
    assert_eq!(at, IndexPath::new(0, 2));

    let current = manager.current_tree().unwrap();
    let ids: Vec<_> = current.sections[0].rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2", "rX", "r3"]);
    assert_eq!(
        manager.widget().structural_calls(),
        vec![&WidgetCall::InsertRows(vec![IndexPath::new(0, 2)])]
    );
    assert_eq!(manager.widget().snapshot(), *current);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn insert_gesture_can_append() {
    let mut manager = active(Tree::new([section("A", &["r1"])]));
    manager.set_on_insert_row(|| Row::plain(RowId::generate()));
    manager.insert_row_via_user_gesture(IndexPath::new(0, 1)).unwrap();
    manager.insert_row_via_user_gesture(IndexPath::new(0, 1)).unwrap();
    assert_eq!(manager.current_tree().unwrap().sections[0].rows.len(), 3);
}

#[test]
fn insert_gesture_without_producer_is_reported_no_op() {
    let before = Tree::new([section("A", &["r1"])]);
    let mut manager = active(before.clone());
    let err = manager
        .insert_row_via_user_gesture(IndexPath::new(0, 0))
        .unwrap_err();
    assert!(matches!(err, ReconcilerError::MisconfiguredGesture { .. }));
    assert_eq!(manager.current_tree().unwrap(), &before);
    assert!(manager.widget().calls().is_empty());
}

#[test]
fn insert_gesture_validates_position_and_identity() {
    let mut manager = active(Tree::new([section("A", &["r1"])]));
    let produced = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&produced);
    manager.set_on_insert_row(move || {
        *counter.borrow_mut() += 1;
        Row::plain("r1")
    });

    assert!(matches!(
        manager.insert_row_via_user_gesture(IndexPath::new(1, 0)),
        Err(ReconcilerError::InvalidPosition { .. })
    ));
    assert!(matches!(
        manager.insert_row_via_user_gesture(IndexPath::new(0, 2)),
        Err(ReconcilerError::InvalidPosition { .. })
    ));
    // The producer is only consulted for valid positions.
    assert_eq!(*produced.borrow(), 0);

    assert!(matches!(
        manager.insert_row_via_user_gesture(IndexPath::new(0, 0)),
        Err(ReconcilerError::MalformedTree { .. })
    ));
    assert_eq!(*produced.borrow(), 1);
    assert!(manager.widget().calls().is_empty());
}

#[test]
fn delete_gesture_respects_deletable_flag() {
    let tree = Tree::new([Section::new(
        "A",
        [Row::plain("keep").deletable(false), Row::plain("drop")],
    )]);
    let mut manager = active(tree);

    let err = manager
        .delete_row_via_user_gesture(IndexPath::new(0, 0))
        .unwrap_err();
    assert!(matches!(err, ReconcilerError::GestureNotPermitted { .. }));

    let removed = manager.delete_row_via_user_gesture(IndexPath::new(0, 1)).unwrap();
    assert_eq!(removed.id.as_str(), "drop");
    assert_eq!(
        manager.widget().structural_calls(),
        vec![&WidgetCall::DeleteRows(vec![IndexPath::new(0, 1)])]
    );
    assert_eq!(manager.widget().snapshot(), *manager.current_tree().unwrap());
}

#[test]
fn move_gesture_follows_the_widget_without_issuing_calls() {
    let mut manager = active(Tree::new([section("A", &["r1", "r2", "r3"]), section("B", &["b1"])]));
    let seen = record_updates(&mut manager);
    let (from, to) = (IndexPath::new(0, 0), IndexPath::new(1, 1));

    manager.widget_mut().simulate_user_move(from, to).unwrap();
    manager.move_row_via_user_gesture(from, to).unwrap();

    let expected = Tree::new([section("A", &["r2", "r3"]), section("B", &["b1", "r1"])]);
    assert_eq!(manager.current_tree().unwrap(), &expected);
    assert_eq!(manager.widget().snapshot(), expected);
    assert!(manager.widget().calls().is_empty());
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn move_gesture_rejects_pinned_rows_and_bad_targets() {
    let tree = Tree::new([
        Section::new("A", [Row::plain("pinned").movable(false), Row::plain("r1")]),
        section("B", &["r1"]),
    ]);
    let mut manager = active(tree.clone());

    assert!(matches!(
        manager.move_row_via_user_gesture(IndexPath::new(0, 0), IndexPath::new(0, 1)),
        Err(ReconcilerError::GestureNotPermitted { .. })
    ));
    assert!(matches!(
        manager.move_row_via_user_gesture(IndexPath::new(0, 1), IndexPath::new(0, 2)),
        Err(ReconcilerError::InvalidPosition { .. })
    ));
    assert!(matches!(
        manager.move_row_via_user_gesture(IndexPath::new(0, 1), IndexPath::new(1, 0)),
        Err(ReconcilerError::MalformedTree { .. })
    ));
    assert_eq!(manager.current_tree().unwrap(), &tree);
}

#[test]
fn update_after_gesture_diffs_against_gesture_result() {
    let mut manager = active(Tree::new([section("A", &["r1", "r2"])]));
    manager.set_on_insert_row(|| Row::plain("r3"));
    manager.insert_row_via_user_gesture(IndexPath::new(0, 2)).unwrap();
    manager.widget_mut().take_calls();

    let plan = manager
        .update_tree(Tree::new([section("A", &["r1", "r2", "r3"])]))
        .unwrap();
    assert!(plan.is_empty());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn config_is_applied_on_initialize_and_on_change() {
    init_logging();
    let config = TableConfig::from_json(r#"{ "style": "grouped", "allows_multiple_selection": true }"#).unwrap();
    let mut manager = TableManager::new(ModelWidget::new(), config.clone());
    manager.initialize(Tree::new([section("A", &["r1", "r2"])])).unwrap();
    assert_eq!(manager.widget().config(), &config);

    manager.widget_mut().select_row(IndexPath::new(0, 0)).unwrap();
    manager.widget_mut().select_row(IndexPath::new(0, 1)).unwrap();
    assert_eq!(manager.widget().selected_rows().len(), 2);

    manager.set_editing(true);
    assert!(manager.widget().config().editing);
    assert!(!manager.widget().config().multiselect_active());
    manager.set_multiselect(false);
    assert!(!manager.config().allows_multiple_selection);
}

#[test]
fn trees_load_from_json() {
    let tree = converters::tree_from_json(
        r#"[{ "id": "A", "rows": [{ "id": "r2" }, { "id": "r1" }] }]"#,
    )
    .unwrap();
    let mut manager = active(converters::tree_from_json(
        r#"[{ "id": "A", "rows": [{ "id": "r1" }, { "id": "r2" }] }]"#,
    )
    .unwrap());
    assert!(manager.update_tree(tree).unwrap().is_pure_reorder());
}

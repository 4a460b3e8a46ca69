//! The reconciliation manager: owns the committed tree and drives the widget
use crate::config::TableConfig;
use crate::diff_engine::diff;
use crate::errors::{ReconcilerError, WidgetError};
use crate::types::{DiffPlan, IndexPath, Row, Tree};
use crate::widget::TableWidget;
use log::{debug, info, warn};

/// Supplies the row for an insert gesture started by the widget.
pub trait RowProducer {
    fn produce_row(&mut self) -> Row;
}

impl<F: FnMut() -> Row> RowProducer for F {
    fn produce_row(&mut self) -> Row {
        self()
    }
}

/// Told about every committed tree, synchronously, after the widget shows it.
pub trait SectionsObserver {
    fn sections_updated(&mut self, sections: &Tree);
}

impl<F: FnMut(&Tree)> SectionsObserver for F {
    fn sections_updated(&mut self, sections: &Tree) {
        self(sections)
    }
}

/// Replays `plan` as one batch. Deletes come from the old frame, inserts
/// and move destinations from the new one, as the plan already holds them.
fn replay<W: TableWidget>(widget: &mut W, plan: &DiffPlan, data: &Tree) -> Result<(), WidgetError> {
    widget.begin_updates()?;

    let indices = plan.section_deletes();
    if !indices.is_empty() {
        widget.delete_sections(&indices);
    }
    let indices = plan.section_inserts();
    if !indices.is_empty() {
        widget.insert_sections(&indices);
    }
    for (from, to) in plan.section_moves() {
        widget.move_section(from, to);
    }
    let indices = plan.section_reloads();
    if !indices.is_empty() {
        widget.reload_sections(&indices);
    }

    let paths = plan.row_deletes();
    if !paths.is_empty() {
        widget.delete_rows(&paths);
    }
    let paths = plan.row_inserts();
    if !paths.is_empty() {
        widget.insert_rows(&paths);
    }
    for (from, to) in plan.row_moves() {
        widget.move_row(from, to);
    }
    let paths = plan.row_reloads();
    if !paths.is_empty() {
        widget.reload_rows(&paths);
    }

    widget.end_updates(data)
}

/// Keeps a [`TableWidget`] in step with a declaratively supplied [`Tree`].
///
/// The manager starts uninitialized; every operation other than
/// [`initialize`](TableManager::initialize) and the mode-flag setters
/// returns [`ReconcilerError::NotInitialized`] until then. A failed
/// operation never replaces the committed tree.
pub struct TableManager<W: TableWidget> {
    widget: W,
    config: TableConfig,
    sections: Option<Tree>,
    on_insert_row: Option<Box<dyn RowProducer>>,
    on_sections_updated: Option<Box<dyn SectionsObserver>>,
}

impl<W: TableWidget> TableManager<W> {
    pub fn new(widget: W, config: TableConfig) -> Self {
        TableManager {
            widget,
            config,
            sections: None,
            on_insert_row: None,
            on_sections_updated: None,
        }
    }

    /// Full initial display of `tree`. Calling it again re-displays from
    /// scratch. The observer is not notified.
    pub fn initialize(&mut self, tree: Tree) -> Result<(), ReconcilerError> {
        tree.validate()?;
        info!(
            "TableManager: initialize with {} sections, {} rows",
            tree.len(),
            tree.row_count()
        );
        self.widget.apply_config(&self.config);
        self.widget.reload_data(&tree);
        self.sections = Some(tree);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.sections.is_some()
    }

    pub fn current_tree(&self) -> Result<&Tree, ReconcilerError> {
        self.sections.as_ref().ok_or(ReconcilerError::NotInitialized)
    }

    /// Redisplays the committed tree without diffing.
    pub fn reload(&mut self) -> Result<(), ReconcilerError> {
        let current = self.sections.as_ref().ok_or(ReconcilerError::NotInitialized)?;
        info!("TableManager: full reload of {} sections", current.len());
        self.widget.reload_data(current);
        Ok(())
    }

    /// Diffs `new_tree` against the committed tree and applies the result
    /// as a single batch. Returns the applied plan; an empty plan touches
    /// neither the widget nor the observer.
    pub fn update_tree(&mut self, new_tree: Tree) -> Result<DiffPlan, ReconcilerError> {
        let current = self.sections.as_ref().ok_or(ReconcilerError::NotInitialized)?;
        new_tree.validate()?;

        let plan = diff(current, &new_tree);
        if plan.is_empty() {
            debug!("TableManager: update produced no changes");
            return Ok(plan);
        }

        debug!("TableManager: replaying {} ops", plan.len());
        replay(&mut self.widget, &plan, &new_tree).map_err(|source| {
            warn!("TableManager: update rejected by widget: {}", source);
            ReconcilerError::Reconciliation { source }
        })?;

        self.commit(new_tree);
        Ok(plan)
    }

    /// Handles the widget's "add row" affordance at `at`: asks the
    /// registered [`RowProducer`] for the row and inserts just that row.
    pub fn insert_row_via_user_gesture(&mut self, at: IndexPath) -> Result<IndexPath, ReconcilerError> {
        let current = self.sections.as_ref().ok_or(ReconcilerError::NotInitialized)?;
        let Some(producer) = self.on_insert_row.as_mut() else {
            warn!("TableManager: insert gesture at {} with no row producer registered", at);
            return Err(ReconcilerError::MisconfiguredGesture { at });
        };

        let section = current.section(at.section).ok_or_else(|| ReconcilerError::InvalidPosition {
            at,
            details: format!("tree has {} sections", current.len()),
        })?;
        if at.row > section.rows.len() {
            return Err(ReconcilerError::InvalidPosition {
                at,
                details: format!("section '{}' has {} rows", section.id, section.rows.len()),
            });
        }

        let row = producer.produce_row();
        if section.row_index(&row.id).is_some() {
            return Err(ReconcilerError::MalformedTree {
                details: format!("produced row id '{}' already exists in section '{}'", row.id, section.id),
            });
        }

        let mut next = current.clone();
        next.sections[at.section].rows.insert(at.row, row);

        self.widget.begin_updates()?;
        self.widget.insert_rows(&[at]);
        self.widget.end_updates(&next)?;

        self.commit(next);
        Ok(at)
    }

    /// Handles an edit-mode or swipe delete of the row at `at`.
    pub fn delete_row_via_user_gesture(&mut self, at: IndexPath) -> Result<Row, ReconcilerError> {
        let current = self.sections.as_ref().ok_or(ReconcilerError::NotInitialized)?;
        let row = current.row(at).ok_or_else(|| ReconcilerError::InvalidPosition {
            at,
            details: "no row at this position".into(),
        })?;
        if !row.deletable {
            return Err(ReconcilerError::GestureNotPermitted {
                row: row.id.to_string(),
                details: "row is not deletable".into(),
            });
        }

        let mut next = current.clone();
        let removed = next.sections[at.section].rows.remove(at.row);

        self.widget.begin_updates()?;
        self.widget.delete_rows(&[at]);
        self.widget.end_updates(&next)?;

        self.commit(next);
        Ok(removed)
    }

    /// Records a drag reorder the widget has already performed on screen,
    /// so no widget call is issued. `to` is addressed after the row has
    /// been lifted out of `from`.
    pub fn move_row_via_user_gesture(&mut self, from: IndexPath, to: IndexPath) -> Result<(), ReconcilerError> {
        let current = self.sections.as_ref().ok_or(ReconcilerError::NotInitialized)?;
        let row = current.row(from).ok_or_else(|| ReconcilerError::InvalidPosition {
            at: from,
            details: "no row at this position".into(),
        })?;
        if !row.movable {
            return Err(ReconcilerError::GestureNotPermitted {
                row: row.id.to_string(),
                details: "row is not movable".into(),
            });
        }
        let dest = current.section(to.section).ok_or_else(|| ReconcilerError::InvalidPosition {
            at: to,
            details: format!("tree has {} sections", current.len()),
        })?;
        let same_section = from.section == to.section;
        let dest_len = dest.rows.len() - usize::from(same_section);
        if to.row > dest_len {
            return Err(ReconcilerError::InvalidPosition {
                at: to,
                details: format!("section '{}' accepts rows up to index {}", dest.id, dest_len),
            });
        }
        if !same_section && dest.row_index(&row.id).is_some() {
            return Err(ReconcilerError::MalformedTree {
                details: format!("row id '{}' already exists in section '{}'", row.id, dest.id),
            });
        }
        if from == to {
            return Ok(());
        }

        let mut next = current.clone();
        let moved = next.sections[from.section].rows.remove(from.row);
        next.sections[to.section].rows.insert(to.row, moved);
        debug!("TableManager: user moved row {} -> {}", from, to);

        self.commit(next);
        Ok(())
    }

    /// Replaces any earlier producer.
    pub fn set_on_insert_row(&mut self, producer: impl RowProducer + 'static) {
        self.on_insert_row = Some(Box::new(producer));
    }

    pub fn clear_on_insert_row(&mut self) {
        self.on_insert_row = None;
    }

    /// Replaces any earlier observer.
    pub fn set_on_sections_updated(&mut self, observer: impl SectionsObserver + 'static) {
        self.on_sections_updated = Some(Box::new(observer));
    }

    pub fn clear_on_sections_updated(&mut self) {
        self.on_sections_updated = None;
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: TableConfig) {
        self.config = config;
        self.widget.apply_config(&self.config);
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.config.editing = editing;
        self.widget.apply_config(&self.config);
    }

    pub fn set_multiselect(&mut self, enabled: bool) {
        self.config.allows_multiple_selection = enabled;
        self.widget.apply_config(&self.config);
    }

    pub fn set_multiselect_during_editing(&mut self, enabled: bool) {
        self.config.allows_multiple_selection_during_editing = enabled;
        self.widget.apply_config(&self.config);
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    pub fn into_widget(self) -> W {
        self.widget
    }

    fn commit(&mut self, tree: Tree) {
        let committed = self.sections.insert(tree);
        if let Some(observer) = self.on_sections_updated.as_mut() {
            observer.sections_updated(committed);
        }
    }
}

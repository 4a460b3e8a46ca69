//! The batched-update protocol a list widget exposes to the manager
use crate::config::TableConfig;
use crate::errors::WidgetError;
use crate::types::{IndexPath, Tree};

/// A stateful, sectioned list widget driven by [`crate::TableManager`].
///
/// Structural calls between [`begin_updates`](TableWidget::begin_updates)
/// and [`end_updates`](TableWidget::end_updates) are queued, not applied.
/// Deletes and reloads are indexed against the arrangement displayed before
/// the batch; inserts and move destinations against the arrangement after
/// it. `end_updates` commits the whole batch against `data`, the tree the
/// widget displays afterwards. On `Err` the widget must have discarded the
/// batch and still display the pre-batch state.
pub trait TableWidget {
    /// Full redisplay with no diff.
    fn reload_data(&mut self, data: &Tree);

    fn begin_updates(&mut self) -> Result<(), WidgetError>;

    fn delete_sections(&mut self, indices: &[usize]);
    fn insert_sections(&mut self, indices: &[usize]);
    fn move_section(&mut self, from: usize, to: usize);
    fn reload_sections(&mut self, indices: &[usize]);

    fn delete_rows(&mut self, paths: &[IndexPath]);
    fn insert_rows(&mut self, paths: &[IndexPath]);
    fn move_row(&mut self, from: IndexPath, to: IndexPath);
    fn reload_rows(&mut self, paths: &[IndexPath]);

    fn end_updates(&mut self, data: &Tree) -> Result<(), WidgetError>;

    /// Mode flags; no structural effect.
    fn apply_config(&mut self, config: &TableConfig);
}

//! Headless in-memory list widget implementing the batched-update protocol.
//!
//! `ModelWidget` keeps its own copy of what is displayed and rebuilds it from
//! queued operations the way a real sectioned list does: deletes and reloads
//! read the pre-batch arrangement, inserts and move destinations the
//! post-batch one, and untouched survivors keep their relative order. After
//! rebuilding it cross-checks counts and identities against the data source
//! and only then swaps the new arrangement in, so a rejected batch leaves the
//! display as it was.
use crate::config::TableConfig;
use crate::errors::{Frame, WidgetError};
use crate::types::{IndexPath, Row, RowId, Section, SectionId, Tree};
use crate::widget::TableWidget;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Every protocol call the widget received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetCall {
    ReloadData { sections: usize, rows: usize },
    BeginUpdates,
    DeleteSections(Vec<usize>),
    InsertSections(Vec<usize>),
    MoveSection { from: usize, to: usize },
    ReloadSections(Vec<usize>),
    DeleteRows(Vec<IndexPath>),
    InsertRows(Vec<IndexPath>),
    MoveRow { from: IndexPath, to: IndexPath },
    ReloadRows(Vec<IndexPath>),
    EndUpdates { committed: bool },
    ApplyConfig(TableConfig),
}

impl WidgetCall {
    /// Calls that change structure or content inside a batch.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            WidgetCall::ReloadData { .. }
                | WidgetCall::BeginUpdates
                | WidgetCall::EndUpdates { .. }
                | WidgetCall::ApplyConfig(_)
        )
    }
}

#[derive(Debug, Default)]
struct Batch {
    section_deletes: Vec<usize>,
    section_inserts: Vec<usize>,
    section_moves: Vec<(usize, usize)>,
    section_reloads: Vec<usize>,
    row_deletes: Vec<IndexPath>,
    row_inserts: Vec<IndexPath>,
    row_moves: Vec<(IndexPath, IndexPath)>,
    row_reloads: Vec<IndexPath>,
}

/// Where an entry of the rebuilt arrangement comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Inserted,
    FromOld(usize),
}

fn check_unique(scope: &str, indices: impl IntoIterator<Item = usize>) -> Result<(), WidgetError> {
    let mut seen = HashSet::new();
    for index in indices {
        if !seen.insert(index) {
            return Err(WidgetError::DuplicateIndex {
                scope: scope.to_string(),
                index,
            });
        }
    }
    Ok(())
}

fn check_range(scope: &str, frame: Frame, index: usize, len: usize) -> Result<(), WidgetError> {
    if index >= len {
        return Err(WidgetError::IndexOutOfRange {
            scope: scope.to_string(),
            frame,
            index,
            len,
        });
    }
    Ok(())
}

/// Rebuilds one ordered level from index operations.
fn rearrange(
    scope: &str,
    old_len: usize,
    deletes: &[usize],
    inserts: &[usize],
    moves: &[(usize, usize)],
    new_len: usize,
) -> Result<Vec<Slot>, WidgetError> {
    for &index in deletes {
        check_range(scope, Frame::Old, index, old_len)?;
    }
    check_unique(scope, deletes.iter().copied())?;

    let deleted: HashSet<usize> = deletes.iter().copied().collect();
    for &(from, _) in moves {
        check_range(scope, Frame::Old, from, old_len)?;
        if deleted.contains(&from) {
            return Err(WidgetError::DuplicateIndex {
                scope: format!("{scope} (moved and deleted)"),
                index: from,
            });
        }
    }
    check_unique(scope, moves.iter().map(|&(from, _)| from))?;

    let expected = old_len - deletes.len() + inserts.len();
    if expected != new_len {
        return Err(WidgetError::CountMismatch {
            scope: scope.to_string(),
            expected,
            actual: new_len,
        });
    }

    for index in inserts.iter().copied().chain(moves.iter().map(|&(_, to)| to)) {
        check_range(scope, Frame::New, index, new_len)?;
    }
    check_unique(scope, inserts.iter().copied().chain(moves.iter().map(|&(_, to)| to)))?;

    let mut slots: Vec<Option<Slot>> = vec![None; new_len];
    for &index in inserts {
        slots[index] = Some(Slot::Inserted);
    }
    let moved_from: HashSet<usize> = moves.iter().map(|&(from, _)| from).collect();
    for &(from, to) in moves {
        slots[to] = Some(Slot::FromOld(from));
    }

    let mut survivors = (0..old_len)
        .filter(|i| !deleted.contains(i) && !moved_from.contains(i))
        .map(Slot::FromOld);
    slots
        .into_iter()
        .map(|slot| slot.or_else(|| survivors.next()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| WidgetError::CountMismatch {
            scope: scope.to_string(),
            expected,
            actual: new_len,
        })
}

#[derive(Debug, Default)]
pub struct ModelWidget {
    displayed: Tree,
    config: TableConfig,
    selection: HashSet<(SectionId, RowId)>,
    batch: Option<Batch>,
    calls: Vec<WidgetCall>,
}

impl ModelWidget {
    pub fn new() -> Self {
        ModelWidget::default()
    }

    /// What the widget currently shows, as a tree.
    pub fn snapshot(&self) -> Tree {
        self.displayed.clone()
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn calls(&self) -> &[WidgetCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<WidgetCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn structural_calls(&self) -> Vec<&WidgetCall> {
        self.calls.iter().filter(|c| c.is_structural()).collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.batch.is_some()
    }

    /// Selects the row at `at`, replacing the selection unless multi-select
    /// is active for the current mode.
    pub fn select_row(&mut self, at: IndexPath) -> Result<(), WidgetError> {
        let key = self.key_at(at)?;
        if !self.config.multiselect_active() {
            self.selection.clear();
        }
        self.selection.insert(key);
        Ok(())
    }

    pub fn deselect_row(&mut self, at: IndexPath) -> Result<(), WidgetError> {
        let key = self.key_at(at)?;
        self.selection.remove(&key);
        Ok(())
    }

    /// Selected rows in display order.
    pub fn selected_rows(&self) -> Vec<IndexPath> {
        let mut out = Vec::new();
        for (s, section) in self.displayed.sections.iter().enumerate() {
            for (r, row) in section.rows.iter().enumerate() {
                if self.selection.contains(&(section.id.clone(), row.id.clone())) {
                    out.push(IndexPath::new(s, r));
                }
            }
        }
        out
    }

    /// The widget reordering a row on its own during an interactive drag.
    /// `to` is addressed after `from` has been removed.
    pub fn simulate_user_move(&mut self, from: IndexPath, to: IndexPath) -> Result<(), WidgetError> {
        let key = self.key_at(from)?;
        let sections = &mut self.displayed.sections;
        check_range("drag destination section", Frame::New, to.section, sections.len())?;
        let dest_len = sections[to.section].rows.len() - usize::from(from.section == to.section);
        if to.row > dest_len {
            return Err(WidgetError::IndexOutOfRange {
                scope: "drag destination row".into(),
                frame: Frame::New,
                index: to.row,
                len: dest_len + 1,
            });
        }
        let row = sections[from.section].rows.remove(from.row);
        let row_id = row.id.clone();
        sections[to.section].rows.insert(to.row, row);
        if self.selection.remove(&key) {
            let dest = self.displayed.sections[to.section].id.clone();
            self.selection.insert((dest, row_id));
        }
        Ok(())
    }

    fn key_at(&self, at: IndexPath) -> Result<(SectionId, RowId), WidgetError> {
        check_range("sections", Frame::Old, at.section, self.displayed.len())?;
        let section = &self.displayed.sections[at.section];
        check_range(&format!("section {} rows", at.section), Frame::Old, at.row, section.rows.len())?;
        Ok((section.id.clone(), section.rows[at.row].id.clone()))
    }

    fn queue(&mut self, call: WidgetCall, apply: impl FnOnce(&mut Batch)) {
        match self.batch.as_mut() {
            Some(batch) => apply(batch),
            None => warn!("ModelWidget: {:?} issued outside a batch, ignored", call),
        }
        self.calls.push(call);
    }

    fn commit(&self, batch: &Batch, data: &Tree) -> Result<Tree, WidgetError> {
        let old = &self.displayed.sections;
        let section_slots = rearrange(
            "sections",
            old.len(),
            &batch.section_deletes,
            &batch.section_inserts,
            &batch.section_moves,
            data.len(),
        )?;

        let old_to_new: HashMap<usize, usize> = section_slots
            .iter()
            .enumerate()
            .filter_map(|(new, slot)| match *slot {
                Slot::FromOld(old) => Some((old, new)),
                Slot::Inserted => None,
            })
            .collect();

        for &index in &batch.section_reloads {
            check_range("section reloads", Frame::Old, index, old.len())?;
            if !old_to_new.contains_key(&index) {
                return Err(WidgetError::InvalidSectionTarget {
                    scope: "reload of deleted section".into(),
                    index,
                });
            }
        }
        // Row deletes and reloads must sit in surviving sections, old frame.
        for at in batch.row_deletes.iter().chain(&batch.row_reloads) {
            if !old_to_new.contains_key(&at.section) {
                return Err(WidgetError::InvalidSectionTarget {
                    scope: "row update in deleted or unknown section".into(),
                    index: at.section,
                });
            }
            check_range(
                &format!("section {} rows", at.section),
                Frame::Old,
                at.row,
                old[at.section].rows.len(),
            )?;
        }
        for at in &batch.row_inserts {
            if !matches!(section_slots.get(at.section), Some(Slot::FromOld(_))) {
                return Err(WidgetError::InvalidSectionTarget {
                    scope: "row insert into inserted or unknown section".into(),
                    index: at.section,
                });
            }
        }
        for &(from, to) in &batch.row_moves {
            if old_to_new.get(&from.section) != Some(&to.section) {
                return Err(WidgetError::UnsupportedMove { from, to });
            }
        }

        let mut sections = Vec::with_capacity(data.len());
        for (s_new, slot) in section_slots.iter().enumerate() {
            let expected = &data.sections[s_new];
            let o = match *slot {
                Slot::Inserted => {
                    sections.push(expected.clone());
                    continue;
                }
                Slot::FromOld(o) => o,
            };
            let prior = &old[o];
            if prior.id != expected.id {
                return Err(WidgetError::IdentityMismatch {
                    scope: format!("section {s_new}"),
                    displayed: prior.id.to_string(),
                    expected: expected.id.to_string(),
                });
            }

            let scope = format!("section {o} rows");
            let deletes: Vec<usize> = batch
                .row_deletes
                .iter()
                .filter(|p| p.section == o)
                .map(|p| p.row)
                .collect();
            let inserts: Vec<usize> = batch
                .row_inserts
                .iter()
                .filter(|p| p.section == s_new)
                .map(|p| p.row)
                .collect();
            let moves: Vec<(usize, usize)> = batch
                .row_moves
                .iter()
                .filter(|(from, _)| from.section == o)
                .map(|(from, to)| (from.row, to.row))
                .collect();
            let reloads: HashSet<usize> = batch
                .row_reloads
                .iter()
                .filter(|p| p.section == o)
                .map(|p| p.row)
                .collect();
            let row_slots = rearrange(
                &scope,
                prior.rows.len(),
                &deletes,
                &inserts,
                &moves,
                expected.rows.len(),
            )?;

            let mut rows: Vec<Row> = Vec::with_capacity(row_slots.len());
            for (r_new, slot) in row_slots.into_iter().enumerate() {
                let source = &expected.rows[r_new];
                let row = match slot {
                    Slot::Inserted => source.clone(),
                    Slot::FromOld(r_old) => {
                        let shown = &prior.rows[r_old];
                        if shown.id != source.id {
                            return Err(WidgetError::IdentityMismatch {
                                scope: format!("row {}", IndexPath::new(s_new, r_new)),
                                displayed: shown.id.to_string(),
                                expected: source.id.to_string(),
                            });
                        }
                        if reloads.contains(&r_old) { source.clone() } else { shown.clone() }
                    }
                };
                rows.push(row);
            }

            let reload_section = batch.section_reloads.contains(&o);
            sections.push(Section {
                id: prior.id.clone(),
                header: if reload_section { expected.header.clone() } else { prior.header.clone() },
                footer: if reload_section { expected.footer.clone() } else { prior.footer.clone() },
                rows,
            });
        }

        Ok(Tree { sections })
    }

    fn prune_selection(&mut self) {
        let live: HashSet<(SectionId, RowId)> = self
            .displayed
            .sections
            .iter()
            .flat_map(|s| s.rows.iter().map(move |r| (s.id.clone(), r.id.clone())))
            .collect();
        self.selection.retain(|key| live.contains(key));
    }
}

impl TableWidget for ModelWidget {
    fn reload_data(&mut self, data: &Tree) {
        self.calls.push(WidgetCall::ReloadData {
            sections: data.len(),
            rows: data.row_count(),
        });
        self.displayed = data.clone();
        self.selection.clear();
    }

    fn begin_updates(&mut self) -> Result<(), WidgetError> {
        if self.batch.is_some() {
            return Err(WidgetError::NestedTransaction);
        }
        self.calls.push(WidgetCall::BeginUpdates);
        self.batch = Some(Batch::default());
        Ok(())
    }

    fn delete_sections(&mut self, indices: &[usize]) {
        self.queue(WidgetCall::DeleteSections(indices.to_vec()), |b| {
            b.section_deletes.extend_from_slice(indices)
        });
    }

    fn insert_sections(&mut self, indices: &[usize]) {
        self.queue(WidgetCall::InsertSections(indices.to_vec()), |b| {
            b.section_inserts.extend_from_slice(indices)
        });
    }

    fn move_section(&mut self, from: usize, to: usize) {
        self.queue(WidgetCall::MoveSection { from, to }, |b| b.section_moves.push((from, to)));
    }

    fn reload_sections(&mut self, indices: &[usize]) {
        self.queue(WidgetCall::ReloadSections(indices.to_vec()), |b| {
            b.section_reloads.extend_from_slice(indices)
        });
    }

    fn delete_rows(&mut self, paths: &[IndexPath]) {
        self.queue(WidgetCall::DeleteRows(paths.to_vec()), |b| b.row_deletes.extend_from_slice(paths));
    }

    fn insert_rows(&mut self, paths: &[IndexPath]) {
        self.queue(WidgetCall::InsertRows(paths.to_vec()), |b| b.row_inserts.extend_from_slice(paths));
    }

    fn move_row(&mut self, from: IndexPath, to: IndexPath) {
        self.queue(WidgetCall::MoveRow { from, to }, |b| b.row_moves.push((from, to)));
    }

    fn reload_rows(&mut self, paths: &[IndexPath]) {
        self.queue(WidgetCall::ReloadRows(paths.to_vec()), |b| b.row_reloads.extend_from_slice(paths));
    }

    fn end_updates(&mut self, data: &Tree) -> Result<(), WidgetError> {
        let Some(batch) = self.batch.take() else {
            return Err(WidgetError::NotInTransaction);
        };
        match self.commit(&batch, data) {
            Ok(next) => {
                debug!("ModelWidget: committed batch, {} sections displayed", next.len());
                self.displayed = next;
                self.prune_selection();
                self.calls.push(WidgetCall::EndUpdates { committed: true });
                Ok(())
            }
            Err(e) => {
                warn!("ModelWidget: batch rejected: {}", e);
                self.calls.push(WidgetCall::EndUpdates { committed: false });
                Err(e)
            }
        }
    }

    fn apply_config(&mut self, config: &TableConfig) {
        self.calls.push(WidgetCall::ApplyConfig(config.clone()));
        self.config = config.clone();
    }
}

//! Section/row tree data model and the diff plan operations derived from it
use crate::errors::ReconcilerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Stable identity of a row within its section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub String);

/// Stable identity of a section within a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub String);

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            /// Fresh identity for entries that have no natural key.
            pub fn generate() -> Self {
                $name(format!(concat!($prefix, "_{}"), Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_id!(RowId, "row");
string_id!(SectionId, "section");

fn default_true() -> bool {
    true
}

/// One list entry. `content` is the opaque rendering descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default = "default_true")]
    pub deletable: bool,
    #[serde(default = "default_true")]
    pub movable: bool,
}

impl Row {
    pub fn new(id: impl Into<RowId>, content: serde_json::Value) -> Self {
        Row {
            id: id.into(),
            content,
            deletable: true,
            movable: true,
        }
    }

    /// Row whose content is just its identity, handy for plain lists.
    pub fn plain(id: impl Into<RowId>) -> Self {
        let id = id.into();
        let content = serde_json::Value::String(id.0.clone());
        Row::new(id, content)
    }

    pub fn deletable(mut self, deletable: bool) -> Self {
        self.deletable = deletable;
        self
    }

    pub fn movable(mut self, movable: bool) -> Self {
        self.movable = movable;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<serde_json::Value>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Section {
    pub fn new(id: impl Into<SectionId>, rows: impl IntoIterator<Item = Row>) -> Self {
        Section {
            id: id.into(),
            header: None,
            footer: None,
            rows: rows.into_iter().collect(),
        }
    }

    pub fn with_header(mut self, header: serde_json::Value) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_footer(mut self, footer: serde_json::Value) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn row_index(&self, id: &RowId) -> Option<usize> {
        self.rows.iter().position(|r| &r.id == id)
    }

    /// Header and footer, the parts a section reload refreshes.
    pub(crate) fn same_decorations(&self, other: &Section) -> bool {
        self.header == other.header && self.footer == other.footer
    }
}

/// Ordered sequence of sections; the full desired display state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    pub sections: Vec<Section>,
}

impl Tree {
    pub fn new(sections: impl IntoIterator<Item = Section>) -> Self {
        Tree {
            sections: sections.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Tree::default()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn section_index(&self, id: &SectionId) -> Option<usize> {
        self.sections.iter().position(|s| &s.id == id)
    }

    pub fn row(&self, at: IndexPath) -> Option<&Row> {
        self.sections.get(at.section).and_then(|s| s.rows.get(at.row))
    }

    /// Rejects duplicate section identities and duplicate row identities
    /// within a section.
    pub fn validate(&self) -> Result<(), ReconcilerError> {
        let mut section_ids = HashSet::with_capacity(self.sections.len());
        for (s_idx, section) in self.sections.iter().enumerate() {
            if !section_ids.insert(&section.id) {
                return Err(ReconcilerError::MalformedTree {
                    details: format!("duplicate section id '{}' at index {}", section.id, s_idx),
                });
            }
            let mut row_ids = HashSet::with_capacity(section.rows.len());
            for (r_idx, row) in section.rows.iter().enumerate() {
                if !row_ids.insert(&row.id) {
                    return Err(ReconcilerError::MalformedTree {
                        details: format!(
                            "duplicate row id '{}' in section '{}' at {}",
                            row.id,
                            section.id,
                            IndexPath::new(s_idx, r_idx)
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<Section> for Tree {
    fn from_iter<I: IntoIterator<Item = Section>>(iter: I) -> Self {
        Tree::new(iter)
    }
}

/// Address of a row: section index, then row index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub fn new(section: usize, row: usize) -> Self {
        IndexPath { section, row }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.row)
    }
}

/// Operation kind, in the order a plan replays them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableOpKind {
    DeleteSection,
    InsertSection,
    MoveSection,
    ReloadSection,
    DeleteRow,
    InsertRow,
    MoveRow,
    ReloadRow,
}

impl fmt::Display for TableOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableOpKind::DeleteSection => "DELETE_SECTION",
            TableOpKind::InsertSection => "INSERT_SECTION",
            TableOpKind::MoveSection => "MOVE_SECTION",
            TableOpKind::ReloadSection => "RELOAD_SECTION",
            TableOpKind::DeleteRow => "DELETE_ROW",
            TableOpKind::InsertRow => "INSERT_ROW",
            TableOpKind::MoveRow => "MOVE_ROW",
            TableOpKind::ReloadRow => "RELOAD_ROW",
        };
        f.write_str(s)
    }
}

/// A structural operation. Deletes and reloads address the old
/// arrangement; inserts address the new one; moves go old -> new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableOp {
    DeleteSection { index: usize },
    InsertSection { index: usize },
    MoveSection { from: usize, to: usize },
    ReloadSection { index: usize },
    DeleteRow { at: IndexPath },
    InsertRow { at: IndexPath },
    MoveRow { from: IndexPath, to: IndexPath },
    ReloadRow { at: IndexPath },
}

impl TableOp {
    pub fn kind(&self) -> TableOpKind {
        match self {
            TableOp::DeleteSection { .. } => TableOpKind::DeleteSection,
            TableOp::InsertSection { .. } => TableOpKind::InsertSection,
            TableOp::MoveSection { .. } => TableOpKind::MoveSection,
            TableOp::ReloadSection { .. } => TableOpKind::ReloadSection,
            TableOp::DeleteRow { .. } => TableOpKind::DeleteRow,
            TableOp::InsertRow { .. } => TableOpKind::InsertRow,
            TableOp::MoveRow { .. } => TableOpKind::MoveRow,
            TableOp::ReloadRow { .. } => TableOpKind::ReloadRow,
        }
    }

    // Sort key within a phase; moves sort by destination.
    fn position(&self) -> IndexPath {
        match *self {
            TableOp::DeleteSection { index }
            | TableOp::InsertSection { index }
            | TableOp::ReloadSection { index } => IndexPath::new(index, 0),
            TableOp::MoveSection { to, .. } => IndexPath::new(to, 0),
            TableOp::DeleteRow { at } | TableOp::InsertRow { at } | TableOp::ReloadRow { at } => at,
            TableOp::MoveRow { to, .. } => to,
        }
    }
}

/// Transient set of operations turning one tree into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPlan {
    pub ops: Vec<TableOp>,
}

impl DiffPlan {
    pub fn new(mut ops: Vec<TableOp>) -> Self {
        ops.sort_by_key(|op| (op.kind(), op.position()));
        DiffPlan { ops }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn count(&self, kind: TableOpKind) -> usize {
        self.ops.iter().filter(|op| op.kind() == kind).count()
    }

    /// True when the plan only reorders: no inserts, deletes or reloads.
    pub fn is_pure_reorder(&self) -> bool {
        self.ops
            .iter()
            .all(|op| matches!(op.kind(), TableOpKind::MoveSection | TableOpKind::MoveRow))
    }

    pub fn section_deletes(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::DeleteSection { index } => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn section_inserts(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::InsertSection { index } => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn section_moves(&self) -> Vec<(usize, usize)> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::MoveSection { from, to } => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    pub fn section_reloads(&self) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::ReloadSection { index } => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn row_deletes(&self) -> Vec<IndexPath> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::DeleteRow { at } => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn row_inserts(&self) -> Vec<IndexPath> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::InsertRow { at } => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn row_moves(&self) -> Vec<(IndexPath, IndexPath)> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::MoveRow { from, to } => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    pub fn row_reloads(&self) -> Vec<IndexPath> {
        self.ops
            .iter()
            .filter_map(|op| match *op {
                TableOp::ReloadRow { at } => Some(at),
                _ => None,
            })
            .collect()
    }
}

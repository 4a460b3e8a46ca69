//! Table mode flags, passed through to the widget unchanged
use crate::errors::ReconcilerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStyle {
    #[default]
    Plain,
    Grouped,
    InsetGrouped,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub style: TableStyle,
    pub editing: bool,
    pub allows_multiple_selection: bool,
    pub allows_multiple_selection_during_editing: bool,
}

impl TableConfig {
    pub fn from_json(json: &str) -> Result<Self, ReconcilerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether selecting a row adds to the selection instead of replacing it
    /// in the current mode.
    pub fn multiselect_active(&self) -> bool {
        if self.editing {
            self.allows_multiple_selection_during_editing
        } else {
            self.allows_multiple_selection
        }
    }
}

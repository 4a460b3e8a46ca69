//! Declarative driver for sectioned list widgets.
//!
//! Callers hand a [`TableManager`] immutable [`Tree`]s of sections and rows.
//! The manager diffs each new tree against the one on screen by section and
//! row identity, replays the minimal set of deletes, inserts, moves and
//! reloads through the widget's batched-update protocol ([`TableWidget`]),
//! and commits the new tree only once the widget accepted the batch.
//!
//! ```
//! use table_reconciler::{ModelWidget, Row, Section, TableConfig, TableManager, TableOpKind, Tree};
//!
//! let mut manager = TableManager::new(ModelWidget::new(), TableConfig::default());
//! manager.initialize(Tree::new([Section::new("A", [Row::plain("r1"), Row::plain("r2")])]))?;
//!
//! let plan = manager.update_tree(Tree::new([Section::new("A", [Row::plain("r2"), Row::plain("r1")])]))?;
//! assert_eq!(plan.count(TableOpKind::MoveRow), 1);
//! assert_eq!(manager.widget().snapshot(), *manager.current_tree()?);
//! # Ok::<(), table_reconciler::ReconcilerError>(())
//! ```
pub mod config;
pub mod converters;
pub mod diff_engine;
pub mod errors;
pub mod manager;
pub mod model_widget;
pub mod types;
pub mod widget;

pub use config::{TableConfig, TableStyle};
pub use diff_engine::{diff, DiffEngine};
pub use errors::{Frame, ReconcilerError, WidgetError};
pub use manager::{RowProducer, SectionsObserver, TableManager};
pub use model_widget::{ModelWidget, WidgetCall};
pub use types::{DiffPlan, IndexPath, Row, RowId, Section, SectionId, TableOp, TableOpKind, Tree};
pub use widget::TableWidget;

//! Error taxonomy for reconciliation and for the widget update protocol
use thiserror::Error;

use crate::types::IndexPath;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Malformed tree: {details}")]
    MalformedTree { details: String },

    #[error("Widget rejected the update batch: {source}")]
    Reconciliation {
        #[source]
        source: WidgetError,
    },

    #[error("Insert gesture at {at} ignored: no row producer registered")]
    MisconfiguredGesture { at: IndexPath },

    #[error("Manager used before initialize()")]
    NotInitialized,

    #[error("Invalid position {at}: {details}")]
    InvalidPosition { at: IndexPath, details: String },

    #[error("Gesture not permitted on row '{row}': {details}")]
    GestureNotPermitted { row: String, details: String },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl From<WidgetError> for ReconcilerError {
    fn from(source: WidgetError) -> Self {
        ReconcilerError::Reconciliation { source }
    }
}

/// Which index frame an out-of-range index was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Old,
    New,
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frame::Old => write!(f, "old"),
            Frame::New => write!(f, "new"),
        }
    }
}

/// Failures reported by a widget's batched-update protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    #[error("operation issued outside begin_updates/end_updates")]
    NotInTransaction,

    #[error("begin_updates called while a batch is already open")]
    NestedTransaction,

    #[error("{scope}: index {index} out of range for {frame} frame of length {len}")]
    IndexOutOfRange {
        scope: String,
        frame: Frame,
        index: usize,
        len: usize,
    },

    #[error("{scope}: expected {expected} entries after update, data source has {actual}")]
    CountMismatch {
        scope: String,
        expected: usize,
        actual: usize,
    },

    #[error("{scope}: index {index} addressed more than once")]
    DuplicateIndex { scope: String, index: usize },

    #[error("{scope}: section {index}")]
    InvalidSectionTarget { scope: String, index: usize },

    #[error("unsupported move from {from} to {to}")]
    UnsupportedMove { from: IndexPath, to: IndexPath },

    #[error("{scope}: displayed '{displayed}' but data source has '{expected}'")]
    IdentityMismatch {
        scope: String,
        displayed: String,
        expected: String,
    },
}

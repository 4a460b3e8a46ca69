//! JSON import/export of section trees
use crate::errors::ReconcilerError;
use crate::types::Tree;

/// Parse and validate a tree from JSON text.
pub fn tree_from_json(json: &str) -> Result<Tree, ReconcilerError> {
    let tree: Tree = serde_json::from_str(json)?;
    tree.validate()?;
    Ok(tree)
}

/// Convert an already-parsed JSON value into a validated tree.
pub fn tree_from_value(value: serde_json::Value) -> Result<Tree, ReconcilerError> {
    let tree: Tree = serde_json::from_value(value)?;
    tree.validate()?;
    Ok(tree)
}

pub fn tree_to_json(tree: &Tree) -> Result<String, ReconcilerError> {
    Ok(serde_json::to_string(tree)?)
}

pub fn tree_to_value(tree: &Tree) -> Result<serde_json::Value, ReconcilerError> {
    Ok(serde_json::to_value(tree)?)
}

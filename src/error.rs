//! Error types.
//!
//! Stat lookups never fail: an inapplicable stat is `None`. Errors only
//! arise while loading data and building a [`Database`](crate::database::Database),
//! and while validating dependency graphs.

use crate::data::UnitId;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[String]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.join(" -> ")
}

/// Errors raised while loading game data or validating references.
///
/// # Examples
///
/// ```rust
/// use towerstat::EngineError;
///
/// let err = EngineError::UnknownParent { unit: 12, parent: 3 };
/// assert_eq!(err.to_string(), "Unit 12 references unknown parent unit 3");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// The JSON text could not be parsed into game data.
    #[error("Invalid game data: {0}")]
    Data(#[from] serde_json::Error),

    /// Two units share an id.
    #[error("Duplicate unit id: {0}")]
    DuplicateUnit(UnitId),

    /// A token names a parent that does not exist.
    #[error("Unit {unit} references unknown parent unit {parent}")]
    UnknownParent { unit: UnitId, parent: UnitId },

    /// A dependency cycle was detected.
    ///
    /// Contains the path of nodes involved, closing back on the first one.
    #[error("Cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<String> },
}

// Layout History Replay
//
// Re-derives a table's current layout from its stored history,
// checking every entry on the way.

use crate::layout::{LayoutId, ResolvedLayout};
use crate::meta::{LayoutHistory, MetaError};
use crate::validate::{LayoutValidator, ValidationError};

/// Errors that can occur during replay.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("layout history is empty")]
    EmptyHistory,

    #[error("history error: {0}")]
    History(#[from] MetaError),

    #[error("layout `{layout_id}` is invalid: {source}")]
    Invalid {
        layout_id: LayoutId,
        source: ValidationError,
    },
}

/// Replay `history` and return the layout it ends on.
///
/// Each entry must validate, reference its predecessor, and carry the
/// next layout id.
pub fn replay_layout_history(
    history: &[ResolvedLayout],
    validator: &LayoutValidator,
) -> Result<ResolvedLayout, ReplayError> {
    let mut log = LayoutHistory::new();

    for layout in history {
        validator
            .validate(&layout.to_document())
            .map_err(|source| ReplayError::Invalid {
                layout_id: layout.layout_id().clone(),
                source,
            })?;
        log.append(layout.clone())?;
    }

    log.current().cloned().ok_or(ReplayError::EmptyHistory)
}

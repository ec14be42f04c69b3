// Table State
//
// A table is either absent or present with a current layout. The state
// is never stored; it is read from the meta table on every operation.

use crate::layout::ResolvedLayout;
use crate::meta::{MetaError, MetaTable};

pub mod drift;
pub mod policy;
pub mod policy_config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    Absent,
    Present(ResolvedLayout),
}

/// Administrative operation applied to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Absent -> Present
    Create,
    /// Present -> Present
    Update,
    /// Present -> Absent
    Delete,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("table `{0}` not found")]
    TableNotFound(String),

    #[error("table `{0}` already exists")]
    AlreadyExists(String),
}

impl TableState {
    /// Read the state of `table` from the meta table.
    pub fn load<M: MetaTable + ?Sized>(meta: &M, table: &str) -> Result<Self, MetaError> {
        Ok(match meta.get_current_layout(table)? {
            Some(layout) => TableState::Present(layout),
            None => TableState::Absent,
        })
    }

    pub fn is_present(&self) -> bool {
        matches!(self, TableState::Present(_))
    }

    pub fn current_layout(&self) -> Option<&ResolvedLayout> {
        match self {
            TableState::Present(layout) => Some(layout),
            TableState::Absent => None,
        }
    }

    /// Check that `transition` is legal from this state.
    pub fn check(&self, table: &str, transition: Transition) -> Result<(), StateError> {
        use TableState::*;
        use Transition::*;

        match (self, transition) {
            (Absent, Create) | (Present(_), Update | Delete) => Ok(()),
            (Present(_), Create) => Err(StateError::AlreadyExists(table.to_string())),
            (Absent, Update | Delete) => Err(StateError::TableNotFound(table.to_string())),
        }
    }

    /// Current layout for an update or delete.
    pub fn into_current(
        self,
        table: &str,
        transition: Transition,
    ) -> Result<ResolvedLayout, StateError> {
        self.check(table, transition)?;
        match self {
            TableState::Present(layout) => Ok(layout),
            TableState::Absent => Err(StateError::TableNotFound(table.to_string())),
        }
    }
}

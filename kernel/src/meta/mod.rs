// Meta Table
//
// Per-table layout history. Histories are append-only: every layout
// names the layout it replaces, and an append only lands if that
// reference is still the current layout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::layout::{LayoutId, ResolvedLayout};
use crate::resolve::ConcurrencyError;

pub mod store;

pub use store::{InMemoryMetaTable, MetaSnapshot};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MetaError {
    #[error("table `{0}` not found in meta table")]
    TableNotFound(String),

    #[error(transparent)]
    Conflict(#[from] ConcurrencyError),

    #[error("layout `{actual}` of table `{table}` does not follow `{expected}`")]
    VersionGap {
        table: String,
        expected: LayoutId,
        actual: LayoutId,
    },

    #[error("meta table unavailable: {0}")]
    Unavailable(String),
}

/// Ordered layouts of one table, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutHistory {
    layouts: Vec<ResolvedLayout>,
}

impl LayoutHistory {
    pub fn new() -> Self {
        Self {
            layouts: Vec::new(),
        }
    }

    /// Append `layout` if it references the current layout and carries
    /// the next layout id.
    pub fn append(&mut self, layout: ResolvedLayout) -> Result<(), MetaError> {
        let current = self.current().map(|c| c.layout_id().clone());

        if layout.reference_layout_id() != current.as_ref() {
            return Err(ConcurrencyError {
                table: layout.name().to_string(),
                current,
                reference: layout.reference_layout_id().cloned(),
            }
            .into());
        }

        let expected = match &current {
            Some(id) => id
                .next()
                .ok_or_else(|| MetaError::VersionGap {
                    table: layout.name().to_string(),
                    expected: id.clone(),
                    actual: layout.layout_id().clone(),
                })?,
            None => LayoutId::initial(),
        };

        if layout.layout_id() != &expected {
            return Err(MetaError::VersionGap {
                table: layout.name().to_string(),
                expected,
                actual: layout.layout_id().clone(),
            });
        }

        self.layouts.push(layout);
        Ok(())
    }

    pub fn current(&self) -> Option<&ResolvedLayout> {
        self.layouts.last()
    }

    pub fn replay(&self) -> impl Iterator<Item = &ResolvedLayout> {
        self.layouts.iter()
    }

    pub fn as_slice(&self) -> &[ResolvedLayout] {
        &self.layouts
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

/// Metadata store holding the layout history of every table.
///
/// Properties required from implementations:
/// - appends are atomic per table
/// - an append lands only if its reference layout is the stored current
///   layout (compare and swap)
/// - stored layouts are never mutated
pub trait MetaTable: Send + Sync {
    /// Current layout of `table`, or `None` if the table is unknown.
    fn get_current_layout(&self, table: &str) -> Result<Option<ResolvedLayout>, MetaError>;

    fn append_layout(&self, table: &str, layout: ResolvedLayout) -> Result<(), MetaError>;

    /// Remove the whole history of `table`.
    fn delete_table_record(&self, table: &str) -> Result<(), MetaError>;

    fn list_tables(&self) -> Result<Vec<String>, MetaError>;

    /// Every layout of `table`, oldest first.
    fn layout_history(&self, table: &str) -> Result<Vec<ResolvedLayout>, MetaError>;
}

/// One meta table shared by several administrators.
impl<T: MetaTable + ?Sized> MetaTable for Arc<T> {
    fn get_current_layout(&self, table: &str) -> Result<Option<ResolvedLayout>, MetaError> {
        (**self).get_current_layout(table)
    }

    fn append_layout(&self, table: &str, layout: ResolvedLayout) -> Result<(), MetaError> {
        (**self).append_layout(table, layout)
    }

    fn delete_table_record(&self, table: &str) -> Result<(), MetaError> {
        (**self).delete_table_record(table)
    }

    fn list_tables(&self) -> Result<Vec<String>, MetaError> {
        (**self).list_tables()
    }

    fn layout_history(&self, table: &str) -> Result<Vec<ResolvedLayout>, MetaError> {
        (**self).layout_history(table)
    }
}

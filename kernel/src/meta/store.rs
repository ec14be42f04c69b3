// In-memory meta table.
//
// Each table's history sits behind its own lock. The outer map is only
// locked to find or add a table's entry, so appends to different tables
// never wait on each other. Within one table, the compare-and-swap in
// `LayoutHistory::append` decides the winner. A deleted table keeps an
// empty entry; an empty history reads as an absent table.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{LayoutHistory, MetaError, MetaTable};
use crate::layout::ResolvedLayout;

/// Serialized form of a meta table: table name to layout history.
pub type MetaSnapshot = BTreeMap<String, LayoutHistory>;

type Shard = Arc<Mutex<LayoutHistory>>;

#[derive(Debug, Default)]
pub struct InMemoryMetaTable {
    tables: RwLock<BTreeMap<String, Shard>>,
}

impl InMemoryMetaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load histories as they are, without re-checking them. Use
    /// `replay_layout_history` to verify loaded histories.
    pub fn from_snapshot(snapshot: MetaSnapshot) -> Self {
        let tables = snapshot
            .into_iter()
            .map(|(table, history)| (table, Arc::new(Mutex::new(history))))
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub fn snapshot(&self) -> MetaSnapshot {
        self.tables
            .read()
            .iter()
            .map(|(table, shard)| (table.clone(), shard.lock().clone()))
            .filter(|(_, history)| !history.is_empty())
            .collect()
    }

    fn shard(&self, table: &str) -> Option<Shard> {
        self.tables.read().get(table).cloned()
    }

    fn shard_or_insert(&self, table: &str) -> Shard {
        if let Some(shard) = self.shard(table) {
            return shard;
        }
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .clone()
    }
}

impl MetaTable for InMemoryMetaTable {
    fn get_current_layout(&self, table: &str) -> Result<Option<ResolvedLayout>, MetaError> {
        Ok(self
            .shard(table)
            .and_then(|shard| shard.lock().current().cloned()))
    }

    fn append_layout(&self, table: &str, layout: ResolvedLayout) -> Result<(), MetaError> {
        let layout_id = layout.layout_id().clone();
        self.shard_or_insert(table).lock().append(layout)?;
        debug!(table, %layout_id, "appended layout");
        Ok(())
    }

    fn delete_table_record(&self, table: &str) -> Result<(), MetaError> {
        let removed = match self.shard(table) {
            Some(shard) => mem::take(&mut *shard.lock()),
            None => LayoutHistory::new(),
        };
        if removed.is_empty() {
            return Err(MetaError::TableNotFound(table.to_string()));
        }
        debug!(table, layouts = removed.len(), "deleted layout history");
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<String>, MetaError> {
        Ok(self
            .tables
            .read()
            .iter()
            .filter(|(_, shard)| !shard.lock().is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn layout_history(&self, table: &str) -> Result<Vec<ResolvedLayout>, MetaError> {
        self.shard(table)
            .map(|shard| shard.lock().as_slice().to_vec())
            .filter(|history| !history.is_empty())
            .ok_or_else(|| MetaError::TableNotFound(table.to_string()))
    }
}

// In-memory storage engine.
//
// Stands in for the column store in tests and dry runs. Like a real
// engine's catalog it serialises its own calls; the lock is held for one
// call at a time and never across an administrator operation.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use super::{ColumnFamilyDescriptor, PhysicalStore, PhysicalTable, StorageError};
use crate::layout::diff::LayoutDiff;
use crate::layout::ResolvedLayout;

#[derive(Debug, Default)]
pub struct InMemoryPhysicalStore {
    tables: RwLock<BTreeMap<String, PhysicalTable>>,
}

impl InMemoryPhysicalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: BTreeMap<String, PhysicalTable>) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, PhysicalTable> {
        self.tables.read().clone()
    }
}

impl PhysicalStore for InMemoryPhysicalStore {
    fn create_physical_table(
        &self,
        table: &str,
        layout: &ResolvedLayout,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(StorageError::TableExists(table.to_string()));
        }
        let physical = PhysicalTable::from_layout(table, layout);
        debug!(
            table,
            table_uuid = %physical.table_uuid,
            column_families = physical.column_families.len(),
            "created physical table"
        );
        tables.insert(table.to_string(), physical);
        Ok(())
    }

    fn alter_physical_families(&self, table: &str, diff: &LayoutDiff) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let existing = tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;

        // Work on a copy so a failed step leaves the table as it was.
        let mut families = existing.column_families.clone();

        for name in &diff.removed_locality_groups {
            if families.remove(name).is_none() {
                return Err(StorageError::FamilyNotFound {
                    table: table.to_string(),
                    family: name.clone(),
                });
            }
        }
        for group in &diff.modified_locality_groups {
            match families.get_mut(&group.name) {
                Some(descriptor) => *descriptor = ColumnFamilyDescriptor::from(group),
                None => {
                    return Err(StorageError::FamilyNotFound {
                        table: table.to_string(),
                        family: group.name.clone(),
                    })
                }
            }
        }
        for group in &diff.added_locality_groups {
            if families.contains_key(&group.name) {
                return Err(StorageError::FamilyExists {
                    table: table.to_string(),
                    family: group.name.clone(),
                });
            }
            families.insert(group.name.clone(), ColumnFamilyDescriptor::from(group));
        }

        if let Some(physical) = tables.get_mut(table) {
            physical.column_families = families;
        }
        debug!(
            table,
            added = diff.added_locality_groups.len(),
            removed = diff.removed_locality_groups.len(),
            modified = diff.modified_locality_groups.len(),
            "altered column families"
        );
        Ok(())
    }

    fn delete_physical_table(&self, table: &str) -> Result<(), StorageError> {
        match self.tables.write().remove(table) {
            Some(_) => {
                debug!(table, "deleted physical table");
                Ok(())
            }
            None => Err(StorageError::TableNotFound(table.to_string())),
        }
    }

    fn describe_physical_table(&self, table: &str) -> Result<Option<PhysicalTable>, StorageError> {
        Ok(self.tables.read().get(table).cloned())
    }

    fn list_physical_tables(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.tables.read().keys().cloned().collect())
    }
}

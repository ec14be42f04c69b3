// Physical Store Adapters
//
// The storage engine side of a table. Each locality group of a layout
// becomes one engine column family; logical families are not visible
// to the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layout::diff::LayoutDiff;
use crate::layout::{Compression, LocalityGroup, MaxVersions, ResolvedLayout};

pub mod memory;

pub use memory::InMemoryPhysicalStore;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("physical table `{0}` already exists")]
    TableExists(String),

    #[error("physical table `{0}` not found")]
    TableNotFound(String),

    #[error("column family `{family}` already exists in `{table}`")]
    FamilyExists { table: String, family: String },

    #[error("column family `{family}` not found in `{table}`")]
    FamilyNotFound { table: String, family: String },

    #[error("storage engine failure: {0}")]
    Engine(String),
}

/// Engine-native settings of one column family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFamilyDescriptor {
    pub name: String,
    pub max_versions: MaxVersions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub in_memory: bool,
}

impl From<&LocalityGroup> for ColumnFamilyDescriptor {
    fn from(group: &LocalityGroup) -> Self {
        Self {
            name: group.name.clone(),
            max_versions: group.max_versions,
            ttl_seconds: group.ttl_seconds,
            compression: group.compression,
            in_memory: group.in_memory,
        }
    }
}

/// A table as the storage engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalTable {
    pub table_uuid: Uuid,
    pub name: String,
    pub column_families: BTreeMap<String, ColumnFamilyDescriptor>,
}

impl PhysicalTable {
    /// Physical shape of `layout`, under a fresh table identity.
    pub fn from_layout(name: &str, layout: &ResolvedLayout) -> Self {
        Self {
            table_uuid: Uuid::new_v4(),
            name: name.to_string(),
            column_families: layout
                .locality_groups()
                .iter()
                .map(|g| (g.name.clone(), ColumnFamilyDescriptor::from(g)))
                .collect(),
        }
    }

    pub fn column_family(&self, name: &str) -> Option<&ColumnFamilyDescriptor> {
        self.column_families.get(name)
    }
}

/// Storage engine operations needed to keep physical tables in line with
/// their layouts.
///
/// Calls may be slow and may fail independently of the meta table.
pub trait PhysicalStore: Send + Sync {
    fn create_physical_table(&self, table: &str, layout: &ResolvedLayout)
        -> Result<(), StorageError>;

    /// Apply the locality group changes of `diff`. Must leave the table
    /// untouched on failure.
    fn alter_physical_families(&self, table: &str, diff: &LayoutDiff) -> Result<(), StorageError>;

    fn delete_physical_table(&self, table: &str) -> Result<(), StorageError>;

    fn describe_physical_table(&self, table: &str) -> Result<Option<PhysicalTable>, StorageError>;

    fn list_physical_tables(&self) -> Result<Vec<String>, StorageError>;
}

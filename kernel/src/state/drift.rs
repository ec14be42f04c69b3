// Drift Detection & Classification
//
// Compares the layout recorded in the meta table with the table the
// storage engine actually holds, and classifies every difference by
// severity.

use serde::{Deserialize, Serialize};

use crate::adapters::{ColumnFamilyDescriptor, PhysicalTable};
use crate::layout::ResolvedLayout;

/// Severity of detected drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    /// Informational drift (no immediate risk).
    Info,

    /// The stores disagree but the table still serves its layout.
    Warning,

    /// Data written under the recorded layout is at risk.
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    MissingPhysicalTable,
    OrphanPhysicalTable,
    MissingColumnFamily,
    UnexpectedColumnFamily,
    PolicyMismatch,
    CorruptHistory,
}

impl DriftType {
    pub fn default_severity(&self) -> DriftSeverity {
        match self {
            DriftType::MissingPhysicalTable
            | DriftType::MissingColumnFamily
            | DriftType::CorruptHistory => DriftSeverity::Critical,
            DriftType::OrphanPhysicalTable
            | DriftType::UnexpectedColumnFamily
            | DriftType::PolicyMismatch => DriftSeverity::Warning,
        }
    }
}

/// A single drift finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftFinding {
    pub table: String,
    pub drift_type: DriftType,
    pub severity: DriftSeverity,
    pub message: String,
}

impl DriftFinding {
    pub fn new(table: &str, drift_type: DriftType, message: impl Into<String>) -> Self {
        Self {
            table: table.to_string(),
            severity: drift_type.default_severity(),
            drift_type,
            message: message.into(),
        }
    }
}

/// Full drift report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub findings: Vec<DriftFinding>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn highest_severity(&self) -> Option<DriftSeverity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a DriftFinding> + 'a {
        self.findings.iter().filter(move |f| f.table == table)
    }
}

/// Detect drift for one table. Either side may be missing.
pub fn detect_drift(
    table: &str,
    expected: Option<&ResolvedLayout>,
    actual: Option<&PhysicalTable>,
) -> Vec<DriftFinding> {
    let (expected, actual) = match (expected, actual) {
        (None, None) => return Vec::new(),
        (Some(layout), None) => {
            return vec![DriftFinding::new(
                table,
                DriftType::MissingPhysicalTable,
                format!(
                    "meta table holds layout `{}` but the storage engine has no table",
                    layout.layout_id()
                ),
            )]
        }
        (None, Some(physical)) => {
            return vec![DriftFinding::new(
                table,
                DriftType::OrphanPhysicalTable,
                format!(
                    "physical table {} has no meta table record",
                    physical.table_uuid
                ),
            )]
        }
        (Some(expected), Some(actual)) => (expected, actual),
    };

    let mut findings = Vec::new();

    for group in expected.locality_groups() {
        match actual.column_family(&group.name) {
            None => findings.push(DriftFinding::new(
                table,
                DriftType::MissingColumnFamily,
                format!("locality group `{}` has no column family", group.name),
            )),
            Some(descriptor) if descriptor != &ColumnFamilyDescriptor::from(group) => {
                findings.push(DriftFinding::new(
                    table,
                    DriftType::PolicyMismatch,
                    format!(
                        "column family `{}` does not match locality group in layout `{}`",
                        group.name,
                        expected.layout_id()
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    for name in actual.column_families.keys() {
        if expected.locality_group(name).is_none() {
            findings.push(DriftFinding::new(
                table,
                DriftType::UnexpectedColumnFamily,
                format!("column family `{name}` is not in layout `{}`", expected.layout_id()),
            ));
        }
    }

    findings
}

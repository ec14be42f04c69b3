// Reconciliation Audit
//
// Runs the full check in dry-run mode:
// meta history -> replay -> drift against physical store -> policy plan

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::adapters::{PhysicalStore, StorageError};
use crate::meta::{MetaError, MetaTable};
use crate::replay::replay_layout_history;
use crate::state::drift::{detect_drift, DriftFinding, DriftReport, DriftType};
use crate::state::policy::{evaluate_drift_policy, DecisionPlan};
use crate::state::policy_config::ReconcilePolicy;
use crate::validate::LayoutValidator;

/// Result of an audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub tables_checked: usize,
    pub drift_report: DriftReport,
    pub decision_plan: DecisionPlan,
}

/// Errors that stop an audit. Drift itself is reported, not raised.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("meta table error: {0}")]
    Meta(#[from] MetaError),

    #[error("storage engine error: {0}")]
    Storage(#[from] StorageError),
}

/// Compare every table known to either store.
///
/// This function is:
/// - read-only on both stores
/// - safe to run repeatedly
pub fn audit_tables<M, P>(
    meta: &M,
    physical: &P,
    validator: &LayoutValidator,
    policy: &ReconcilePolicy,
) -> Result<AuditReport, AuditError>
where
    M: MetaTable + ?Sized,
    P: PhysicalStore + ?Sized,
{
    let recorded: BTreeSet<String> = meta.list_tables()?.into_iter().collect();
    let mut tables = recorded.clone();
    tables.extend(physical.list_physical_tables()?);

    let mut findings = Vec::new();

    for table in &tables {
        let expected = if recorded.contains(table) {
            let history = meta.layout_history(table)?;
            match replay_layout_history(&history, validator) {
                Ok(layout) => Some(layout),
                Err(err) => {
                    findings.push(DriftFinding::new(
                        table,
                        DriftType::CorruptHistory,
                        err.to_string(),
                    ));
                    // Still compare against what readers are served.
                    history.last().cloned()
                }
            }
        } else {
            None
        };

        let actual = physical.describe_physical_table(table)?;
        findings.extend(detect_drift(table, expected.as_ref(), actual.as_ref()));
    }

    let drift_report = DriftReport { findings };
    if let Some(severity) = drift_report.highest_severity() {
        warn!(
            findings = drift_report.findings.len(),
            ?severity,
            "meta table and storage engine disagree"
        );
    } else {
        debug!(tables = tables.len(), "audit found no drift");
    }

    let decision_plan = evaluate_drift_policy(&drift_report, policy);

    Ok(AuditReport {
        tables_checked: tables.len(),
        drift_report,
        decision_plan,
    })
}

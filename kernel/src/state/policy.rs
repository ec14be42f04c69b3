// Policy-Driven Drift Handling (Dry-Run)
//
// Converts drift findings into intended repair actions without
// carrying any of them out.

use serde::{Deserialize, Serialize};

use crate::state::drift::{DriftReport, DriftSeverity, DriftType};
use crate::state::policy_config::ReconcilePolicy;

/// Intended action for a detected drift.
///
/// NOTE:
/// These actions are *not executed*; reconciliation is an operator task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntendedAction {
    /// Log only, no escalation.
    Observe,

    /// Notify operators.
    Alert,

    /// Bring the physical store back in line with the meta table.
    Repair,
}

/// A single policy decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    pub table: String,
    pub drift_type: DriftType,
    pub severity: DriftSeverity,
    pub action: IntendedAction,
    pub reason: String,
}

/// Output of policy evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecisionPlan {
    pub decisions: Vec<PolicyDecision>,
}

impl DecisionPlan {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn requires(&self, action: IntendedAction) -> bool {
        self.decisions.iter().any(|d| d.action == action)
    }
}

/// Map every finding to the action its severity calls for. Severities
/// without a rule are only observed.
pub fn evaluate_drift_policy(report: &DriftReport, policy: &ReconcilePolicy) -> DecisionPlan {
    let decisions = report
        .findings
        .iter()
        .map(|finding| {
            let (action, reason) = match policy.rule_for(finding.severity) {
                Some(rule) => (rule.action, rule.reason.clone()),
                None => (IntendedAction::Observe, "no rule for severity".to_string()),
            };
            PolicyDecision {
                table: finding.table.clone(),
                drift_type: finding.drift_type.clone(),
                severity: finding.severity,
                action,
                reason,
            }
        })
        .collect();

    DecisionPlan { decisions }
}

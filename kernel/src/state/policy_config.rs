// Reconcile Policy Configuration
//
// Configurable mapping from drift severity to intended action.

use serde::{Deserialize, Serialize};

use crate::state::drift::DriftSeverity;
use crate::state::policy::IntendedAction;

/// Policy configuration loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub severity: DriftSeverity,
    pub action: IntendedAction,
    pub reason: String,
}

impl ReconcilePolicy {
    /// Default built-in policy (used if no config is provided).
    pub fn default_policy() -> Self {
        Self {
            rules: vec![
                PolicyRule {
                    severity: DriftSeverity::Info,
                    action: IntendedAction::Observe,
                    reason: "informational drift".into(),
                },
                PolicyRule {
                    severity: DriftSeverity::Warning,
                    action: IntendedAction::Alert,
                    reason: "meta table and storage engine disagree".into(),
                },
                PolicyRule {
                    severity: DriftSeverity::Critical,
                    action: IntendedAction::Repair,
                    reason: "recorded layout is not backed by storage".into(),
                },
            ],
        }
    }

    /// First rule for `severity`.
    pub fn rule_for(&self, severity: DriftSeverity) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| r.severity == severity)
    }
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self::default_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_policy_json() {
        let json = r#"
        {
          "rules": [
            { "severity": "warning", "action": "repair", "reason": "strict mode" }
          ]
        }
        "#;

        let policy: ReconcilePolicy = serde_json::from_str(json).unwrap();
        let rule = policy.rule_for(DriftSeverity::Warning).unwrap();
        assert_eq!(rule.action, IntendedAction::Repair);
        assert!(policy.rule_for(DriftSeverity::Critical).is_none());
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ScenarioEvent;

/// Alert severity as reported in run results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Critical,
}

/// Evidence of one detection: one loitering entity, or one matched
/// drop/pickup pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: Uuid,
    /// Identifier of the rule variant that fired, e.g. "loiter_v1".
    pub rule_triggered: String,
    pub severity: Severity,
    /// Opaque records describing what matched.
    pub evidence: Vec<serde_json::Value>,
}

impl Alert {
    pub fn new(rule_triggered: &str, severity: Severity, evidence: serde_json::Value) -> Self {
        Alert {
            alert_id: Uuid::new_v4(),
            rule_triggered: rule_triggered.to_string(),
            severity,
            evidence: vec![evidence],
        }
    }
}

/// The outcome of one evaluation call. Immutable once built; the caller
/// owns it and decides whether to persist it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub detected: bool,
    pub alerts: Vec<Alert>,
    /// Normalized echo of the evaluated input.
    pub event_sequence: Vec<ScenarioEvent>,
}

//! Rule evaluation engine.
//!
//! `evaluate` is a pure, synchronous computation: it normalizes the event
//! sequence against a single base time, applies every check the rule
//! carries, and returns the aggregated result. All working state is local
//! to one call, so any number of evaluations may run concurrently.

mod handoff;
mod loiter;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::{RunResult, ScenarioEvent};
use crate::rules::RuleSpec;

/// An event with its offset resolved against the call's base time.
/// Events missing `entity_id` or `action` never make it here.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NormalizedEvent {
    pub entity_id: String,
    pub entity_type: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub coords: Option<GeoPoint>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Evaluate an event sequence against a rule.
///
/// Both checks run independently when the rule carries both parameter
/// sets; `detected` is true iff any check produced an alert. An empty
/// sequence is valid input and yields no alerts. Matching follows input
/// order throughout, never a sort over timestamps.
pub fn evaluate(events: &[ScenarioEvent], rule: &RuleSpec) -> RunResult {
    let base = Utc::now();
    let normalized = normalize(events, base);

    let mut alerts = Vec::new();
    if let Some(ref params) = rule.loiter {
        alerts.extend(loiter::check(&normalized, params));
    }
    if let Some(ref params) = rule.handoff {
        alerts.extend(handoff::check(&normalized, params, rule.handoff_rule_id()));
    }

    log::info!(
        "evaluated {} event(s) against rule '{}': {} alert(s)",
        events.len(),
        rule.rule_id,
        alerts.len()
    );

    RunResult {
        run_id: Uuid::new_v4().simple().to_string(),
        detected: !alerts.is_empty(),
        alerts,
        event_sequence: events.to_vec(),
    }
}

/// Resolve offsets against one base time and exclude incomplete events.
/// The base value itself is irrelevant; only deltas between events matter,
/// and every event in one call shares the same base.
fn normalize(events: &[ScenarioEvent], base: DateTime<Utc>) -> Vec<NormalizedEvent> {
    events
        .iter()
        .filter(|event| event.is_complete())
        .map(|event| NormalizedEvent {
            entity_id: event.entity_id.clone(),
            entity_type: event.entity_type.clone(),
            action: event.action.clone(),
            timestamp: base + Duration::seconds(event.timestamp_offset_seconds),
            coords: event.coords,
            metadata: event.metadata.clone(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::TimeZone;
    use serde_json::json;

    /// Fixed base so normalized timestamps are stable across test runs.
    fn test_base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    pub(crate) fn normalized(
        entity_id: &str,
        action: &str,
        offset_seconds: i64,
        coords: Option<[f64; 2]>,
    ) -> NormalizedEvent {
        NormalizedEvent {
            entity_id: entity_id.to_string(),
            entity_type: "unknown".to_string(),
            action: action.to_string(),
            timestamp: test_base() + Duration::seconds(offset_seconds),
            coords: coords.map(GeoPoint::from),
            metadata: BTreeMap::new(),
        }
    }

    pub(crate) fn normalized_at(
        entity_id: &str,
        action: &str,
        offset_seconds: i64,
        coords: [f64; 2],
    ) -> NormalizedEvent {
        normalized(entity_id, action, offset_seconds, Some(coords))
    }

    fn event(
        entity_id: &str,
        action: &str,
        offset_seconds: i64,
        coords: Option<[f64; 2]>,
    ) -> ScenarioEvent {
        ScenarioEvent {
            entity_id: entity_id.to_string(),
            entity_type: "unknown".to_string(),
            action: action.to_string(),
            timestamp_offset_seconds: offset_seconds,
            coords: coords.map(GeoPoint::from),
            metadata: BTreeMap::new(),
        }
    }

    fn loiter_rule(threshold_seconds: i64) -> RuleSpec {
        RuleSpec::from_json(&json!({
            "rule_id": "loiter_v1",
            "type": "loiter",
            "threshold_seconds": threshold_seconds
        }))
    }

    fn handoff_rule(window: i64, radius: f64) -> RuleSpec {
        RuleSpec::from_json(&json!({
            "rule_id": "stateful_handoff_v2",
            "temporal_window_seconds": window,
            "coords_radius_meters": radius
        }))
    }

    #[test]
    fn test_loiter_scenario_detected() {
        // Entity "P" at offsets 0, 15, ..., 90: a 90 second span
        let events: Vec<ScenarioEvent> =
            (0..7).map(|i| event("P", "move", i * 15, None)).collect();

        let result = evaluate(&events, &loiter_rule(60));
        assert!(result.detected);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].severity, Severity::High);
        assert_eq!(result.alerts[0].evidence[0]["duration"], 90.0);
        assert_eq!(result.event_sequence.len(), 7);
    }

    #[test]
    fn test_loiter_scenario_below_threshold() {
        let events = vec![event("P", "enter", 0, None), event("P", "leave", 30, None)];
        let result = evaluate(&events, &loiter_rule(60));
        assert!(!result.detected);
        assert!(result.alerts.is_empty());
    }

    #[test]
    fn test_handoff_scenario_detected() {
        let events = vec![
            event("DRONE_1", "drop", 45, Some([31.6201, 74.8701])),
            event("PERSON_1", "pickup", 230, Some([31.62013, 74.87012])),
        ];
        let result = evaluate(&events, &handoff_rule(600, 10.0));
        assert!(result.detected);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].severity, Severity::Critical);
        assert_eq!(result.alerts[0].rule_triggered, "stateful_handoff_v2");
        assert_eq!(
            result.alerts[0].evidence[0]["pickup"]["entity_id"],
            "PERSON_1"
        );
    }

    #[test]
    fn test_handoff_scenario_pickup_too_far() {
        // Pickup ~500 m away from the drop
        let events = vec![
            event("DRONE_1", "drop", 45, Some([31.6201, 74.8701])),
            event("PERSON_1", "pickup", 230, Some([31.6246, 74.8701])),
        ];
        let result = evaluate(&events, &handoff_rule(600, 10.0));
        assert!(!result.detected);
    }

    #[test]
    fn test_empty_sequence() {
        let result = evaluate(&[], &loiter_rule(60));
        assert!(!result.detected);
        assert!(result.alerts.is_empty());
        assert!(result.event_sequence.is_empty());
    }

    #[test]
    fn test_incomplete_events_are_excluded_but_echoed() {
        let events = vec![
            event("", "move", 0, None),
            event("P", "", 10, None),
            event("P", "move", 0, None),
            event("P", "move", 90, None),
        ];
        let result = evaluate(&events, &loiter_rule(60));
        // The two incomplete events play no part in the span
        assert!(result.detected);
        assert_eq!(result.alerts[0].evidence[0]["duration"], 90.0);
        // but the full input is echoed back
        assert_eq!(result.event_sequence.len(), 4);
    }

    #[test]
    fn test_dual_variant_rule_runs_both_checks() {
        let rule = RuleSpec::from_json(&json!({
            "rule_id": "stateful_handoff_v2",
            "type": "loiter",
            "threshold_seconds": 60,
            "temporal_window_seconds": 600,
            "coords_radius_meters": 10.0
        }));
        let events = vec![
            event("DRONE_1", "drop", 0, Some([31.6201, 74.8701])),
            event("DRONE_1", "leave", 100, Some([31.6205, 74.8705])),
            event("PERSON_1", "pickup", 200, Some([31.6201, 74.8701])),
        ];
        let result = evaluate(&events, &rule);
        // One loiter alert for the drone, one handoff alert for the pair
        assert_eq!(result.alerts.len(), 2);
        assert_eq!(result.alerts[0].severity, Severity::High);
        assert_eq!(result.alerts[1].severity, Severity::Critical);
    }

    #[test]
    fn test_unrecognized_rule_shape_yields_no_detections() {
        let rule = RuleSpec::from_json(&json!({"rule_id": "mystery"}));
        let events = vec![event("P", "move", 0, None), event("P", "move", 500, None)];
        let result = evaluate(&events, &rule);
        assert!(!result.detected);
    }

    #[test]
    fn test_run_ids_are_fresh_per_call() {
        let a = evaluate(&[], &loiter_rule(60));
        let b = evaluate(&[], &loiter_rule(60));
        assert_ne!(a.run_id, b.run_id);
    }
}

//! Loiter check: flags entities that stay observable longer than a
//! configured threshold.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_json::json;

use super::NormalizedEvent;
use crate::models::{Alert, Severity};
use crate::rules::{LoiterParams, LOITER_RULE_ID};

/// Emit one alert per entity whose first-to-last span exceeds the
/// threshold.
///
/// First and last are measured strictly by sequence position, not by a
/// sort over timestamps. The comparison is strict: a span equal to the
/// threshold does not trigger, and an entity with a single event has a
/// span of zero.
pub(crate) fn check(events: &[NormalizedEvent], params: &LoiterParams) -> Vec<Alert> {
    // Track span per entity, preserving first-seen order so alert order
    // is deterministic.
    let mut seen_order: Vec<&str> = Vec::new();
    let mut spans: HashMap<&str, (i64, i64)> = HashMap::new();

    for event in events {
        let ts = event.timestamp.timestamp();
        match spans.entry(event.entity_id.as_str()) {
            Entry::Vacant(entry) => {
                seen_order.push(event.entity_id.as_str());
                entry.insert((ts, ts));
            }
            Entry::Occupied(mut entry) => {
                entry.get_mut().1 = ts;
            }
        }
    }

    let mut alerts = Vec::new();
    for entity_id in seen_order {
        let (first, last) = spans[entity_id];
        let duration = last - first;
        if duration > params.threshold_seconds {
            log::debug!("entity {} loitered for {}s", entity_id, duration);
            alerts.push(Alert::new(
                LOITER_RULE_ID,
                Severity::High,
                json!({ "entity_id": entity_id, "duration": duration as f64 }),
            ));
        }
    }
    alerts
}

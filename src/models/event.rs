use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// One observed action by one entity within a scenario.
///
/// Field names are the stable JSON contract shared with scenario producers.
/// `entity_id` and `action` default to empty strings when absent so that a
/// sloppy payload still parses; the engine excludes such events from every
/// check rather than aborting the evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioEvent {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
    #[serde(default)]
    pub action: String,
    /// Offset from an arbitrary scenario start. Only deltas between events
    /// are meaningful.
    #[serde(default, alias = "timestamp")]
    pub timestamp_offset_seconds: i64,
    /// `[latitude, longitude]` in decimal degrees. Optional; checks that
    /// need a distance skip events without coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<GeoPoint>,
    /// Opaque producer-supplied keys (e.g. a package id linking a drop to
    /// its pickup). Echoed in evidence, never interpreted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_entity_type() -> String {
    "unknown".to_string()
}

impl ScenarioEvent {
    /// True when the event carries the fields every check requires.
    pub fn is_complete(&self) -> bool {
        !self.entity_id.is_empty() && !self.action.is_empty()
    }
}

/// An ordered event sequence belonging to one scenario. Order is the order
/// of evaluation, which is not guaranteed to be timestamp-sorted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    #[serde(default)]
    pub description: String,
    pub event_sequence: Vec<ScenarioEvent>,
}

//! Synthetic relay-attack scenario generator.
//!
//! Produces the canonical attack pattern: a drone enters, drops a package
//! and leaves; a person later enters, picks the package up and leaves.
//! Delays and coordinate jitter are configurable so generated variants
//! land on both sides of a rule's window and radius.

use std::collections::BTreeMap;

use rand::Rng;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::{Scenario, ScenarioEvent};

/// Knobs for the generated relay-attack pattern.
#[derive(Debug, Clone)]
pub struct RelayAttackParams {
    /// Center of the zone the attack takes place in.
    pub zone_center: GeoPoint,
    /// Seconds between the drone entering and dropping the package.
    pub drop_delay_seconds: i64,
    /// Seconds between scenario start and the person entering.
    pub pickup_delay_seconds: i64,
    /// Uniform jitter applied to every coordinate, in decimal degrees.
    pub noise_degrees: f64,
}

impl Default for RelayAttackParams {
    fn default() -> Self {
        RelayAttackParams {
            zone_center: GeoPoint::new(31.62, 74.87),
            drop_delay_seconds: 45,
            pickup_delay_seconds: 180,
            noise_degrees: 0.0002,
        }
    }
}

fn short_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &id[..8])
}

/// Generate one relay-attack scenario using the thread-local RNG.
pub fn generate_relay_attack(params: &RelayAttackParams) -> Scenario {
    generate_relay_attack_with_rng(params, &mut rand::thread_rng())
}

/// Generate one relay-attack scenario with a caller-supplied RNG, so tests
/// can pin the jitter.
pub fn generate_relay_attack_with_rng<R: Rng + ?Sized>(
    params: &RelayAttackParams,
    rng: &mut R,
) -> Scenario {
    let lat = params.zone_center.latitude;
    let lon = params.zone_center.longitude;
    let drone = short_id("DRONE");
    let person = short_id("PERSON");
    let package = short_id("PKG");

    let mut jitter = |base: f64| -> f64 {
        if params.noise_degrees > 0.0 {
            base + rng.gen_range(-params.noise_degrees..=params.noise_degrees)
        } else {
            base
        }
    };

    let mut package_metadata = BTreeMap::new();
    package_metadata.insert(
        "package_id".to_string(),
        serde_json::Value::String(package),
    );

    let drop_at = params.drop_delay_seconds;
    let enter_at = params.pickup_delay_seconds;

    let event_sequence = vec![
        ScenarioEvent {
            entity_id: drone.clone(),
            entity_type: "drone".to_string(),
            action: "enter".to_string(),
            timestamp_offset_seconds: 0,
            coords: Some(GeoPoint::new(jitter(lat + 0.0001), jitter(lon + 0.0001))),
            metadata: BTreeMap::new(),
        },
        ScenarioEvent {
            entity_id: drone.clone(),
            entity_type: "drone".to_string(),
            action: "drop".to_string(),
            timestamp_offset_seconds: drop_at,
            coords: Some(GeoPoint::new(jitter(lat + 0.00012), jitter(lon + 0.00009))),
            metadata: package_metadata.clone(),
        },
        ScenarioEvent {
            entity_id: drone,
            entity_type: "drone".to_string(),
            action: "leave".to_string(),
            timestamp_offset_seconds: drop_at + 1,
            coords: Some(GeoPoint::new(jitter(lat + 0.0005), jitter(lon + 0.0005))),
            metadata: BTreeMap::new(),
        },
        ScenarioEvent {
            entity_id: person.clone(),
            entity_type: "person".to_string(),
            action: "enter".to_string(),
            timestamp_offset_seconds: enter_at,
            coords: Some(GeoPoint::new(jitter(lat + 0.00015), jitter(lon + 0.00011))),
            metadata: BTreeMap::new(),
        },
        ScenarioEvent {
            entity_id: person.clone(),
            entity_type: "person".to_string(),
            action: "pickup".to_string(),
            timestamp_offset_seconds: enter_at + 50,
            coords: Some(GeoPoint::new(jitter(lat + 0.00013), jitter(lon + 0.0001))),
            metadata: package_metadata,
        },
        ScenarioEvent {
            entity_id: person,
            entity_type: "person".to_string(),
            action: "leave".to_string(),
            timestamp_offset_seconds: enter_at + 101,
            coords: Some(GeoPoint::new(jitter(lat + 0.0006), jitter(lon + 0.0006))),
            metadata: BTreeMap::new(),
        },
    ];

    Scenario {
        scenario_id: short_id("SCN"),
        description: "relay attack generated".to_string(),
        event_sequence,
    }
}

/// Generate `n` independent variants of the default attack.
pub fn generate_variants(n: usize, params: &RelayAttackParams) -> Vec<Scenario> {
    (0..n).map(|_| generate_relay_attack(params)).collect()
}

//! Stateful handoff check: a `drop` followed by a spatiotemporally close
//! `pickup` by another entity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::NormalizedEvent;
use crate::geo::{haversine_meters, GeoPoint};
use crate::models::{Alert, Severity};
use crate::rules::HandoffParams;

/// A drop waiting for a matching pickup. Local to one evaluation; anything
/// left unmatched at the end of the sequence is discarded without signal.
#[derive(Debug, Clone, Serialize)]
struct PendingDrop {
    timestamp: DateTime<Utc>,
    coords: Option<GeoPoint>,
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Run the handoff check over the sequence in original order.
///
/// Each `drop` appends a pending entry; each `pickup` scans the pending
/// list front to back and consumes the first entry within both the time
/// window and the radius (both bounds inclusive). First-fit, not best-fit:
/// when several pending drops qualify, the earliest-inserted one wins. A
/// drop is consumed by at most one pickup. Events without coordinates are
/// skipped silently.
pub(crate) fn check(
    events: &[NormalizedEvent],
    params: &HandoffParams,
    rule_id: &str,
) -> Vec<Alert> {
    let mut pending: Vec<PendingDrop> = Vec::new();
    let mut alerts = Vec::new();

    for event in events {
        match event.action.as_str() {
            "drop" => {
                pending.push(PendingDrop {
                    timestamp: event.timestamp,
                    coords: event.coords,
                    metadata: event.metadata.clone(),
                });
            }
            "pickup" => {
                let pickup_coords = match event.coords {
                    Some(coords) => coords,
                    None => continue,
                };

                let matched = pending.iter().position(|p| {
                    let drop_coords = match p.coords {
                        Some(coords) => coords,
                        None => return false,
                    };
                    let elapsed = (event.timestamp - p.timestamp).num_seconds();
                    elapsed <= params.temporal_window_seconds
                        && haversine_meters(pickup_coords, drop_coords)
                            <= params.coords_radius_meters
                });

                if let Some(index) = matched {
                    let drop = pending.remove(index);
                    log::debug!(
                        "handoff match: drop at {} picked up by {}",
                        drop.timestamp,
                        event.entity_id
                    );
                    alerts.push(Alert::new(
                        rule_id,
                        Severity::Critical,
                        json!({ "drop": drop, "pickup": event }),
                    ));
                }
            }
            _ => {}
        }
    }

    alerts
}

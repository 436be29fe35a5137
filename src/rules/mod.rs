//! Detection rule configuration.
//!
//! Rules arrive as free-form JSON (persisted rows, applied patches, or
//! externally generated suggestions). They are parsed once, here, into an
//! explicit tagged structure so the engine never branches on input shape.

use serde_json::Value;

/// Rule id reported by loiter alerts.
pub const LOITER_RULE_ID: &str = "loiter_v1";
/// Loiter threshold used when a rule is missing or malformed.
pub const DEFAULT_LOITER_THRESHOLD_SECONDS: i64 = 60;

/// Constants for the fallback handoff rule, used when a patch payload is
/// absent or unparsable.
pub const FALLBACK_HANDOFF_RULE_ID: &str = "stateful_handoff_v2";
pub const FALLBACK_HANDOFF_WINDOW_SECONDS: i64 = 600;
pub const FALLBACK_HANDOFF_RADIUS_METERS: f64 = 10.0;

/// Parameters for the loiter check.
#[derive(Debug, Clone, PartialEq)]
pub struct LoiterParams {
    pub threshold_seconds: i64,
    /// Carried from the rule payload but not used in distance checks.
    pub zone: Option<String>,
}

/// Parameters for the stateful handoff check.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffParams {
    pub temporal_window_seconds: i64,
    pub coords_radius_meters: f64,
}

/// A parsed detection rule. Both variants may be present at once; the
/// engine evaluates each independently and unions the alerts.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub rule_id: String,
    pub loiter: Option<LoiterParams>,
    pub handoff: Option<HandoffParams>,
}

impl RuleSpec {
    /// The built-in rule substituted for a missing or malformed rule.
    pub fn default_loiter() -> Self {
        RuleSpec {
            rule_id: LOITER_RULE_ID.to_string(),
            loiter: Some(LoiterParams {
                threshold_seconds: DEFAULT_LOITER_THRESHOLD_SECONDS,
                zone: None,
            }),
            handoff: None,
        }
    }

    /// The fallback handoff rule applied when a patch carries no usable
    /// payload.
    pub fn fallback_handoff() -> Self {
        RuleSpec {
            rule_id: FALLBACK_HANDOFF_RULE_ID.to_string(),
            loiter: None,
            handoff: Some(HandoffParams {
                temporal_window_seconds: FALLBACK_HANDOFF_WINDOW_SECONDS,
                coords_radius_meters: FALLBACK_HANDOFF_RADIUS_METERS,
            }),
        }
    }

    /// Parse a raw rule payload.
    ///
    /// A payload that is not a JSON object is treated as malformed and
    /// replaced by the default loiter rule. An object that matches neither
    /// variant parses to a rule with no checks: it yields no detections,
    /// never an error.
    pub fn from_json(raw: &Value) -> Self {
        let obj = match raw.as_object() {
            Some(obj) => obj,
            None => {
                log::warn!("malformed rule payload, substituting default loiter rule");
                return Self::default_loiter();
            }
        };

        let rule_id = obj
            .get("rule_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let loiter = if obj.get("type").and_then(Value::as_str) == Some("loiter") {
            let threshold_seconds = obj
                .get("threshold_seconds")
                .or_else(|| obj.get("loiter_time_seconds"))
                .and_then(Value::as_i64)
                .unwrap_or(DEFAULT_LOITER_THRESHOLD_SECONDS);
            let zone = obj
                .get("zone")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(LoiterParams {
                threshold_seconds,
                zone,
            })
        } else {
            None
        };

        let is_handoff =
            rule_id == FALLBACK_HANDOFF_RULE_ID || obj.contains_key("required_event_sequence");
        let handoff = if is_handoff {
            Some(HandoffParams {
                temporal_window_seconds: obj
                    .get("temporal_window_seconds")
                    .and_then(Value::as_i64)
                    .unwrap_or(FALLBACK_HANDOFF_WINDOW_SECONDS),
                coords_radius_meters: obj
                    .get("coords_radius_meters")
                    .and_then(Value::as_f64)
                    .unwrap_or(FALLBACK_HANDOFF_RADIUS_METERS),
            })
        } else {
            None
        };

        RuleSpec {
            rule_id,
            loiter,
            handoff,
        }
    }

    /// Parse an optional rule payload; `None` gets the default loiter rule.
    pub fn from_json_opt(raw: Option<&Value>) -> Self {
        match raw {
            Some(value) => Self::from_json(value),
            None => Self::default_loiter(),
        }
    }

    /// Rule id to report on handoff alerts.
    pub fn handoff_rule_id(&self) -> &str {
        if self.rule_id.is_empty() {
            FALLBACK_HANDOFF_RULE_ID
        } else {
            &self.rule_id
        }
    }
}

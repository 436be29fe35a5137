pub mod config;
pub mod engine;
pub mod geo;
pub mod models;
pub mod output;
pub mod persistence;
pub mod rules;
pub mod scenario;

// Re-export commonly used types
pub use engine::evaluate;
pub use geo::{haversine_meters, GeoPoint};
pub use models::{Alert, RunResult, Scenario, ScenarioEvent, Severity};
pub use persistence::{Patch, SimStore, SqliteSimStore, StoredRule};
pub use rules::RuleSpec;
pub use scenario::{generate_relay_attack, RelayAttackParams};

//! Persistence for rules, patches, simulation runs and event logs.
//!
//! The engine itself never touches storage; callers persist run results
//! through this module. Every operation returns a `Result` so a failed
//! write is a visible outcome, never a silently discarded one.

pub mod sqlite_store;

pub use sqlite_store::SqliteSimStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RunResult, ScenarioEvent};

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),
}

/// A detection rule as persisted: the raw JSON payload plus bookkeeping.
/// Exactly one rule is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRule {
    pub rule_id: String,
    pub rule_json: serde_json::Value,
    pub description: String,
    pub active: bool,
}

/// A patch payload as received from an external rule source (an operator,
/// or an AI suggestion). Applying a patch records it and activates the
/// rule it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub patch_id: String,
    pub patch_json: serde_json::Value,
    #[serde(default)]
    pub description: String,
}

/// Trait for simulation storage backends.
pub trait SimStore: Send + Sync {
    // =====================
    // Rules
    // =====================

    /// Insert a rule. A rule inserted as active deactivates all others.
    fn insert_rule(&self, rule: &StoredRule) -> Result<(), PersistenceError>;

    /// Get the currently active rule, if any.
    fn active_rule(&self) -> Result<Option<StoredRule>, PersistenceError>;

    /// List all stored rules, most recent first.
    fn list_rules(&self) -> Result<Vec<StoredRule>, PersistenceError>;

    /// Record a patch and activate the rule it carries.
    ///
    /// Deactivates every existing rule, then inserts the patch payload as
    /// the new active rule. Returns the activated rule.
    fn apply_patch(&self, patch: &Patch) -> Result<StoredRule, PersistenceError>;

    // =====================
    // Runs and event logs
    // =====================

    /// Store a run result summary under the rule that produced it.
    fn store_run(&self, result: &RunResult, rule_id: &str) -> Result<(), PersistenceError>;

    /// Get the most recent run results, newest first.
    fn recent_runs(&self, limit: usize) -> Result<Vec<RunResult>, PersistenceError>;

    /// Store the raw events evaluated in a run, preserving their order.
    fn store_events(&self, run_id: &str, events: &[ScenarioEvent])
        -> Result<(), PersistenceError>;

    /// Load the events of a run in their original order.
    fn events_for_run(&self, run_id: &str) -> Result<Vec<ScenarioEvent>, PersistenceError>;

    // =====================
    // Maintenance
    // =====================

    /// Clear all data (useful for testing)
    fn clear_all(&self) -> Result<(), PersistenceError>;
}

//! SQLite implementation of the SimStore trait

use super::{Patch, PersistenceError, SimStore, StoredRule};
use crate::geo::GeoPoint;
use crate::models::{RunResult, ScenarioEvent};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-based simulation storage
///
/// Stores rules, applied patches, run results and raw event logs so a
/// rule's history of catches and misses survives process restarts.
pub struct SqliteSimStore {
    conn: Mutex<Connection>,
}

impl SqliteSimStore {
    /// Create a new SQLite store at the specified path
    ///
    /// Creates the database file and initializes the schema if it doesn't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteSimStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteSimStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn parse_json(raw: &str) -> Result<serde_json::Value, PersistenceError> {
        serde_json::from_str(raw)
            .map_err(|e| PersistenceError::InvalidData(format!("Invalid JSON column: {}", e)))
    }
}

impl SimStore for SqliteSimStore {
    fn insert_rule(&self, rule: &StoredRule) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        if rule.active {
            conn.execute("UPDATE rules SET active = 0", [])?;
        }
        conn.execute(
            "INSERT OR REPLACE INTO rules (rule_id, rule_json, description, active)
             VALUES (?, ?, ?, ?)",
            params![
                rule.rule_id,
                serde_json::to_string(&rule.rule_json)?,
                rule.description,
                rule.active as i64
            ],
        )?;
        Ok(())
    }

    fn active_rule(&self) -> Result<Option<StoredRule>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT rule_id, rule_json, description FROM rules
             WHERE active = 1 ORDER BY id DESC LIMIT 1",
        )?;

        let result = stmt.query_row([], |row| {
            let rule_id: String = row.get(0)?;
            let rule_json: String = row.get(1)?;
            let description: String = row.get(2)?;
            Ok((rule_id, rule_json, description))
        });

        match result {
            Ok((rule_id, rule_json, description)) => Ok(Some(StoredRule {
                rule_id,
                rule_json: Self::parse_json(&rule_json)?,
                description,
                active: true,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_rules(&self) -> Result<Vec<StoredRule>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT rule_id, rule_json, description, active FROM rules ORDER BY id DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let rule_id: String = row.get(0)?;
                let rule_json: String = row.get(1)?;
                let description: String = row.get(2)?;
                let active: i64 = row.get(3)?;
                Ok((rule_id, rule_json, description, active))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rules = Vec::with_capacity(rows.len());
        for (rule_id, rule_json, description, active) in rows {
            rules.push(StoredRule {
                rule_id,
                rule_json: Self::parse_json(&rule_json)?,
                description,
                active: active != 0,
            });
        }
        Ok(rules)
    }

    fn apply_patch(&self, patch: &Patch) -> Result<StoredRule, PersistenceError> {
        let rule_id = patch
            .patch_json
            .get("rule_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&patch.patch_id)
            .to_string();

        {
            let conn = self.conn.lock().unwrap();
            let tx_json = serde_json::to_string(&patch.patch_json)?;
            conn.execute(
                "INSERT OR REPLACE INTO patches (patch_id, patch_json, description)
                 VALUES (?, ?, ?)",
                params![patch.patch_id, tx_json, patch.description],
            )?;
            conn.execute("UPDATE rules SET active = 0", [])?;
            conn.execute(
                "INSERT OR REPLACE INTO rules (rule_id, rule_json, description, active)
                 VALUES (?, ?, ?, 1)",
                params![rule_id, tx_json, patch.description],
            )?;
        }

        Ok(StoredRule {
            rule_id,
            rule_json: patch.patch_json.clone(),
            description: patch.description.clone(),
            active: true,
        })
    }

    fn store_run(&self, result: &RunResult, rule_id: &str) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO simulation_runs (run_id, rule_id, result_summary) VALUES (?, ?, ?)",
            params![result.run_id, rule_id, serde_json::to_string(result)?],
        )?;
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<RunResult>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT result_summary FROM simulation_runs ORDER BY id DESC LIMIT ?",
        )?;

        let summaries = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut runs = Vec::with_capacity(summaries.len());
        for summary in summaries {
            runs.push(serde_json::from_str(&summary).map_err(|e| {
                PersistenceError::InvalidData(format!("Invalid run summary: {}", e))
            })?);
        }
        Ok(runs)
    }

    fn store_events(
        &self,
        run_id: &str,
        events: &[ScenarioEvent],
    ) -> Result<(), PersistenceError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (index, event) in events.iter().enumerate() {
            let coords = match event.coords {
                Some(point) => Some(serde_json::to_string(&point)?),
                None => None,
            };
            tx.execute(
                "INSERT INTO event_logs
                 (run_id, event_index, entity_id, entity_type, action,
                  timestamp_offset_seconds, coords, metadata)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    run_id,
                    index as i64,
                    event.entity_id,
                    event.entity_type,
                    event.action,
                    event.timestamp_offset_seconds,
                    coords,
                    serde_json::to_string(&event.metadata)?
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn events_for_run(&self, run_id: &str) -> Result<Vec<ScenarioEvent>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT entity_id, entity_type, action, timestamp_offset_seconds, coords, metadata
             FROM event_logs WHERE run_id = ? ORDER BY event_index ASC",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                let entity_id: String = row.get(0)?;
                let entity_type: String = row.get(1)?;
                let action: String = row.get(2)?;
                let offset: i64 = row.get(3)?;
                let coords: Option<String> = row.get(4)?;
                let metadata: String = row.get(5)?;
                Ok((entity_id, entity_type, action, offset, coords, metadata))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (entity_id, entity_type, action, offset, coords, metadata) in rows {
            let coords: Option<GeoPoint> = match coords {
                Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                    PersistenceError::InvalidData(format!("Invalid coords column: {}", e))
                })?),
                None => None,
            };
            events.push(ScenarioEvent {
                entity_id,
                entity_type,
                action,
                timestamp_offset_seconds: offset,
                coords,
                metadata: serde_json::from_str(&metadata).map_err(|e| {
                    PersistenceError::InvalidData(format!("Invalid metadata column: {}", e))
                })?,
            });
        }
        Ok(events)
    }

    fn clear_all(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM rules;
             DELETE FROM patches;
             DELETE FROM simulation_runs;
             DELETE FROM event_logs;",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_store() -> SqliteSimStore {
        SqliteSimStore::in_memory().expect("Failed to create in-memory store")
    }

    fn loiter_rule(rule_id: &str, active: bool) -> StoredRule {
        StoredRule {
            rule_id: rule_id.to_string(),
            rule_json: json!({"type": "loiter", "threshold_seconds": 60}),
            description: "test rule".to_string(),
            active,
        }
    }

    #[test]
    fn test_active_rule_roundtrip() {
        let store = create_test_store();
        assert!(store.active_rule().unwrap().is_none());

        store.insert_rule(&loiter_rule("loiter_v1", true)).unwrap();

        let active = store.active_rule().unwrap().unwrap();
        assert_eq!(active.rule_id, "loiter_v1");
        assert_eq!(active.rule_json["type"], "loiter");
    }

    #[test]
    fn test_active_rule_is_exclusive() {
        let store = create_test_store();
        store.insert_rule(&loiter_rule("first", true)).unwrap();
        store.insert_rule(&loiter_rule("second", true)).unwrap();

        let active = store.active_rule().unwrap().unwrap();
        assert_eq!(active.rule_id, "second");

        let rules = store.list_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.iter().filter(|r| r.active).count(), 1);
    }

    #[test]
    fn test_apply_patch_activates_new_rule() {
        let store = create_test_store();
        store.insert_rule(&loiter_rule("loiter_v1", true)).unwrap();

        let patch = Patch {
            patch_id: "patch_1".to_string(),
            patch_json: json!({
                "rule_id": "stateful_handoff_v2",
                "temporal_window_seconds": 600,
                "coords_radius_meters": 10.0
            }),
            description: "handoff patch".to_string(),
        };
        let activated = store.apply_patch(&patch).unwrap();
        assert_eq!(activated.rule_id, "stateful_handoff_v2");

        let active = store.active_rule().unwrap().unwrap();
        assert_eq!(active.rule_id, "stateful_handoff_v2");
        assert_eq!(active.rule_json["temporal_window_seconds"], 600);
    }

    #[test]
    fn test_apply_patch_without_rule_id_uses_patch_id() {
        let store = create_test_store();
        let patch = Patch {
            patch_id: "patch_9".to_string(),
            patch_json: json!({"type": "loiter", "threshold_seconds": 30}),
            description: String::new(),
        };
        let activated = store.apply_patch(&patch).unwrap();
        assert_eq!(activated.rule_id, "patch_9");
    }

    #[test]
    fn test_run_roundtrip() {
        let store = create_test_store();
        let result = RunResult {
            run_id: "run_1".to_string(),
            detected: true,
            alerts: vec![],
            event_sequence: vec![],
        };

        store.store_run(&result, "loiter_v1").unwrap();

        let runs = store.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "run_1");
        assert!(runs[0].detected);
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let store = create_test_store();
        for i in 0..3 {
            let result = RunResult {
                run_id: format!("run_{}", i),
                detected: false,
                alerts: vec![],
                event_sequence: vec![],
            };
            store.store_run(&result, "loiter_v1").unwrap();
        }

        let runs = store.recent_runs(2).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "run_2");
        assert_eq!(runs[1].run_id, "run_1");
    }

    #[test]
    fn test_event_log_roundtrip() {
        let store = create_test_store();
        let events: Vec<ScenarioEvent> = serde_json::from_value(json!([
            {
                "entity_id": "DRONE_1",
                "entity_type": "drone",
                "action": "drop",
                "timestamp_offset_seconds": 45,
                "coords": [31.6201, 74.8701],
                "metadata": {"package_id": "PKG_1"}
            },
            {
                "entity_id": "PERSON_1",
                "entity_type": "person",
                "action": "pickup",
                "timestamp_offset_seconds": 230
            }
        ]))
        .unwrap();

        store.store_events("run_1", &events).unwrap();

        let loaded = store.events_for_run("run_1").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].entity_id, "DRONE_1");
        assert_eq!(loaded[0].coords.unwrap().latitude, 31.6201);
        assert_eq!(loaded[0].metadata["package_id"], "PKG_1");
        assert!(loaded[1].coords.is_none());
    }

    #[test]
    fn test_clear_all() {
        let store = create_test_store();
        store.insert_rule(&loiter_rule("loiter_v1", true)).unwrap();
        store
            .store_run(
                &RunResult {
                    run_id: "run_1".to_string(),
                    detected: false,
                    alerts: vec![],
                    event_sequence: vec![],
                },
                "loiter_v1",
            )
            .unwrap();

        store.clear_all().unwrap();

        assert!(store.active_rule().unwrap().is_none());
        assert!(store.recent_runs(10).unwrap().is_empty());
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relaysim.db");

        {
            let store = SqliteSimStore::new(&path).unwrap();
            store.insert_rule(&loiter_rule("loiter_v1", true)).unwrap();
        }

        // Reopen: the rule survives the restart
        let store = SqliteSimStore::new(&path).unwrap();
        assert!(store.active_rule().unwrap().is_some());
    }
}

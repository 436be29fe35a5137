use std::path::PathBuf;
use structopt::StructOpt;
use uuid::Uuid;

use relaysim::config::Config;
use relaysim::engine::evaluate;
use relaysim::models::Scenario;
use relaysim::output::{OutputFormat, OutputHandler};
use relaysim::persistence::{Patch, SimStore, SqliteSimStore, StoredRule};
use relaysim::rules::{
    RuleSpec, FALLBACK_HANDOFF_RADIUS_METERS, FALLBACK_HANDOFF_RULE_ID,
    FALLBACK_HANDOFF_WINDOW_SECONDS, LOITER_RULE_ID,
};
use relaysim::scenario::generate_relay_attack;

/// Relay-attack simulator command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "relaysim", about = "Relay-attack simulator CLI")]
pub enum Cli {
    /// Run a simulation against the active rule
    Run {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Path to a scenario JSON file; a relay attack is generated when omitted
        #[structopt(short, long)]
        scenario: Option<PathBuf>,
    },
    /// Seed a rule and make it active
    SeedRule {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Path to a rule JSON file; the default loiter rule when omitted
        #[structopt(short, long)]
        file: Option<PathBuf>,
    },
    /// Apply a patch payload as the new active rule
    ApplyPatch {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Path to a patch JSON file; the fallback handoff rule when omitted
        #[structopt(short, long)]
        file: Option<PathBuf>,
    },
    /// Show the active rule
    Rule {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Show recent simulation runs
    Logs {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Number of runs to show
        #[structopt(short, long, default_value = "20")]
        limit: usize,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Run { config, scenario } => run_simulation(&config, scenario.as_deref())?,
        Cli::SeedRule { config, file } => seed_rule(&config, file.as_deref())?,
        Cli::ApplyPatch { config, file } => apply_patch(&config, file.as_deref())?,
        Cli::Rule { config } => {
            let store = open_store(&config)?;
            match store.active_rule()? {
                Some(rule) => {
                    println!("{}: {}", rule.rule_id, serde_json::to_string_pretty(&rule.rule_json)?)
                }
                None => println!("No active rule"),
            }
        }
        Cli::Logs { config, limit } => {
            let store = open_store(&config)?;
            let runs = store.recent_runs(limit)?;
            println!("{} run(s):", runs.len());
            for run in runs {
                println!(
                    "  [{}] detected: {}, {} alert(s)",
                    run.run_id,
                    run.detected,
                    run.alerts.len()
                );
            }
        }
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
    }

    Ok(())
}

fn load_config(path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Config::from_file(path)
    } else {
        log::warn!("Config file not found, using defaults");
        Ok(Config::default())
    }
}

fn open_store(config_path: &PathBuf) -> Result<SqliteSimStore, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    Ok(SqliteSimStore::new(&config.storage.db_path)?)
}

fn run_simulation(
    config_path: &PathBuf,
    scenario_path: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = SqliteSimStore::new(&config.storage.db_path)?;

    // Scenario payloads are validated here, once, at the boundary
    let scenario: Scenario = match scenario_path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)
                .map_err(|e| format!("Invalid scenario payload: {}", e))?
        }
        None => {
            let generated = generate_relay_attack(&config.generator.params());
            log::info!("Generated scenario {}", generated.scenario_id);
            generated
        }
    };

    let active = match store.active_rule()? {
        Some(rule) => rule,
        None => {
            let default = default_loiter_rule(&config);
            log::info!("No active rule, seeding '{}'", default.rule_id);
            store.insert_rule(&default)?;
            default
        }
    };

    let rule = RuleSpec::from_json(&active.rule_json);
    let result = evaluate(&scenario.event_sequence, &rule);

    store.store_run(&result, &active.rule_id)?;
    store.store_events(&result.run_id, &scenario.event_sequence)?;

    let format: OutputFormat = config.output.format.parse()?;
    let mut output = OutputHandler::new(format, config.output.file_path.clone())?;
    output.write_result(&result)?;
    output.flush()?;

    if result.detected {
        log::warn!(
            "ATTACK DETECTED: rule '{}' produced {} alert(s) for run {}",
            active.rule_id,
            result.alerts.len(),
            result.run_id
        );
    } else {
        log::info!("Attack went undetected by rule '{}'", active.rule_id);
    }

    Ok(())
}

fn default_loiter_rule(config: &Config) -> StoredRule {
    StoredRule {
        rule_id: LOITER_RULE_ID.to_string(),
        rule_json: serde_json::json!({
            "type": "loiter",
            "threshold_seconds": config.engine.default_loiter_threshold_seconds,
            "zone": "Z"
        }),
        description: "Default loiter rule".to_string(),
        active: true,
    }
}

fn seed_rule(
    config_path: &PathBuf,
    file: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = SqliteSimStore::new(&config.storage.db_path)?;

    let rule = match file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            let rule_json: serde_json::Value =
                serde_json::from_str(&contents).map_err(|e| format!("Invalid rule JSON: {}", e))?;
            let rule_id = rule_json
                .get("rule_id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("rule_{}", short_hex()));
            StoredRule {
                rule_id,
                rule_json,
                description: "Seeded rule".to_string(),
                active: true,
            }
        }
        None => default_loiter_rule(&config),
    };

    store.insert_rule(&rule)?;
    println!("Active rule: {}", rule.rule_id);
    Ok(())
}

fn apply_patch(
    config_path: &PathBuf,
    file: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = SqliteSimStore::new(&config.storage.db_path)?;

    // Patch payloads come from an external rule source (an operator, or an
    // AI suggestion). An absent or unparsable payload falls back to the
    // built-in handoff rule.
    let patch_json = match file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            match serde_json::from_str(&contents) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Unparsable patch payload ({}), using fallback handoff rule", e);
                    fallback_handoff_json()
                }
            }
        }
        None => fallback_handoff_json(),
    };

    let patch = Patch {
        patch_id: format!("patch_{}", short_hex()),
        patch_json,
        description: "Applied patch".to_string(),
    };

    let activated = store.apply_patch(&patch)?;
    println!("Active rule: {}", activated.rule_id);
    Ok(())
}

fn fallback_handoff_json() -> serde_json::Value {
    serde_json::json!({
        "rule_id": FALLBACK_HANDOFF_RULE_ID,
        "temporal_window_seconds": FALLBACK_HANDOFF_WINDOW_SECONDS,
        "coords_radius_meters": FALLBACK_HANDOFF_RADIUS_METERS
    })
}

fn short_hex() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

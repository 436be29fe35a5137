use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::geo::GeoPoint;
use crate::rules::DEFAULT_LOITER_THRESHOLD_SECONDS;
use crate::scenario::RelayAttackParams;

/// Configuration for the relaysim CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scenario generator configuration
    pub generator: GeneratorConfig,
    /// Engine defaults
    pub engine: EngineConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Output configuration
    pub output: OutputConfig,
}

/// Scenario generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Latitude of the zone center
    pub zone_latitude: f64,
    /// Longitude of the zone center
    pub zone_longitude: f64,
    /// Seconds between the drone entering and dropping
    pub drop_delay_seconds: i64,
    /// Seconds between scenario start and the person entering
    pub pickup_delay_seconds: i64,
    /// Coordinate jitter in decimal degrees
    pub noise_degrees: f64,
}

impl GeneratorConfig {
    pub fn params(&self) -> RelayAttackParams {
        RelayAttackParams {
            zone_center: GeoPoint::new(self.zone_latitude, self.zone_longitude),
            drop_delay_seconds: self.drop_delay_seconds,
            pickup_delay_seconds: self.pickup_delay_seconds,
            noise_degrees: self.noise_degrees,
        }
    }
}

/// Engine defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Loiter threshold seeded when no rule is stored yet
    pub default_loiter_threshold_seconds: i64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database
    pub db_path: PathBuf,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl", or "console"
    pub format: String,
    /// Output file path (if format is not "console")
    pub file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let params = RelayAttackParams::default();
        Config {
            generator: GeneratorConfig {
                zone_latitude: params.zone_center.latitude,
                zone_longitude: params.zone_center.longitude,
                drop_delay_seconds: params.drop_delay_seconds,
                pickup_delay_seconds: params.pickup_delay_seconds,
                noise_degrees: params.noise_degrees,
            },
            engine: EngineConfig {
                default_loiter_threshold_seconds: DEFAULT_LOITER_THRESHOLD_SECONDS,
            },
            storage: StorageConfig {
                db_path: PathBuf::from("relaysim.db"),
            },
            output: OutputConfig {
                format: "console".to_string(),
                file_path: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

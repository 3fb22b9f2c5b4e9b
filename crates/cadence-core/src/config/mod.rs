//! Configuration system for cadence.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CadenceError, CadenceResult};

/// Largest accepted reference-timezone offset, in minutes.
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Largest accepted `max_interval_days` (about a thousand years).
const INTERVAL_CEILING_DAYS: u32 = 365_000;

/// Memory model parameters.
///
/// Stability multipliers apply per grade bucket; difficulty deltas are added
/// before clamping to [1, 10].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub fail_factor: f32,
    pub hard_factor: f32,
    pub good_factor: f32,
    pub easy_factor: f32,
    pub fail_difficulty_delta: f32,
    pub hard_difficulty_delta: f32,
    pub good_difficulty_delta: f32,
    pub easy_difficulty_delta: f32,
    /// Floor applied to every computed stability, in days.
    pub min_stability: f32,
    /// Ceiling on stability and on the scheduled interval, in days.
    pub max_interval_days: u32,
    /// Power-law forgetting-curve decay.
    pub decay: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            fail_factor: 0.5,
            hard_factor: 1.2,
            good_factor: 1.5,
            easy_factor: 2.5,
            fail_difficulty_delta: 2.0,
            hard_difficulty_delta: 0.5,
            good_difficulty_delta: 0.0,
            easy_difficulty_delta: -1.0,
            min_stability: 0.01,
            max_interval_days: 36500,
            decay: fsrs::FSRS6_DEFAULT_DECAY,
        }
    }
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite database path (ignored by the memory backend).
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let cadence_dir = dirs::home_dir()
            .map(|h| h.join(".cadence"))
            .unwrap_or_else(|| PathBuf::from(".cadence"));

        Self {
            backend: StorageBackend::Sqlite,
            db_path: cadence_dir.join("mastery.db"),
        }
    }
}

/// Main scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Memory model parameters.
    pub model: ModelParams,
    /// Stability assigned to newly scheduled items, in days.
    pub initial_stability: f32,
    /// Difficulty assigned to newly scheduled items.
    pub initial_difficulty: f32,
    /// Reps required before a passing review promotes an item to `Review`.
    pub min_reps_for_review: u32,
    /// Stability above which an item counts as mastered.
    pub mastered_stability_days: f32,
    /// Learner reference timezone for calendar-day statistics.
    pub utc_offset_minutes: i32,
    /// Storage configuration.
    pub storage: StorageConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            model: ModelParams::default(),
            initial_stability: 2.0,
            initial_difficulty: 5.0,
            min_reps_for_review: 2,
            mastered_stability_days: 30.0,
            utc_offset_minutes: 0,
            storage: StorageConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> CadenceResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CadenceError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let ext = path.extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| CadenceError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| CadenceError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| CadenceError::Configuration(e.to_string()))?,
            _ => {
                return Err(CadenceError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> CadenceResult<Self> {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var("CADENCE_STORAGE") {
            config.storage.backend = match backend.to_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "sqlite" => StorageBackend::Sqlite,
                other => {
                    return Err(CadenceError::Configuration(format!(
                        "unknown storage backend '{}'",
                        other
                    )))
                }
            };
        }

        if let Ok(path) = std::env::var("CADENCE_DB_PATH") {
            config.storage.db_path = PathBuf::from(path);
        }

        if let Ok(offset) = std::env::var("CADENCE_UTC_OFFSET_MINUTES") {
            config.utc_offset_minutes = offset.parse().map_err(|_| {
                CadenceError::Configuration(format!("invalid CADENCE_UTC_OFFSET_MINUTES '{}'", offset))
            })?;
        }

        if let Ok(reps) = std::env::var("CADENCE_MIN_REPS_FOR_REVIEW") {
            config.min_reps_for_review = reps.parse().map_err(|_| {
                CadenceError::Configuration(format!("invalid CADENCE_MIN_REPS_FOR_REVIEW '{}'", reps))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Check that every parameter keeps the item invariants reachable.
    pub fn validate(&self) -> CadenceResult<()> {
        let m = &self.model;
        let factors = [
            ("fail_factor", m.fail_factor),
            ("hard_factor", m.hard_factor),
            ("good_factor", m.good_factor),
            ("easy_factor", m.easy_factor),
            ("min_stability", m.min_stability),
            ("decay", m.decay),
            ("initial_stability", self.initial_stability),
        ];
        for (name, value) in factors {
            if !(value.is_finite() && value > 0.0) {
                return Err(CadenceError::Configuration(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if !(1..=INTERVAL_CEILING_DAYS).contains(&m.max_interval_days) {
            return Err(CadenceError::Configuration(format!(
                "max_interval_days must be within [1, {}], got {}",
                INTERVAL_CEILING_DAYS, m.max_interval_days
            )));
        }
        if m.min_stability > m.max_interval_days as f32 {
            return Err(CadenceError::Configuration(format!(
                "min_stability {} exceeds max_interval_days {}",
                m.min_stability, m.max_interval_days
            )));
        }

        if !(1.0..=10.0).contains(&self.initial_difficulty) {
            return Err(CadenceError::Configuration(format!(
                "initial_difficulty must be within [1, 10], got {}",
                self.initial_difficulty
            )));
        }

        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(CadenceError::Configuration(format!(
                "utc_offset_minutes must be within +/-{}, got {}",
                MAX_UTC_OFFSET_MINUTES, self.utc_offset_minutes
            )));
        }

        Ok(())
    }

    /// The learner reference timezone.
    pub fn timezone(&self) -> CadenceResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            CadenceError::Configuration(format!(
                "invalid utc_offset_minutes {}",
                self.utc_offset_minutes
            ))
        })
    }
}

/// Builder for SchedulerConfig.
#[derive(Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Set memory model parameters.
    pub fn model(mut self, model: ModelParams) -> Self {
        self.config.model = model;
        self
    }

    /// Set defaults for newly scheduled items.
    pub fn initial_state(mut self, stability: f32, difficulty: f32) -> Self {
        self.config.initial_stability = stability;
        self.config.initial_difficulty = difficulty;
        self
    }

    /// Set the reps required before promotion to `Review`.
    pub fn min_reps_for_review(mut self, reps: u32) -> Self {
        self.config.min_reps_for_review = reps;
        self
    }

    /// Set the mastered stability threshold.
    pub fn mastered_stability_days(mut self, days: f32) -> Self {
        self.config.mastered_stability_days = days;
        self
    }

    /// Set the learner reference timezone.
    pub fn utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.config.utc_offset_minutes = minutes;
        self
    }

    /// Use the in-memory backend.
    pub fn in_memory(mut self) -> Self {
        self.config.storage.backend = StorageBackend::Memory;
        self
    }

    /// Use a SQLite database at `path`.
    pub fn sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage = StorageConfig {
            backend: StorageBackend::Sqlite,
            db_path: path.into(),
        };
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> CadenceResult<SchedulerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.easy_factor, 2.5);
        assert_eq!(config.min_reps_for_review, 2);
        assert!(config.storage.db_path.ends_with("mastery.db"));
    }

    #[test]
    fn test_builder_rejects_bad_difficulty() {
        let err = SchedulerConfig::builder()
            .initial_state(2.0, 11.0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_builder_rejects_non_positive_factor() {
        let model = ModelParams {
            fail_factor: 0.0,
            ..Default::default()
        };
        assert!(SchedulerConfig::builder().model(model).build().is_err());
    }

    #[test]
    fn test_max_interval_bounds() {
        assert_eq!(SchedulerConfig::default().model.max_interval_days, 36500);

        for max_interval_days in [0, 365_001] {
            let model = ModelParams {
                max_interval_days,
                ..Default::default()
            };
            let err = SchedulerConfig::builder().model(model).build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }

        let model = ModelParams {
            min_stability: 2.0,
            max_interval_days: 1,
            ..Default::default()
        };
        assert!(SchedulerConfig::builder().model(model).build().is_err());
    }

    #[test]
    fn test_timezone_offset() {
        let config = SchedulerConfig::builder()
            .utc_offset_minutes(-300)
            .build()
            .unwrap();
        assert_eq!(config.timezone().unwrap().local_minus_utc(), -300 * 60);

        assert!(SchedulerConfig::builder()
            .utc_offset_minutes(20 * 60)
            .build()
            .is_err());
    }

    #[test]
    fn test_from_toml_file_with_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
min_reps_for_review = 3
utc_offset_minutes = 60

[model]
easy_factor = 3.0

[storage]
backend = "memory"
"#
        )
        .unwrap();

        let config = SchedulerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.min_reps_for_review, 3);
        assert_eq!(config.utc_offset_minutes, 60);
        assert_eq!(config.model.easy_factor, 3.0);
        assert_eq!(config.model.good_factor, 1.5);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "initial_stability: 1.5\nmastered_stability_days: 21.0").unwrap();

        let config = SchedulerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.initial_stability, 1.5);
        assert_eq!(config.mastered_stability_days, 21.0);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = SchedulerConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    // Only test that touches CADENCE_* variables
    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("CADENCE_STORAGE", "memory");
        std::env::set_var("CADENCE_UTC_OFFSET_MINUTES", "-300");
        std::env::set_var("CADENCE_MIN_REPS_FOR_REVIEW", "3");
        let config = SchedulerConfig::from_env().unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.utc_offset_minutes, -300);
        assert_eq!(config.min_reps_for_review, 3);

        std::env::set_var("CADENCE_STORAGE", "postgres");
        let err = SchedulerConfig::from_env().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        for key in [
            "CADENCE_STORAGE",
            "CADENCE_UTC_OFFSET_MINUTES",
            "CADENCE_MIN_REPS_FOR_REVIEW",
        ] {
            std::env::remove_var(key);
        }
    }
}

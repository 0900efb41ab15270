//! Settings module for knotnet configuration.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnotNetSettings {
    /// Directory containing prepared invariant datasets.
    /// If not set, callers are expected to pass explicit paths.
    pub data_dir: Option<PathBuf>,

    /// Seed used by demo binaries and smoke tests when none is supplied.
    pub default_seed: u64,
}

impl Default for KnotNetSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestingSettings {
    /// Force determinism tests to run regardless of platform.
    pub force_determinism_tests: bool,

    /// Indicates if running in continuous integration environment.
    pub ci: bool,
}

impl Default for TestingSettings {
    fn default() -> Self {
        Self {
            force_determinism_tests: false,
            ci: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// knotnet-specific settings
    pub knotnet: KnotNetSettings,

    /// Testing/Development settings
    pub testing: TestingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            knotnet: KnotNetSettings::default(),
            testing: TestingSettings::default(),
        }
    }
}

impl Settings {
    /// Create a new Settings instance from environment variables and config
    /// files. Environment variables are prefixed with "KNOTNET_".
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("knotnet.data_dir", None::<String>)?
            .set_default("knotnet.default_seed", 42u64)?
            .set_default("testing.force_determinism_tests", false)?
            .set_default("testing.ci", false)?
            // Add configuration from .env file if it exists
            .add_source(File::with_name(".env").required(false))
            // Add environment variables with KNOTNET_ prefix
            .add_source(Environment::with_prefix("KNOTNET").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

/// Global settings instance
static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Get the global settings instance, initializing it if necessary.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| Settings::new().unwrap_or_else(|_| Settings::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.knotnet.data_dir, None);
        assert_eq!(settings.knotnet.default_seed, 42);
        assert!(!settings.testing.force_determinism_tests);
        assert!(!settings.testing.ci);
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();

        let json = serde_json::to_string(&settings).expect("Should serialize to JSON");
        assert!(json.contains("data_dir"));
        assert!(json.contains("default_seed"));
        assert!(json.contains("ci"));

        let deserialized: Settings =
            serde_json::from_str(&json).expect("Should deserialize from JSON");
        assert_eq!(deserialized.knotnet.data_dir, settings.knotnet.data_dir);
        assert_eq!(
            deserialized.knotnet.default_seed,
            settings.knotnet.default_seed
        );
    }

    #[test]
    fn test_settings_new_with_defaults() {
        let settings = Settings::new().unwrap_or_else(|_| Settings::default());

        assert_eq!(settings.knotnet.default_seed, 42);
        assert!(!settings.testing.force_determinism_tests);
    }
}

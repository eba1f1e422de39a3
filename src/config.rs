//! Configuration for the input pipeline
//!
//! Tolerances and the note-binding table are supplied by the calibration
//! wizard before the pipeline starts; this module gives them a serde
//! shape so they can also be kept in a JSON file between sessions.
//! Loading is lenient: a missing or corrupt file logs a warning and falls
//! back to defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Complete input-pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub listener: ListenerSettings,
    pub resolver: ResolverSettings,
}

/// Signal listener parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerSettings {
    /// Edge-detection window: two consecutive readings further apart than
    /// this are different channels, not a transition
    pub tolerance: f64,
    /// Poll window for bounded serial reads, in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            read_timeout_ms: 100,
        }
    }
}

/// Note resolver parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Classification window around each bound code
    pub tolerance: f64,
    /// Note-name to sensor-code binding table. Keep codes separated by
    /// more than twice the tolerance.
    pub bindings: BTreeMap<String, f64>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        // The standard five-string table.
        let bindings = (1..=5)
            .map(|i| (format!("nota{}", i), i as f64))
            .collect();
        Self {
            tolerance: 0.5,
            bindings,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            listener: ListenerSettings::default(),
            resolver: ResolverSettings::default(),
        }
    }
}

impl InputConfig {
    /// Load configuration from a JSON file.
    ///
    /// Returns defaults (with a logged warning) if the file is missing or
    /// invalid, so a broken config file never blocks startup.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = InputConfig::default();
        assert_eq!(config.listener.tolerance, 0.5);
        assert_eq!(config.listener.read_timeout_ms, 100);
        assert_eq!(config.resolver.tolerance, 0.5);
        assert_eq!(config.resolver.bindings.len(), 5);
        assert_eq!(config.resolver.bindings["nota1"], 1.0);
        assert_eq!(config.resolver.bindings["nota5"], 5.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = InputConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: InputConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.listener.tolerance, config.listener.tolerance);
        assert_eq!(parsed.resolver.bindings, config.resolver.bindings);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = InputConfig::load_from_file("/nonexistent/fretline.json");
        assert_eq!(config.resolver.bindings.len(), 5);
    }

    #[test]
    fn test_load_corrupt_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let config = InputConfig::load_from_file(file.path());
        assert_eq!(config.listener.tolerance, 0.5);
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut config = InputConfig::default();
        config.listener.tolerance = 0.25;
        config.resolver.bindings.insert("nota6".to_string(), 6.0);
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = InputConfig::load_from_file(file.path());
        assert_eq!(loaded.listener.tolerance, 0.25);
        assert_eq!(loaded.resolver.bindings.len(), 6);
    }
}

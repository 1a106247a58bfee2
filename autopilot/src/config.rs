use anyhow::{Context, Result};
use fleet_core::EngineConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::read_json;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_TICKS: u64 = 1000;

/// Process-level settings read from `AUTOPILOT_*` variables.
#[derive(Clone, Debug, PartialEq)]
pub struct AutopilotConfig {
    pub tick_interval_ms: u64,
    pub max_ticks: u64,
    /// Sleep `tick_interval_ms` between polls, as a live game requires.
    pub continuous: bool,
    pub output_dir: Option<PathBuf>,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_ticks: DEFAULT_MAX_TICKS,
            continuous: false,
            output_dir: None,
        }
    }
}

impl AutopilotConfig {
    pub fn from_env() -> Self {
        Self {
            tick_interval_ms: read_env_u64("AUTOPILOT_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS),
            max_ticks: read_env_u64("AUTOPILOT_MAX_TICKS", DEFAULT_MAX_TICKS),
            continuous: read_env_bool("AUTOPILOT_CONTINUOUS", false),
            output_dir: read_env_path("AUTOPILOT_OUTPUT_DIR"),
        }
    }

    /// Delay between polls, only in continuous mode.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.continuous && self.tick_interval_ms > 0)
            .then(|| Duration::from_millis(self.tick_interval_ms))
    }
}

/// Engine tuning from an optional JSON file; missing fields take defaults.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => read_json(path)
            .with_context(|| format!("invalid engine config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

pub(crate) fn read_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                tracing::warn!("{name}={other} is not a boolean, using {default}");
                default
            }
        },
        Err(_) => default,
    }
}

pub(crate) fn read_env_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::targeting::SizeHeuristic;
    use std::fs;

    #[test]
    fn env_overrides_and_falls_back() {
        env::set_var("AUTOPILOT_TEST_U64", "250");
        env::set_var("AUTOPILOT_TEST_ZERO", "0");
        env::set_var("AUTOPILOT_TEST_BOOL", "Yes");
        env::set_var("AUTOPILOT_TEST_PATH", "  ");
        assert_eq!(read_env_u64("AUTOPILOT_TEST_U64", 1), 250);
        assert_eq!(read_env_u64("AUTOPILOT_TEST_ZERO", 9), 9);
        assert_eq!(read_env_u64("AUTOPILOT_TEST_MISSING", 9), 9);
        assert!(read_env_bool("AUTOPILOT_TEST_BOOL", false));
        assert_eq!(read_env_path("AUTOPILOT_TEST_PATH"), None);
    }

    #[test]
    fn poll_interval_only_when_continuous() {
        let mut config = AutopilotConfig::default();
        assert_eq!(config.poll_interval(), None);
        config.continuous = true;
        assert_eq!(config.poll_interval(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn engine_config_file_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"size_heuristic": "speed", "snap_fire": false}"#).unwrap();
        let config = load_engine_config(Some(path.as_path())).unwrap();
        assert_eq!(config.size_heuristic, SizeHeuristic::Speed);
        assert!(!config.snap_fire);
        assert_eq!(config.stale_target_ticks, 20);
        assert_eq!(load_engine_config(None).unwrap(), EngineConfig::default());
    }
}

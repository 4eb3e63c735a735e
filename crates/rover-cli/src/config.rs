//! Configuration file – reads/writes `~/.rover/config.toml`.
//!
//! The file holds the navigation thresholds (`[environment]`, `[gate]`) plus
//! a `[run]` table for the simulator driver.  Every field has a default, so
//! an empty file is valid.

use rover_types::{ConfigError, EnvironmentConfig, GateConfig, GateVariant, RoverConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Settings for the simulated run itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Control cycles after which an unfinished search is abandoned.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,
}

fn default_max_cycles() -> u64 {
    5000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
        }
    }
}

/// Persisted configuration stored in `~/.rover/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub gate: GateConfig,
}

impl Config {
    /// The navigation part of the document.
    pub fn rover_config(&self) -> RoverConfig {
        RoverConfig {
            environment: self.environment.clone(),
            gate: self.gate.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.max_cycles == 0 {
            return Err(ConfigError::Invalid {
                field: "run.max_cycles".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.rover_config().validate()
    }
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load, override and validate the config at `path`.  Returns `None` if the
/// file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    let Some(mut cfg) = read_from(path)? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Parse the file at `path` as-is, without overrides or validation.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
    Ok(Some(cfg))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_MISS_THRESHOLD` | `environment.miss_threshold` |
/// | `ROVER_FILTER_WINDOW` | `environment.filter_window` |
/// | `ROVER_GATE_VARIANT` | `gate.variant` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROVER_MISS_THRESHOLD")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.environment.miss_threshold = n;
    }
    if let Ok(v) = std::env::var("ROVER_FILTER_WINDOW")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.environment.filter_window = n;
    }
    if let Ok(v) = std::env::var("ROVER_GATE_VARIANT") {
        match v.parse::<GateVariant>() {
            Ok(variant) => cfg.gate.variant = variant,
            Err(e) => warn!(error = %e, "ignoring ROVER_GATE_VARIANT"),
        }
    }
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ConfigError::Io(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| ConfigError::Parse(e.to_string()))?;
    fs::write(path, raw)
        .map_err(|e| ConfigError::Io(format!("failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).expect("write");
        path
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = read_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.run.max_cycles, 5000);
        assert_eq!(loaded.gate.max_search_points, 16);
    }

    #[test]
    fn config_path_points_to_rover_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".rover"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            "[gate]\nspin_step_deg = 45.0\n\n[environment]\nbearing_tolerance_deg = 10.0\n",
        );
        let cfg = read_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.gate.spin_step_deg, 45.0);
        assert_eq!(cfg.environment.bearing_tolerance_deg, 10.0);
        assert_eq!(cfg.gate.gate_standoff_m, 3.0);
        assert_eq!(cfg.run, RunConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[gate\nspin_step_deg = ");
        assert!(matches!(read_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn out_of_range_value_fails_validation() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[gate]\nmax_search_points = 0\n");
        assert!(matches!(
            load_from(&path),
            Err(ConfigError::Invalid { ref field, .. }) if field == "gate.max_search_points"
        ));
    }

    #[test]
    fn zero_max_cycles_is_rejected() {
        let mut cfg = Config::default();
        cfg.run.max_cycles = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn apply_env_overrides_changes_miss_threshold() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("ROVER_MISS_THRESHOLD", "9") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.environment.miss_threshold, 9);

        unsafe { std::env::set_var("ROVER_MISS_THRESHOLD", "lots") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.environment.miss_threshold, 5);
        unsafe { std::env::remove_var("ROVER_MISS_THRESHOLD") };
    }

    #[test]
    fn apply_env_overrides_changes_filter_window() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("ROVER_FILTER_WINDOW", "8") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.environment.filter_window, 8);
        unsafe { std::env::remove_var("ROVER_FILTER_WINDOW") };
    }

    #[test]
    fn apply_env_overrides_changes_gate_variant() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("ROVER_GATE_VARIANT", "Spiral") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.gate.variant, GateVariant::Spiral);

        unsafe { std::env::set_var("ROVER_GATE_VARIANT", "zigzag") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.gate.variant, GateVariant::Diamond);
        unsafe { std::env::remove_var("ROVER_GATE_VARIANT") };
    }
}

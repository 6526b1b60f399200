//! Configuration file – reads/writes `~/.strider/config.toml`.
//!
//! The file holds one table per runtime section (`[player]`, `[world]`,
//! `[gait]`, `[motor]`, `[robot]`, `[head]`, `[action]`, `[behavior]`).
//! Missing tables and keys fall back to their defaults, so a file with a
//! single overridden value is valid.

use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strider_runtime::RuntimeConfig;
use strider_types::StriderError;

/// Persisted robot configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(pub RuntimeConfig);

impl Config {
    /// Value at a dotted key such as `"gait.control_hz"`.  Numeric segments
    /// index into arrays (`"robot.joints.0.name"`).
    pub fn lookup(&self, key: &str) -> Option<toml::Value> {
        let mut value = toml::Value::try_from(&self.0).ok()?;
        for segment in key.split('.') {
            value = match value {
                toml::Value::Table(mut table) => table.remove(segment)?,
                toml::Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(value)
    }

    pub fn into_runtime(self) -> RuntimeConfig {
        self.0
    }
}

impl Deref for Config {
    type Target = RuntimeConfig;

    fn deref(&self) -> &RuntimeConfig {
        &self.0
    }
}

impl DerefMut for Config {
    fn deref_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.0
    }
}

/// Return the path to the config file: `STRIDER_CONFIG` when set, otherwise
/// `~/.strider/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("STRIDER_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".strider").join("config.toml")
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, StriderError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        StriderError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| StriderError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `STRIDER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `STRIDER_PLAYER_ID` | `world.player_id` |
/// | `STRIDER_CONTROL_HZ` | `gait.control_hz`, `action.control_hz`, `head.control_hz` |
/// | `STRIDER_USE_GC` | `player.use_game_controller` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("STRIDER_PLAYER_ID")
        && let Ok(id) = v.parse::<u8>()
    {
        cfg.world.player_id = id;
    }
    if let Ok(v) = std::env::var("STRIDER_CONTROL_HZ")
        && let Ok(hz) = v.parse::<f64>()
        && hz > 0.0
    {
        cfg.gait.control_hz = hz;
        cfg.action.control_hz = hz;
        cfg.head.control_hz = hz;
    }
    if let Ok(v) = std::env::var("STRIDER_USE_GC")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.player.use_game_controller = flag;
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to a specific path, creating parent directories.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), StriderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            StriderError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| StriderError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| StriderError::Config(format!("failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_path_is_under_home() {
        let path = config_path_for_home("/home/robot");
        assert_eq!(path, PathBuf::from("/home/robot/.strider/config.toml"));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let result = load_from(&dir.path().join("nope.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.motor.device = "/dev/ttyUSB1".to_string();
        cfg.player.think_period_ms = 25;
        cfg.behavior.kick_distance = 0.3;
        save_to(&cfg, &path).unwrap();

        let loaded = load_from(&path).unwrap().unwrap();
        // Fields with env overrides are left out; tests run in parallel.
        assert_eq!(loaded.motor, cfg.motor);
        assert_eq!(loaded.player.think_period_ms, 25);
        assert_eq!(loaded.behavior, cfg.behavior);
        assert_eq!(loaded.robot, cfg.robot);
        assert_eq!(loaded.action.library, cfg.action.library);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[motor]\ndevice = \"/dev/ttyACM0\"\n").unwrap();

        let loaded = load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.motor.device, "/dev/ttyACM0");
        assert_eq!(loaded.motor.period_ms, RuntimeConfig::default().motor.period_ms);
        assert_eq!(loaded.robot, RuntimeConfig::default().robot);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[motor\n").unwrap();
        assert!(matches!(load_from(&path), Err(StriderError::Config(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        // SAFETY: these variables are only read by this test.
        unsafe {
            std::env::set_var("STRIDER_PLAYER_ID", "3");
            std::env::set_var("STRIDER_CONTROL_HZ", "125");
            std::env::set_var("STRIDER_USE_GC", "yes");
        }
        apply_env_overrides(&mut cfg);
        unsafe {
            std::env::remove_var("STRIDER_PLAYER_ID");
            std::env::remove_var("STRIDER_CONTROL_HZ");
            std::env::remove_var("STRIDER_USE_GC");
        }
        assert_eq!(cfg.world.player_id, 3);
        assert_eq!(cfg.gait.control_hz, 125.0);
        assert_eq!(cfg.action.control_hz, 125.0);
        assert_eq!(cfg.head.control_hz, 125.0);
        assert!(cfg.player.use_game_controller);
    }

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn lookup_walks_tables_and_arrays() {
        let cfg = Config::default();
        assert_eq!(cfg.lookup("gait.control_hz"), Some(toml::Value::Float(50.0)));
        assert_eq!(
            cfg.lookup("robot.joints.0.name"),
            Some(toml::Value::String("head_yaw".to_string()))
        );
        assert_eq!(cfg.lookup("player.use_game_controller"), Some(toml::Value::Boolean(false)));
        assert!(cfg.lookup("gait").is_some_and(|v| v.is_table()));
        assert_eq!(cfg.lookup("gait.nope"), None);
        assert_eq!(cfg.lookup("robot.joints.999"), None);
        assert_eq!(cfg.lookup("gait.control_hz.deeper"), None);
    }
}

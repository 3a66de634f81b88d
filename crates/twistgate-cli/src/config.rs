//! Configuration loading – reads `~/.twistgate/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use twistgate_runtime::GateConfig;
use twistgate_types::GateError;

/// Return the path to `~/.twistgate/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".twistgate").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<GateConfig>, GateError> {
    load_from(&config_path())
}

/// Load the config from a specific path, then apply environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<GateConfig>, GateError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let mut cfg: GateConfig = toml::from_str(&raw).map_err(|e| {
        GateError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TWISTGATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TWISTGATE_WATCHDOG_PERIOD_MS` | `watchdog_period_ms` |
/// | `TWISTGATE_REMOTE_TIMEOUT_MS` | `remote_timeout_ms` |
/// | `TWISTGATE_BUS_CAPACITY` | `bus_capacity` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut GateConfig) {
    if let Ok(v) = std::env::var("TWISTGATE_WATCHDOG_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.watchdog_period_ms = ms;
    }
    if let Ok(v) = std::env::var("TWISTGATE_REMOTE_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.remote_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("TWISTGATE_BUS_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>()
    {
        cfg.bus_capacity = capacity;
    }
}

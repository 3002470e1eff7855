//! Configuration loading and database path resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Database path resolution priority order:
/// 1. Caller-supplied path (highest priority)
/// 2. `CERTFORGE_DATABASE` environment variable
/// 3. TOML config file (`database_path` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(explicit: Option<&str>) -> Result<PathBuf> {
    // Priority 1: caller-supplied path
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var("CERTFORGE_DATABASE") {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(db_path) = config.get("database_path").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(db_path));
                }
            }
        }
    }

    // Priority 4: OS-dependent default
    Ok(default_data_dir().join("certforge.db"))
}

/// Get the configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir()
        .map(|d| d.join("certforge").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if user_config.exists() {
        return Ok(user_config);
    }

    let system_config = PathBuf::from("/etc/certforge/config.toml");
    if cfg!(target_os = "linux") && system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get the OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("certforge"))
        .unwrap_or_else(|| PathBuf::from("./certforge_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = resolve_database_path(Some("/tmp/explicit.db")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
    }

    #[test]
    fn fallback_ends_with_default_name() {
        // No explicit path; env var may or may not be set in the test
        // environment, but the result is always a non-empty path.
        let path = resolve_database_path(None).unwrap();
        assert!(!path.as_os_str().is_empty());
    }
}

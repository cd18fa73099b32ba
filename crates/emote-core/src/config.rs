use crate::error::{EmoteError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const PID_FILENAME: &str = "emote-daemon.pid";
pub const CUSTOM_ALIASES_FILENAME: &str = "custom_aliases.json";
pub const SETTINGS_FILENAME: &str = "settings.json";
pub const RECENT_FILENAME: &str = "recent.json";
pub const DAEMON_LOG_FILENAME: &str = "daemon_log.txt";

/// Overrides the configuration directory, mostly for tests and sandboxes.
pub const HOME_OVERRIDE_VAR: &str = "EMOTE_HOME";

/// Get the emote configuration directory
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = env::var(HOME_OVERRIDE_VAR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".emote"))
        .unwrap_or_else(|_| PathBuf::from(".emote"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir();
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }
    Ok(config_dir)
}

/// Get the path to the PID file
pub fn get_pid_file_path() -> PathBuf {
    get_config_dir().join(PID_FILENAME)
}

/// Get the path to the user-editable alias file
pub fn get_custom_aliases_path() -> PathBuf {
    get_config_dir().join(CUSTOM_ALIASES_FILENAME)
}

pub fn get_settings_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILENAME)
}

pub fn get_recent_path() -> PathBuf {
    get_config_dir().join(RECENT_FILENAME)
}

pub fn get_daemon_log_path() -> PathBuf {
    get_config_dir().join(DAEMON_LOG_FILENAME)
}

/// Read the PID recorded by a running daemon, if any.
///
/// Unreadable or garbage PID files are removed and treated as "not running".
pub fn is_daemon_running() -> Result<Option<u32>> {
    read_pid_file(&get_pid_file_path())
}

pub fn read_pid_file(pid_file: &Path) -> Result<Option<u32>> {
    if !pid_file.exists() {
        return Ok(None);
    }

    match fs::read_to_string(pid_file) {
        Ok(contents) => match contents.trim().parse::<u32>() {
            Ok(pid) => Ok(Some(pid)),
            Err(_) => {
                let _ = fs::remove_file(pid_file);
                Ok(None)
            }
        },
        Err(_) => {
            let _ = fs::remove_file(pid_file);
            Ok(None)
        }
    }
}

/// Write the current process id to the PID file.
pub fn write_pid_file(pid_file: &Path) -> Result<()> {
    if let Some(parent) = pid_file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(pid_file, std::process::id().to_string())
        .map_err(|e| EmoteError::Other(format!("Failed to write PID file: {}", e)))
}

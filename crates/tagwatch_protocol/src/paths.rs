//! Default filesystem locations.

use std::path::PathBuf;
use std::sync::Once;

static CREATE_DIR_WARNED: Once = Once::new();

/// Resolve the Tagwatch home directory.
///
/// Priority:
/// 1) TAGWATCH_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.tagwatch
pub fn tagwatch_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("TAGWATCH_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".tagwatch");
    }
    PathBuf::from(".").join(".tagwatch")
}

fn ensure_home_dir(home: &PathBuf) {
    if let Err(err) = std::fs::create_dir_all(home) {
        CREATE_DIR_WARNED.call_once(|| {
            eprintln!(
                "Warning: failed to create Tagwatch home directory {}: {}. Set TAGWATCH_HOME or pass --state.",
                home.display(),
                err
            );
        });
    }
}

/// Default config path: ~/.tagwatch/config.toml
pub fn default_config_path() -> PathBuf {
    tagwatch_home().join("config.toml")
}

/// Default persisted state path: ~/.tagwatch/state.json
pub fn default_state_path() -> PathBuf {
    let home = tagwatch_home();
    ensure_home_dir(&home);
    home.join("state.json")
}

/// Default logs directory: ~/.tagwatch/logs
pub fn default_logs_dir() -> PathBuf {
    let home = tagwatch_home();
    ensure_home_dir(&home);
    home.join("logs")
}

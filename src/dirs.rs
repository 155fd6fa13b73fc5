use std::path::PathBuf;

/// Returns the base directory for Playground configuration.
///
/// Uses `$A3S_PLAYGROUND_HOME` if set, otherwise defaults to `~/.a3s/playground`.
pub fn playground_home() -> PathBuf {
    if let Ok(home) = std::env::var("A3S_PLAYGROUND_HOME") {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".a3s")
        .join("playground")
}

/// Returns the path to the user configuration file.
pub fn config_path() -> PathBuf {
    playground_home().join("config.toml")
}

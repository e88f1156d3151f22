//! Application data directory and path helpers

use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "nalenc";

/// Per-user application data directory.
///
/// - Windows: `%APPDATA%\nalenc` (falls back to `~\AppData\Roaming`)
/// - macOS: `~/Library/Application Support/nalenc`
/// - elsewhere: `$XDG_CONFIG_HOME/nalenc` (falls back to `~/.config`)
pub fn app_data_dir() -> PathBuf {
    platform_base_dir().join(APP_DIR_NAME)
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    app_data_dir().join("config.toml")
}

#[cfg(windows)]
fn platform_base_dir() -> PathBuf {
    std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join("AppData").join("Roaming"))
}

#[cfg(target_os = "macos")]
fn platform_base_dir() -> PathBuf {
    home_dir().join("Library").join("Application Support")
}

#[cfg(not(any(windows, target_os = "macos")))]
fn platform_base_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default()
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with(APP_DIR_NAME));
        assert!(default_config_path().ends_with("nalenc/config.toml"));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde(Path::new("/etc/nalenc")), PathBuf::from("/etc/nalenc"));
        assert_eq!(expand_tilde(Path::new("keys/a.key")), PathBuf::from("keys/a.key"));
    }

    #[test]
    fn test_expand_tilde_replaces_home() {
        let expanded = expand_tilde(Path::new("~/keys/a.key"));
        assert!(expanded.ends_with("keys/a.key"));
        assert!(!expanded.starts_with("~"));
    }
}

//! Path utilities for serline
//!
//! Resolves XDG Base Directory locations for the config file and logs.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "serline";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/serline` or `~/.config/serline`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/serline/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/serline` or `~/.local/state/serline`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/serline/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

// Fallbacks when ProjectDirs cannot resolve a home directory

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_in_config_dir() {
        let file = config_file();
        assert!(file.starts_with(config_dir()));
        assert_eq!(file.file_name().unwrap().to_str().unwrap(), "config.toml");
    }

    #[test]
    fn test_log_dir_is_under_state() {
        assert!(log_dir().starts_with(state_dir()));
        assert_eq!(log_dir().file_name().unwrap().to_str().unwrap(), "log");
    }

    #[test]
    fn test_all_paths_contain_serline() {
        for path in [config_dir(), config_file(), state_dir(), log_dir()] {
            assert!(
                path.to_string_lossy().contains("serline"),
                "Path should contain 'serline': {:?}",
                path
            );
        }
    }

    #[test]
    fn test_fallback_dirs() {
        assert!(fallback_config_dir().to_string_lossy().contains(".config"));
        assert!(fallback_state_dir()
            .to_string_lossy()
            .contains(".local/state"));
    }

    #[test]
    fn test_ensure_dir_nested() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let test_dir = temp_dir.path().join("nested").join("deep");

        ensure_dir(&test_dir).unwrap();
        assert!(test_dir.is_dir());

        // Second call is a no-op
        ensure_dir(&test_dir).unwrap();
    }
}

//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Data (registries, seen sets, media, logs) | `~/.local/share/questclaim/` | `~/Library/Application Support/questclaim/` |
//! | Config | `~/.config/questclaim/` | `~/Library/Application Support/questclaim/` |
//!
//! Overrides: `QUESTCLAIM_DATA_DIR` for [`data_dir`], `QUESTCLAIM_CONFIG_DIR`
//! for [`config_dir`].

use std::path::{Path, PathBuf};

/// Application data root directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("QUESTCLAIM_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("questclaim"))
        .unwrap_or_else(|| PathBuf::from("/tmp/questclaim-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("QUESTCLAIM_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("questclaim"))
        .unwrap_or_else(|| PathBuf::from("/tmp/questclaim-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Per-account state directory (`data_root/accounts/<account>/`).
///
/// The account name is reduced to a single safe path segment so that a name
/// such as `../x` cannot escape the accounts tree. Account state never shares
/// a directory with `media/` or `logs/`, whatever the account is called.
#[must_use]
pub fn account_dir(data_root: &Path, account: &str) -> PathBuf {
    data_root.join("accounts").join(sanitize_segment(account))
}

/// Uploaded proof media directory (`data_root/media/`).
#[must_use]
pub fn media_dir(data_root: &Path) -> PathBuf {
    data_root.join("media")
}

/// Log file directory (`data_root/logs/`).
#[must_use]
pub fn logs_dir(data_root: &Path) -> PathBuf {
    data_root.join("logs")
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
#[must_use]
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_owned()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_is_toml_under_config_dir() {
        let path = config_file();
        assert!(path.starts_with(config_dir()));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn account_dir_stays_inside_root() {
        let root = Path::new("/data");
        assert_eq!(account_dir(root, "alice"), PathBuf::from("/data/accounts/alice"));
        assert_eq!(account_dir(root, "../etc"), PathBuf::from("/data/accounts/___etc"));
        assert_eq!(account_dir(root, "a b/c"), PathBuf::from("/data/accounts/a_b_c"));
    }

    #[test]
    fn empty_segment_is_replaced() {
        assert_eq!(sanitize_segment("   "), "_");
    }

    #[test]
    fn media_and_logs_live_under_root() {
        let root = Path::new("/data");
        assert_eq!(media_dir(root), PathBuf::from("/data/media"));
        assert_eq!(logs_dir(root), PathBuf::from("/data/logs"));
    }
}

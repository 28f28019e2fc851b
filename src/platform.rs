//! Cross-platform locations for configuration and cached data.

use std::path::PathBuf;

const APP_DIR: &str = "t3scan";

/// Returns the directory for cached registry data.
///
/// Falls back to the system temp directory if the platform has no cache
/// directory.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Returns the directory holding `config.toml`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_are_app_scoped() {
        assert!(cache_dir().ends_with(APP_DIR));
        assert!(config_dir().ends_with(APP_DIR));
    }
}

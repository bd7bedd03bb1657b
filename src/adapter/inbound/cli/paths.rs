//! Path utilities for bookie.
//!
//! All data lives under `~/.bookie/` unless configured otherwise:
//! - `~/.bookie/config.toml` - main configuration

use std::path::PathBuf;

/// Returns the bookie home directory (`~/.bookie/`).
pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bookie")
}

/// Returns the default config file path (`~/.bookie/config.toml`).
pub fn default_config() -> PathBuf {
    home_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lives_under_bookie_home() {
        assert!(default_config().starts_with(home_dir()));
        assert!(home_dir().to_string_lossy().contains(".bookie"));
    }
}

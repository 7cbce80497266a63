//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use roster_db::{DatabaseOptions, RetryPolicy};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Write attempts before a busy transaction is reported as failed.
    pub retry_attempts: u32,

    /// Initial backoff between write attempts, in milliseconds.
    pub retry_backoff_ms: u64,

    /// Days covered by `template apply` when no end is given.
    pub apply_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("roster.db"),
            busy_timeout_ms: 5000,
            retry_attempts: 5,
            retry_backoff_ms: 20,
            apply_days: 7,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // ROSTER_DATABASE_PATH, ROSTER_APPLY_DAYS, ...
        figment = figment.merge(Env::prefixed("ROSTER_"));

        figment.extract()
    }

    /// Connection settings derived from the retry and timeout keys.
    pub fn database_options(&self) -> DatabaseOptions {
        let initial_backoff = Duration::from_millis(self.retry_backoff_ms);
        DatabaseOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                initial_backoff,
                max_backoff: initial_backoff * 16,
            },
        }
    }
}

/// Returns the platform-specific config directory for roster.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("roster"))
}

/// Returns the platform-specific data directory for roster.
///
/// On Linux: `~/.local/share/roster`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("roster"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("roster.db"));
        assert_eq!(data_dir.file_name().unwrap(), "roster");
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/other.db\"\napply_days = 14\nretry_attempts = 0\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.apply_days, 14);
        assert_eq!(config.busy_timeout_ms, 5000);

        let options = config.database_options();
        assert_eq!(options.retry.max_attempts, 1);
        assert_eq!(options.retry.max_backoff, Duration::from_millis(320));
    }
}

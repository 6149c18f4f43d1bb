//! Settings for the quire CLI.
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. built-in defaults (platform data directory, no user);
//! 2. `quire.toml` in the platform config directory, if present;
//! 3. `QUIRE_*` environment variables.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "quire.toml";
const ENV_PREFIX: &str = "QUIRE_";

/// Everything the CLI needs to know before it can open the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the on-device library. Blobs live underneath it.
    pub data_dir: PathBuf,
    /// Where the shared record database lives. Defaults to a file inside
    /// `data_dir` when unset.
    pub database: Option<PathBuf>,
    /// The signed-in user. Unset means browsing signed out.
    pub user_id: Option<String>,
}

impl Settings {
    /// Load settings from the platform's standard locations, honoring an
    /// explicit config file path when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error when no home directory can be resolved, or when the
    /// config file or environment contain values of the wrong shape.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "quire").ok_or_raise(|| ErrorKind::NoHome)?;
        let file = config_file.map_or_else(|| dirs.config_dir().join(CONFIG_FILE), Path::to_path_buf);
        Self::load_from(file, dirs.data_dir())
    }

    /// Load settings from an explicit config file location.
    ///
    /// A missing file is fine; the defaults and the environment still apply.
    pub fn load_from(config_file: impl AsRef<Path>, default_data_dir: impl AsRef<Path>) -> Result<Self> {
        let config_file = config_file.as_ref();
        tracing::debug!(config = %config_file.display(), "loading configuration");
        let defaults = Self {
            data_dir: default_data_dir.as_ref().to_path_buf(),
            database: None,
            user_id: None,
        };
        Figment::from(Serialized::defaults(defaults))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .or_raise(|| ErrorKind::Load)
    }

    /// Where the shared record database lives.
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| self.data_dir.join("library.db"))
    }

    /// The signed-in user, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_apply_without_file_or_env() {
        figment::Jail::expect_with(|_jail| {
            let settings = Settings::load_from("quire.toml", "/default/data").unwrap();
            assert_eq!(settings.data_dir, PathBuf::from("/default/data"));
            assert_eq!(settings.database, None);
            assert_eq!(settings.user_id(), None);
            Ok(())
        });
    }

    #[test]
    fn test_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("quire.toml", r#"
                data_dir = "/elsewhere"
                user_id = "reader-1"
            "#)?;
            let settings = Settings::load_from("quire.toml", "/default/data").unwrap();
            assert_eq!(settings.data_dir, PathBuf::from("/elsewhere"));
            assert_eq!(settings.user_id(), Some("reader-1"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("quire.toml", r#"user_id = "from-file""#)?;
            jail.set_env("QUIRE_USER_ID", "from-env");
            jail.set_env("QUIRE_DATABASE", "/shared/library.db");
            let settings = Settings::load_from("quire.toml", "/default/data").unwrap();
            assert_eq!(settings.user_id(), Some("from-env"));
            assert_eq!(settings.database_path(), PathBuf::from("/shared/library.db"));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file_is_a_load_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("quire.toml", "data_dir = [not toml")?;
            let err = Settings::load_from("quire.toml", "/default/data").unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[rstest]
    #[case::derived(None, "/data/library.db")]
    #[case::explicit(Some("/shared/quire.db"), "/shared/quire.db")]
    fn test_database_path(#[case] database: Option<&str>, #[case] expected: &str) {
        let settings = Settings {
            data_dir: PathBuf::from("/data"),
            database: database.map(PathBuf::from),
            user_id: None,
        };
        assert_eq!(settings.database_path(), PathBuf::from(expected));
    }
}

//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use nark_core::EngineConfig;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Settings passed to the fact engine.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("fact_min_delta", &self.engine.fact_min_delta)
            .field("timezone", &self.engine.timezone.to_string())
            .field("implicit_create", &self.engine.implicit_create)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("nark.db"),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `config.toml` in the config directory,
    /// `config_path`, then `NARK_*` variables (`NARK_ENGINE__FACT_MIN_DELTA`
    /// sets `engine.fact_min_delta`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(config_path).extract()
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("NARK_").split("__"))
    }
}

/// Returns the platform-specific config directory for nark.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nark"))
}

/// Returns the platform-specific data directory for nark.
///
/// On Linux: `~/.local/share/nark`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("nark"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use nark_core::LocalZone;

    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_nark() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "nark");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("nark.db"));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_path = "/tmp/elsewhere.db"

[engine]
fact_min_delta = 60
timezone = "+02:00"
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.engine.fact_min_delta, 60);
        assert_eq!(config.engine.timezone, "+02:00".parse::<LocalZone>().unwrap());
        assert!(config.engine.implicit_create);
    }

    #[test]
    fn test_debug_shows_engine_settings() {
        let config = Config {
            database_path: PathBuf::from("/data/nark.db"),
            engine: EngineConfig {
                timezone: LocalZone::Utc,
                ..EngineConfig::default()
            },
        };
        insta::assert_snapshot!(format!("{config:#?}"), @r#"
        Config {
            database_path: "/data/nark.db",
            fact_min_delta: 0,
            timezone: "utc",
            implicit_create: true,
        }
        "#);
    }
}

use anyhow::{bail, Result};
use miriam_core::default_log_level;
use std::env;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "miriam.sqlite3";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging is off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup("MIRIAM_DB_PATH") {
            Some(value) if value.trim().is_empty() => bail!("MIRIAM_DB_PATH must not be blank"),
            Some(value) => PathBuf::from(value),
            None => PathBuf::from(DEFAULT_DB_PATH),
        };

        Ok(Config {
            db_path,
            log_level: lookup("MIRIAM_LOG_LEVEL")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: lookup("MIRIAM_LOG_DIR")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Applies command-line flags on top of the environment.
    pub fn with_overrides(
        mut self,
        db_path: Option<PathBuf>,
        log_level: Option<String>,
        log_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(db_path) = db_path {
            self.db_path = db_path;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        if log_dir.is_some() {
            self.log_dir = log_dir;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("miriam.sqlite3"));
        assert!(!config.log_level.is_empty());
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn environment_and_flags_are_layered() {
        let config = Config::from_lookup(lookup(&[
            ("MIRIAM_DB_PATH", "/tmp/registry.sqlite3"),
            ("MIRIAM_LOG_LEVEL", "warn"),
            ("MIRIAM_LOG_DIR", "/tmp/logs"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "warn");

        let config = config.with_overrides(Some(PathBuf::from("other.sqlite3")), None, None);
        assert_eq!(config.db_path, PathBuf::from("other.sqlite3"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn blank_database_path_is_rejected() {
        assert!(Config::from_lookup(lookup(&[("MIRIAM_DB_PATH", "  ")])).is_err());
    }
}

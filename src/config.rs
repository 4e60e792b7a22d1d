use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::admission::{AdmissionPolicy, DailyLimits};
use crate::error::{Error, Result};

const DEFAULT_DB_NAME: &str = "kioku.db";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_USER: &str = "default";
const DEFAULT_LEARN_BATCH: usize = 5;

/// Settings read from `config.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Owner recorded on new sets; daily budgets are tracked per owner.
    pub user: String,

    /// Database location. `KIOKU_DB` takes precedence.
    pub database: Option<PathBuf>,

    /// Offset from UTC, in minutes, of the calendar day used for daily
    /// limits. `540` resets budgets at midnight Japan time.
    pub utc_offset_minutes: i32,

    /// Default number of items `learn` tries to admit.
    pub learn_batch: usize,

    pub daily_limits: DailyLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: DEFAULT_USER.to_string(),
            database: None,
            utc_offset_minutes: 0,
            learn_batch: DEFAULT_LEARN_BATCH,
            daily_limits: DailyLimits::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, falling back to defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            tracing::debug!("loading config from {}", path.display());
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("failed to serialize: {}", e)))
    }

    pub fn admission_policy(&self) -> Result<AdmissionPolicy> {
        AdmissionPolicy::new(self.daily_limits, self.utc_offset_minutes)
    }

    fn validate(&self) -> Result<()> {
        if self.user.trim().is_empty() {
            return Err(Error::Config(String::from("user must not be empty")));
        }
        if self.daily_limits.vocabulary < 0 || self.daily_limits.grammar < 0 {
            return Err(Error::Config(String::from(
                "daily limits must not be negative",
            )));
        }
        self.admission_policy().map(|_| ())
    }

    pub fn db_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var("KIOKU_DB") {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.database {
            return path.clone();
        }
        app_dir().join(DEFAULT_DB_NAME)
    }
}

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("KIOKU_CONFIG") {
        return PathBuf::from(path);
    }
    app_dir().join(CONFIG_FILE_NAME)
}

fn app_dir() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kioku");

    std::fs::create_dir_all(&dir).ok();
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pool;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.daily_limits.vocabulary, 5);
        assert_eq!(config.learn_batch, 5);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
            user = "hana"
            utc_offset_minutes = 540

            [daily_limits]
            grammar = 2
            "#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.user, "hana");
        assert_eq!(config.utc_offset_minutes, 540);
        assert_eq!(config.daily_limits.grammar, 2);
        assert_eq!(config.daily_limits.vocabulary, 5);

        let policy = config.admission_policy().unwrap();
        assert_eq!(policy.limit(Pool::Grammar), 2);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let file = write_config("user = [");
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn negative_limit_rejected() {
        let file = write_config("[daily_limits]\nvocabulary = -1\n");
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn empty_user_rejected() {
        let file = write_config("user = \"  \"\n");
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn serialized_config_loads_back() {
        let config = Config {
            user: String::from("ken"),
            learn_batch: 3,
            ..Config::default()
        };
        let file = write_config(&config.to_toml().unwrap());
        assert_eq!(Config::load(file.path()).unwrap(), config);
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = config_path(Some(Path::new("/tmp/kioku-test.toml")));
        assert_eq!(path, PathBuf::from("/tmp/kioku-test.toml"));
    }

    #[test]
    fn database_setting_used_without_env() {
        std::env::remove_var("KIOKU_DB");
        let config = Config {
            database: Some(PathBuf::from("/tmp/kioku-custom.db")),
            ..Config::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/tmp/kioku-custom.db"));
    }
}

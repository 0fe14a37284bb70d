//! Runner configuration: command-line flags, environment and an optional TOML file.

use crate::error::Error;
use crate::ledger::DEFAULT_LEDGER_TABLE_NAME;
use crate::loader::DEFAULT_UNIT_EXTENSION;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "migrun.toml";

const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Settings read from the configuration file. Every key is optional.
///
/// ```toml
/// database_url = "sqlite://app.db"
/// migrations_dir = "migrations"
/// table = "migrations"
/// extension = "rs"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub table: Option<String>,
    pub extension: Option<String>,
}

impl FileConfig {
    pub fn parse(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub table: Option<String>,
    pub extension: Option<String>,
    pub config: Option<PathBuf>,
}

/// Fully resolved runner settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub migrations_dir: PathBuf,
    pub table: String,
    pub extension: String,
}

impl Config {
    /// Resolve settings: overrides win over the file, the file wins over defaults.
    ///
    /// An explicitly named config file must exist; the default one is optional.
    pub fn load(overrides: Overrides) -> Result<Self, Error> {
        let file = match &overrides.config {
            Some(path) => FileConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                FileConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => FileConfig::default(),
        };
        Self::merge(overrides, file)
    }

    pub fn merge(overrides: Overrides, file: FileConfig) -> Result<Self, Error> {
        let database_url = overrides
            .database_url
            .or(file.database_url)
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "no database URL given; set DATABASE_URL or pass --database-url".to_string(),
                )
            })?;

        Ok(Self {
            database_url,
            migrations_dir: overrides
                .migrations_dir
                .or(file.migrations_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
            table: overrides
                .table
                .or(file.table)
                .unwrap_or_else(|| DEFAULT_LEDGER_TABLE_NAME.to_string()),
            extension: overrides
                .extension
                .or(file.extension)
                .unwrap_or_else(|| DEFAULT_UNIT_EXTENSION.to_string()),
        })
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
};

use relmap_utils::string::validate_identifier;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application's configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Prepended to every table name in emitted statements.
    /// Default: ""
    pub table_prefix: String,

    /// Character used to quote identifiers when statements are rendered.
    /// Default: '`'
    pub identifier_quote: char,

    /// Log level used when no verbosity flag is given.
    /// Default: "info"
    pub log_level: Option<String>,

    /// Schema file used by commands that take `--schema` when it is omitted.
    pub schema_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            identifier_quote: '`',
            log_level: Some("info".to_string()),
            schema_path: None,
        }
    }
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("RELMAP_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => PathBuf::from("relmap.toml"),
    })
});

/// Overrides the configuration file location (`--config`).
pub fn set_config_path(path: impl Into<PathBuf>) {
    *CONFIG_PATH.write().unwrap_or_else(PoisonError::into_inner) = path.into();
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Loads the configuration file and installs it as the process-wide config.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
    Ok(())
}

/// Returns the process-wide configuration, installing the defaults when
/// [`init`] was never called.
pub fn get_config() -> Config {
    if let Some(config) = CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return config.clone();
    }

    CONFIG
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(Config::default)
        .clone()
}

impl Config {
    /// Creates a new configuration by loading it from the configuration file.
    /// If the configuration file is not found, it uses the default configuration.
    pub fn new() -> Result<Self> {
        Self::from_path(config_path())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                Self::default()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        if let Ok(prefix) = std::env::var("RELMAP_TABLE_PREFIX") {
            config.table_prefix = prefix;
        }

        config.resolve()?;

        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        if !self.table_prefix.is_empty() {
            validate_identifier(&self.table_prefix).map_err(|source| {
                ConfigError::InvalidTablePrefix {
                    prefix: self.table_prefix.clone(),
                    source,
                }
            })?;
        }

        if !matches!(self.identifier_quote, '`' | '"') {
            return Err(ConfigError::InvalidIdentifierQuote(self.identifier_quote));
        }

        let level = self.log_level.get_or_insert_with(|| "info".to_string());
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(level.clone()));
        }

        Ok(())
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn schema_path(&self) -> Option<PathBuf> {
        self.schema_path.as_ref().map(PathBuf::from)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = config_path();
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, serialized)?;
        info!("Configuration saved to {}", config_path.display());
        Ok(())
    }
}

/// Writes the default configuration to the configured location. Fails when a
/// file is already there.
pub fn generate_default_config() -> Result<PathBuf> {
    let config_path = config_path();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    Config::default().save()?;
    Ok(config_path)
}

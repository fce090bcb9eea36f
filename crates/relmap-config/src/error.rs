use miette::Diagnostic;
use relmap_utils::error::IdentifierError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(relmap_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(relmap_config::toml_deserialize),
        help("Check your relmap.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(relmap_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Invalid table prefix `{prefix}`")]
    #[diagnostic(
        code(relmap_config::invalid_table_prefix),
        help("Table prefixes may only contain letters, digits and underscores")
    )]
    InvalidTablePrefix {
        prefix: String,
        #[source]
        source: IdentifierError,
    },

    #[error("Invalid identifier quote `{0}`")]
    #[diagnostic(
        code(relmap_config::invalid_identifier_quote),
        help("Use ` (MySQL) or \" (ANSI SQL)")
    )]
    InvalidIdentifierQuote(char),

    #[error("Invalid log level: {0}")]
    #[diagnostic(
        code(relmap_config::invalid_log_level),
        help("Use one of: trace, debug, info, warn, error")
    )]
    InvalidLogLevel(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(relmap_config::io))]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

use std::path::PathBuf;

use miette::Diagnostic;
use relmap_config::error::ConfigError;
use relmap_core::CoreError;
use relmap_db::{BuildError, DbError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),

    #[error("Failed to read {}", path.display())]
    #[diagnostic(code(relmap_cli::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema file: {0}")]
    #[diagnostic(
        code(relmap_cli::schema_syntax),
        help("Check the [[entity]] tables of your schema file")
    )]
    SchemaSyntax(#[from] toml::de::Error),

    #[error("Invalid schema: {0}")]
    #[diagnostic(code(relmap_cli::invalid_schema))]
    InvalidSchema(String),

    #[error("No schema file given")]
    #[diagnostic(
        code(relmap_cli::missing_schema),
        help("Pass --schema or set schema_path in relmap.toml")
    )]
    MissingSchema,

    #[error("Unknown table `{0}`")]
    #[diagnostic(
        code(relmap_cli::unknown_table),
        help("Run `relmap inspect` to list the declared tables")
    )]
    UnknownTable(String),

    #[error("Invalid data file: {0}")]
    #[diagnostic(code(relmap_cli::data_syntax))]
    DataSyntax(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    #[diagnostic(code(relmap_cli::invalid_data))]
    InvalidData(String),

    #[error("Invalid filter `{0}`")]
    #[diagnostic(
        code(relmap_cli::invalid_filter),
        help("Filters are written as property=value")
    )]
    InvalidFilter(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;

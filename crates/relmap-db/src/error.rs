//! Error types for relmap-db.

use miette::Diagnostic;
use relmap_core::{CoreError, Value};
use thiserror::Error;

/// Raised by query builders asked to emit a statement from incomplete state.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("No table name set for {statement} statement")]
    #[diagnostic(
        code(relmap_db::build::missing_table),
        help("Call `set_table_name` before `build`")
    )]
    MissingTable { statement: &'static str },

    #[error("No rows appended to {statement} statement")]
    #[diagnostic(code(relmap_db::build::no_rows))]
    NoRows { statement: &'static str },

    #[error("{statement} statement for table `{table}` has no columns to write")]
    #[diagnostic(
        code(relmap_db::build::no_columns),
        help("Every field was skipped as unset, non-insertable or non-updatable")
    )]
    NoColumns {
        statement: &'static str,
        table: String,
    },

    #[error("AND chain has no conditions")]
    #[diagnostic(code(relmap_db::build::no_conditions))]
    NoConditions,

    #[error("UPDATE statement for table `{table}` has no WHERE clause")]
    #[diagnostic(
        code(relmap_db::build::missing_where),
        help("Merge a condition builder with `set_where_from_query_builder`")
    )]
    MissingWhere { table: String },
}

/// Database error type for relmap-db operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    #[diagnostic(code(relmap_db::client))]
    Client(Box<dyn std::error::Error + Send + Sync>),

    #[error("Relation `{property}` on table `{table}` has no resolved remote table")]
    #[diagnostic(
        code(relmap_db::unresolved_relation),
        help("Set up the entity holding the matching many-to-one relation first")
    )]
    UnresolvedRelation { table: String, property: String },

    #[error("Entity of table `{table}` has no value for id property `{property}`")]
    #[diagnostic(code(relmap_db::missing_id))]
    MissingId { table: String, property: String },

    #[error("No stored entity of table `{table}` has id {id}")]
    #[diagnostic(
        code(relmap_db::not_found),
        help("Insert the entity before updating it")
    )]
    NotFound { table: String, id: Value },

    #[error("Count query on table `{table}` returned no `count` column")]
    #[diagnostic(code(relmap_db::missing_count))]
    MissingCount { table: String },

    #[error("Metadata for table `{table}` is incomplete: {reason}")]
    #[diagnostic(
        code(relmap_db::incomplete_metadata),
        help("Declare the table name, id property and at least one column")
    )]
    IncompleteMetadata { table: String, reason: &'static str },
}

impl DbError {
    /// Wraps an error raised by a [`DatabaseClient`](crate::client::DatabaseClient).
    pub fn client<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DbError::Client(Box::new(err))
    }
}

/// Result type alias for relmap-db operations.
pub type Result<T> = std::result::Result<T, DbError>;

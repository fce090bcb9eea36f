//! The database client boundary used by [`SqlPersister`](crate::persister::SqlPersister).

use async_trait::async_trait;
use relmap_core::Record;

use crate::{error::Result, query::Statement};

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    pub affected_rows: u64,
    /// Id generated by an `INSERT`, when the table has one.
    pub last_insert_id: Option<i64>,
}

/// Executes statements against a database.
///
/// Implementations receive the template and its arguments as built; use
/// [`Statement::render`] to obtain plain SQL with `?` value placeholders.
/// Rows are keyed by column name. Client failures are reported with
/// [`DbError::client`](crate::error::DbError::client) and reach the caller
/// unchanged.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    async fn query(&self, statement: &Statement) -> Result<Vec<Record>>;

    async fn execute(&self, statement: &Statement) -> Result<ExecuteResult>;
}

#[async_trait]
impl<C: DatabaseClient + ?Sized> DatabaseClient for std::sync::Arc<C> {
    async fn query(&self, statement: &Statement) -> Result<Vec<Record>> {
        (**self).query(statement).await
    }

    async fn execute(&self, statement: &Statement) -> Result<ExecuteResult> {
        (**self).execute(statement).await
    }
}

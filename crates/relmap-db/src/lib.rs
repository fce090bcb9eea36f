//! SQL statement builders and persistence backends for relmap entities.
//!
//! Builders emit [`Statement`]s: a template with `??` identifier and `?`
//! value placeholders plus the ordered arguments that fill them. A
//! [`Persister`] drives those builders from entity metadata, either
//! against a [`DatabaseClient`] ([`SqlPersister`]) or entirely in memory
//! ([`MemoryPersister`]).

pub mod client;
pub mod error;
pub mod persister;
pub mod query;

pub use client::{DatabaseClient, ExecuteResult};
pub use error::{BuildError, DbError, Result};
pub use persister::{MemoryPersister, Persister, SqlPersister};
pub use query::{
    AndChainFormulaBuilder, CountQueryBuilder, DeleteQueryBuilder, InsertQueryBuilder,
    QueryArg, SelectQueryBuilder, Statement, UpdateQueryBuilder, WhereFormula,
};

//! The query builders.
//!
//! Builders accumulate columns, values and conditions, then emit a
//! [`Statement`]: a template with two placeholder kinds plus one flat list of
//! arguments in emission order. `??` stands for an identifier (table or
//! column) and `?` for a bound value, so value data can never be read as an
//! identifier and the other way around.
//!
//! # Overview
//!
//! - [`InsertQueryBuilder`]: multi-row `INSERT` from entities, honoring `insertable`.
//! - [`UpdateQueryBuilder`]: `UPDATE ... SET` from one entity, honoring `updatable`.
//! - [`AndChainFormulaBuilder`]: `(t.c = ? AND ...)` fragments for `WHERE`.
//! - [`WhereFormula`]: translation of a [`relmap_core::Where`] into a fragment.
//! - [`SelectQueryBuilder`], [`CountQueryBuilder`], [`DeleteQueryBuilder`]:
//!   metadata-driven reads and deletes.
//!
//! # Example
//!
//! ```ignore
//! let mut builder = InsertQueryBuilder::new();
//! builder
//!     .set_table_prefix("app_")
//!     .set_table_name("bar")
//!     .append_entity(&bar, &metadata.fields, &metadata.temporal_properties, &["id"]);
//! let statement = builder.build()?;
//! // INSERT INTO ?? (??) VALUES (?)
//! ```

pub mod delete;
pub mod formula;
pub mod insert;
pub mod select;
pub mod statement;
pub mod update;

pub use delete::DeleteQueryBuilder;
pub use formula::{AndChainFormulaBuilder, WhereFormula};
pub use insert::InsertQueryBuilder;
pub use select::{CountQueryBuilder, SelectQueryBuilder};
pub use statement::{QueryArg, Statement};
pub use update::UpdateQueryBuilder;

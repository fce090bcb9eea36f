//! Metadata-driven object-relational mapping core.
//!
//! Entity types declare once, at program start, how their properties map to
//! table columns (see [`registry`]). The collected [`metadata::EntityMetadata`]
//! is then consulted by every persistence backend, so no per-entity
//! persistence code is written by hand.
//!
//! # Overview
//!
//! - [`value`]: the dynamic [`Value`] passed between entities and storage.
//! - [`entity`]: the [`Entity`] trait and the record-backed [`DynamicEntity`].
//! - [`metadata`]: fields, relations, callbacks and temporal markers.
//! - [`registry`]: process-wide, type-keyed metadata store.
//! - [`manager`]: table-keyed index that cross-links relations.
//! - [`tracking`]: snapshots and changed-field computation.
//! - [`filter`]: backend-neutral [`Where`] conditions and [`Sort`] orders.
//! - [`projection`]: JSON projection and cloning driven by field metadata.

pub mod entity;
pub mod error;
pub mod filter;
pub mod macros;
pub mod manager;
pub mod metadata;
pub mod projection;
pub mod registry;
pub mod tracking;
pub mod value;

pub use entity::{DynamicEntity, Entity};
pub use error::{CoreError, Result};
pub use filter::{Sort, SortDirection, Where};
pub use manager::MetadataManager;
pub use metadata::{
    CallbackPhase, EntityCallback, EntityField, EntityMetadata, EntityRelation,
    EntityRelationManyToOne, EntityRelationOneToMany, FieldKind, TemporalKind, TemporalProperty,
};
pub use registry::EntityDeclaration;
pub use tracking::{ChangeTracker, Tracked};
pub use value::{PropertyValue, Record, Value};

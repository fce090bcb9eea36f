//! The persistence contract and its backends.
//!
//! Every operation is driven by an [`EntityMetadata`]; no backend holds
//! per-entity code. Entities come back wrapped in [`Tracked`] with a fresh
//! snapshot, so a later [`Persister::update`] writes only what changed.

mod memory;
mod sql;

use async_trait::async_trait;
use relmap_core::{
    CallbackPhase, Entity, EntityMetadata, MetadataManager, Sort, Tracked, Where,
};
use relmap_utils::time::now_timestamp;

pub use memory::MemoryPersister;
pub use sql::SqlPersister;

use crate::error::{DbError, Result};

#[async_trait]
pub trait Persister: Send + Sync {
    /// Number of stored entities matching `condition` (all when `None`).
    async fn count(&self, metadata: &EntityMetadata, condition: Option<&Where>) -> Result<u64>;

    async fn exists_by(&self, metadata: &EntityMetadata, condition: Option<&Where>) -> Result<bool> {
        Ok(self.count(metadata, condition).await? > 0)
    }

    /// Removes every match and returns how many were removed. Matching
    /// nothing is not an error.
    async fn delete_all(&self, metadata: &EntityMetadata, condition: Option<&Where>)
        -> Result<u64>;

    /// Matches in insertion order, or in `sort` order when given.
    async fn find_all<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
        sort: Option<&Sort>,
    ) -> Result<Vec<Tracked<E>>>;

    /// First match, if any.
    async fn find_by<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
        sort: Option<&Sort>,
    ) -> Result<Option<Tracked<E>>>;

    /// Stores `entity` and returns it with its generated id set.
    async fn insert<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        entity: E,
    ) -> Result<Tracked<E>>;

    /// Writes the changed, updatable fields of `entity`. Without a snapshot
    /// every updatable field is written.
    async fn update<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        entity: Tracked<E>,
    ) -> Result<Tracked<E>>;

    /// Loads the entities on the many side of the one-to-many relation
    /// `property` of `owner`.
    async fn find_related<E: Entity + Clone>(
        &self,
        manager: &MetadataManager,
        metadata: &EntityMetadata,
        owner: &dyn Entity,
        property: &str,
    ) -> Result<Vec<Tracked<E>>> {
        let unresolved = || DbError::UnresolvedRelation {
            table: metadata.table_name.clone(),
            property: property.to_string(),
        };
        let relation = metadata
            .one_to_many()
            .find(|relation| relation.property_name == property)
            .ok_or_else(unresolved)?;
        let remote = manager
            .one_to_many_table(&metadata.table_name, property)
            .and_then(|table| manager.get_metadata_by_table(&table))
            .ok_or_else(unresolved)?;
        let id = entity_id(metadata, owner)?;

        let condition = Where::property_equals(relation.mapped_by.clone(), id);
        self.find_all(&remote, Some(&condition), None).await
    }
}

pub(crate) fn ensure_ready(metadata: &EntityMetadata) -> Result<()> {
    let reason = if metadata.table_name.is_empty() {
        "no table name"
    } else if metadata.id_property_name.is_empty() {
        "no id property"
    } else if metadata.fields.is_empty() {
        "no fields"
    } else {
        return Ok(());
    };
    Err(DbError::IncompleteMetadata {
        table: metadata.table_name.clone(),
        reason,
    })
}

pub(crate) fn entity_id(metadata: &EntityMetadata, entity: &dyn Entity) -> Result<relmap_core::Value> {
    entity
        .get_property(&metadata.id_property_name)
        .filter(|id| !id.is_null())
        .ok_or_else(|| DbError::MissingId {
            table: metadata.table_name.clone(),
            property: metadata.id_property_name.clone(),
        })
}

/// Date stamps and before-callbacks shared by both backends.
pub(crate) fn before_write(
    metadata: &EntityMetadata,
    entity: &mut dyn Entity,
    creating: bool,
) -> Result<()> {
    metadata.stamp_dates(entity, now_timestamp(), creating)?;
    let phase = if creating {
        CallbackPhase::BeforeInsert
    } else {
        CallbackPhase::BeforeUpdate
    };
    metadata.run_callbacks(phase, entity)?;
    Ok(())
}

/// Materializes a stored record and runs after-load callbacks.
pub(crate) fn load<E: Entity + Clone>(
    metadata: &EntityMetadata,
    record: &relmap_core::Record,
) -> Result<Tracked<E>> {
    let mut entity: E = metadata.create(record)?;
    metadata.run_callbacks(CallbackPhase::AfterLoad, &mut entity)?;
    Ok(Tracked::persisted(entity))
}

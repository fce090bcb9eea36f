//! Field-driven projection and cloning of entities.

use serde_json::{Map, Value as JsonValue};

use crate::{
    entity::Entity,
    error::Result,
    metadata::EntityMetadata,
    value::Record,
};

/// Projects the mapped properties of `entity` into a JSON object.
///
/// Unset properties are omitted rather than written as `null`.
pub fn to_json(entity: &dyn Entity, metadata: &EntityMetadata) -> Map<String, JsonValue> {
    metadata
        .fields
        .iter()
        .filter_map(|field| {
            entity
                .get_property(&field.property_name)
                .map(|value| (field.property_name.clone(), value.to_json()))
        })
        .collect()
}

/// Collects the mapped, set properties of `entity` into a record.
pub fn to_record(entity: &dyn Entity, metadata: &EntityMetadata) -> Record {
    metadata
        .fields
        .iter()
        .filter_map(|field| {
            entity
                .get_property(&field.property_name)
                .map(|value| (field.property_name.clone(), value))
        })
        .collect()
}

/// Builds a fresh instance through the metadata factory and copies every set
/// mapped property onto it.
pub fn clone_entity<E: Entity>(entity: &E, metadata: &EntityMetadata) -> Result<E> {
    let mut clone: E = metadata.create(&Record::new())?;
    for field in &metadata.fields {
        if let Some(value) = entity.get_property(&field.property_name) {
            clone.set_property(&field.property_name, value)?;
        }
    }
    Ok(clone)
}

//! Persisted-state snapshots and changed-field computation.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::{entity::Entity, metadata::EntityField};

/// An entity paired with a clone of its last persisted state.
///
/// Persisters hand out `Tracked` values from every read and write so a later
/// update can write only what changed.
#[derive(Debug, Clone)]
pub struct Tracked<E> {
    entity: E,
    last_state: Option<E>,
}

impl<E: Clone> Tracked<E> {
    /// Wraps an entity that has never been persisted.
    pub fn new(entity: E) -> Self {
        Self {
            entity,
            last_state: None,
        }
    }

    /// Wraps an entity whose current values match storage.
    pub fn persisted(entity: E) -> Self {
        let last_state = Some(entity.clone());
        Self { entity, last_state }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn into_inner(self) -> E {
        self.entity
    }
}

impl<E> Deref for Tracked<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E> DerefMut for Tracked<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.entity
    }
}

impl<E: Clone> From<E> for Tracked<E> {
    fn from(entity: E) -> Self {
        Self::new(entity)
    }
}

pub struct ChangeTracker;

impl ChangeTracker {
    /// Replaces the snapshot with a clone of the current entity.
    pub fn save_last_entity_state<E: Clone>(tracked: &mut Tracked<E>) {
        tracked.last_state = Some(tracked.entity.clone());
    }

    pub fn get_last_entity_state<E>(tracked: &Tracked<E>) -> Option<&E> {
        tracked.last_state.as_ref()
    }

    /// Updatable fields whose value differs from the snapshot.
    ///
    /// Without a snapshot every updatable field is returned.
    pub fn get_changed_fields<'a, E: Entity>(
        tracked: &Tracked<E>,
        fields: &'a [EntityField],
    ) -> Vec<&'a EntityField> {
        let updatable = fields.iter().filter(|field| field.updatable);

        let Some(last_state) = tracked.last_state.as_ref() else {
            warn!(
                entity = std::any::type_name::<E>(),
                "no persisted state snapshot, treating all updatable fields as changed"
            );
            return updatable.collect();
        };

        updatable
            .filter(|field| {
                tracked.entity.get_property(&field.property_name)
                    != last_state.get_property(&field.property_name)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entity::DynamicEntity, value::Value};

    fn fields() -> Vec<EntityField> {
        vec![
            EntityField::new("id", "id").updatable(false),
            EntityField::new("barName", "bar_name"),
            EntityField::new("tags", "tags"),
            EntityField::new("openedOn", "opened_on"),
        ]
    }

    fn bar() -> DynamicEntity {
        DynamicEntity::new()
            .with("id", 1)
            .with("barName", "Bar 123")
            .with("tags", Value::List(vec![Value::from("a")]))
    }

    #[test]
    fn test_no_changes_after_snapshot() {
        let fields = fields();
        let mut tracked = Tracked::new(bar());
        ChangeTracker::save_last_entity_state(&mut tracked);

        assert!(ChangeTracker::get_changed_fields(&tracked, &fields).is_empty());
    }

    #[test]
    fn test_changed_fields_use_deep_equality() {
        let fields = fields();
        let mut tracked = Tracked::persisted(bar());
        tracked
            .set_property("tags", Value::List(vec![Value::from("a"), Value::from("b")]))
            .unwrap();
        tracked.set_property("openedOn", Value::Null).unwrap();

        let changed: Vec<_> = ChangeTracker::get_changed_fields(&tracked, &fields)
            .into_iter()
            .map(|field| field.property_name.as_str())
            .collect();
        assert_eq!(changed, vec!["tags", "openedOn"]);
    }

    #[test]
    fn test_non_updatable_fields_never_change() {
        let fields = fields();
        let mut tracked = Tracked::persisted(bar());
        tracked.set_property("id", Value::Int(2)).unwrap();

        assert!(ChangeTracker::get_changed_fields(&tracked, &fields).is_empty());
    }

    #[test]
    fn test_missing_snapshot_returns_all_updatable() {
        let fields = fields();
        let tracked = Tracked::new(bar());
        assert!(ChangeTracker::get_last_entity_state(&tracked).is_none());

        let changed = ChangeTracker::get_changed_fields(&tracked, &fields);
        assert_eq!(changed.len(), 3);
        assert!(changed.iter().all(|field| field.updatable));
    }

    #[test]
    fn test_snapshot_is_overwritten() {
        let mut tracked = Tracked::persisted(bar());
        tracked.set_property("barName", Value::from("Bar 456")).unwrap();
        ChangeTracker::save_last_entity_state(&mut tracked);

        let last = ChangeTracker::get_last_entity_state(&tracked).unwrap();
        assert_eq!(last.get_property("barName"), Some(Value::from("Bar 456")));
    }
}

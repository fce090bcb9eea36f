use std::collections::HashMap;

use async_trait::async_trait;
use relmap_core::{
    projection::to_record, CallbackPhase, ChangeTracker, Entity, EntityMetadata, Record, Sort,
    Tracked, Value, Where,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{before_write, ensure_ready, entity_id, load, Persister};
use crate::error::{DbError, Result};

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Record>,
    last_id: i64,
}

/// In-memory persister storing each table as an ordered list of records.
///
/// Ids are assigned from a per-table sequence starting at 1. Conditions are
/// evaluated directly against the stored property values.
#[derive(Debug, Default)]
pub struct MemoryPersister {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored records of `table`, in insertion order.
    pub async fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

/// Rewrites joined-entity values to the referenced id so a condition can be
/// written with either the nested record or the bare id.
fn normalize(condition: &Where, metadata: &EntityMetadata) -> Where {
    let column_value = |property: &str, value: &Value| match metadata.field(property) {
        Some(field) => field.column_value(value.clone()),
        None => value.clone(),
    };
    match condition {
        Where::PropertyEquals { property, value } => Where::PropertyEquals {
            property: property.clone(),
            value: column_value(property, value),
        },
        Where::PropertyListEquals { property, values } => Where::PropertyListEquals {
            property: property.clone(),
            values: values.iter().map(|v| column_value(property, v)).collect(),
        },
        Where::PropertyIsNull { .. } => condition.clone(),
        Where::And(conditions) => {
            Where::And(conditions.iter().map(|c| normalize(c, metadata)).collect())
        }
        Where::Or(conditions) => {
            Where::Or(conditions.iter().map(|c| normalize(c, metadata)).collect())
        }
    }
}

fn matches(record: &Record, metadata: &EntityMetadata, condition: Option<&Where>) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    let lookup = |property: &str| {
        let value = record.get(property).cloned()?;
        Some(match metadata.field(property) {
            Some(field) => field.column_value(value),
            None => value,
        })
    };
    normalize(condition, metadata).matches_with(&lookup)
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn count(&self, metadata: &EntityMetadata, condition: Option<&Where>) -> Result<u64> {
        let tables = self.tables.read().await;
        let count = tables
            .get(&metadata.table_name)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|row| matches(row, metadata, condition))
                    .count()
            })
            .unwrap_or_default();
        Ok(count as u64)
    }

    async fn delete_all(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&metadata.table_name) else {
            return Ok(0);
        };

        let notify = metadata.has_callbacks(CallbackPhase::BeforeRemove)
            || metadata.has_callbacks(CallbackPhase::AfterRemove);
        let mut entities = Vec::new();
        if notify {
            for row in table.rows.iter().filter(|row| matches(row, metadata, condition)) {
                let mut entity = metadata.instantiate(row)?;
                metadata.run_callbacks(CallbackPhase::BeforeRemove, entity.as_mut())?;
                entities.push(entity);
            }
        }

        let before = table.rows.len();
        table.rows.retain(|row| !matches(row, metadata, condition));
        let removed = before - table.rows.len();
        drop(tables);

        for entity in &mut entities {
            metadata.run_callbacks(CallbackPhase::AfterRemove, entity.as_mut())?;
        }
        debug!(table = %metadata.table_name, removed, "deleted records");
        Ok(removed as u64)
    }

    async fn find_all<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
        sort: Option<&Sort>,
    ) -> Result<Vec<Tracked<E>>> {
        let mut rows: Vec<Record> = {
            let tables = self.tables.read().await;
            tables
                .get(&metadata.table_name)
                .map(|t| {
                    t.rows
                        .iter()
                        .filter(|row| matches(row, metadata, condition))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if let Some(sort) = sort.filter(|sort| !sort.is_empty()) {
            rows.sort_by(|a, b| {
                sort.compare(
                    &|property: &str| a.get(property).cloned(),
                    &|property: &str| b.get(property).cloned(),
                )
            });
        }

        rows.iter().map(|row| load(metadata, row)).collect()
    }

    async fn find_by<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
        sort: Option<&Sort>,
    ) -> Result<Option<Tracked<E>>> {
        let found = self.find_all(metadata, condition, sort).await?;
        Ok(found.into_iter().next())
    }

    async fn insert<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        mut entity: E,
    ) -> Result<Tracked<E>> {
        ensure_ready(metadata)?;
        before_write(metadata, &mut entity, true)?;

        {
            let mut tables = self.tables.write().await;
            let table = tables.entry(metadata.table_name.clone()).or_default();
            table.last_id += 1;
            entity.set_property(&metadata.id_property_name, Value::Int(table.last_id))?;
            table.rows.push(to_record(&entity, metadata));
            debug!(table = %metadata.table_name, id = table.last_id, "inserted record");
        }

        metadata.run_callbacks(CallbackPhase::AfterInsert, &mut entity)?;
        Ok(Tracked::persisted(entity))
    }

    async fn update<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        mut entity: Tracked<E>,
    ) -> Result<Tracked<E>> {
        ensure_ready(metadata)?;
        let id = entity_id(metadata, entity.entity())?;
        before_write(metadata, entity.entity_mut(), false)?;

        let changed = ChangeTracker::get_changed_fields(&entity, &metadata.fields);
        {
            let mut tables = self.tables.write().await;
            let row = tables.get_mut(&metadata.table_name).and_then(|t| {
                t.rows
                    .iter_mut()
                    .find(|row| row.get(&metadata.id_property_name) == Some(&id))
            });
            match row {
                Some(row) => {
                    for field in &changed {
                        match entity.get_property(&field.property_name) {
                            Some(value) => row.insert(field.property_name.clone(), value),
                            None => row.remove(&field.property_name),
                        };
                    }
                    debug!(
                        table = %metadata.table_name,
                        %id,
                        changed = changed.len(),
                        "updated record"
                    );
                }
                None => {
                    return Err(DbError::NotFound {
                        table: metadata.table_name.clone(),
                        id,
                    })
                }
            }
        }

        metadata.run_callbacks(CallbackPhase::AfterUpdate, entity.entity_mut())?;
        ChangeTracker::save_last_entity_state(&mut entity);
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relmap_core::{
        impl_entity,
        metadata::default_factory,
        DynamicEntity, EntityField, MetadataManager, SortDirection,
    };

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Bar {
        id: Option<i64>,
        bar_name: String,
        rating: Option<i64>,
    }

    impl_entity!(Bar {
        id,
        bar_name => "barName",
        rating,
    });

    fn bar_metadata() -> EntityMetadata {
        let mut metadata = EntityMetadata::new("bar");
        metadata.factory = Some(default_factory::<Bar>());
        metadata.set_id_property("id").unwrap();
        metadata.add_field(EntityField::new("id", "id")).unwrap();
        metadata
            .add_field(EntityField::new("barName", "bar_name"))
            .unwrap();
        metadata.add_field(EntityField::new("rating", "rating")).unwrap();
        metadata
    }

    fn bar(name: &str, rating: i64) -> Bar {
        Bar {
            bar_name: name.to_string(),
            rating: Some(rating),
            ..Bar::default()
        }
    }

    async fn seeded() -> (MemoryPersister, EntityMetadata) {
        let persister = MemoryPersister::new();
        let metadata = bar_metadata();
        for (name, rating) in [("Bar 123", 2), ("Bar 456", 5), ("Bar 789", 3)] {
            persister.insert(&metadata, bar(name, rating)).await.unwrap();
        }
        (persister, metadata)
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let (persister, metadata) = seeded().await;
        let fourth = persister
            .insert(&metadata, Bar { id: Some(99), ..bar("Bar 0", 1) })
            .await
            .unwrap();
        assert_eq!(fourth.id, Some(4));
        assert_eq!(persister.count(&metadata, None).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_find_all_keeps_insertion_order() {
        let (persister, metadata) = seeded().await;
        assert_eq!(persister.count(&metadata, None).await.unwrap(), 3);

        let bars: Vec<Tracked<Bar>> = persister.find_all(&metadata, None, None).await.unwrap();
        let names: Vec<_> = bars.iter().map(|b| b.bar_name.as_str()).collect();
        assert_eq!(names, vec!["Bar 123", "Bar 456", "Bar 789"]);
    }

    #[tokio::test]
    async fn test_find_all_sorted() {
        let (persister, metadata) = seeded().await;
        let sort = Sort::by("rating", SortDirection::Desc);
        let bars: Vec<Tracked<Bar>> = persister
            .find_all(&metadata, None, Some(&sort))
            .await
            .unwrap();
        let ratings: Vec<_> = bars.iter().map(|b| b.rating.unwrap()).collect();
        assert_eq!(ratings, vec![5, 3, 2]);
    }

    #[tokio::test]
    async fn test_find_by_and_exists() {
        let (persister, metadata) = seeded().await;
        let condition = Where::property_equals("barName", "Bar 456");
        let found: Tracked<Bar> = persister
            .find_by(&metadata, Some(&condition), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, Some(2));

        let missing = Where::property_equals("barName", "Bar 000");
        let none: Option<Tracked<Bar>> =
            persister.find_by(&metadata, Some(&missing), None).await.unwrap();
        assert!(none.is_none());
        assert!(!persister.exists_by(&metadata, Some(&missing)).await.unwrap());
        assert!(persister.exists_by(&metadata, Some(&condition)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_with_filter() {
        let (persister, metadata) = seeded().await;
        let condition = Where::property_list_equals("barName", ["Bar 123", "Bar 789"]);
        let removed = persister
            .delete_all(&metadata, Some(&condition))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let rest = persister.records("bar").await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].get("barName"), Some(&Value::from("Bar 456")));

        let none = Where::property_equals("barName", "nothing");
        assert_eq!(persister.delete_all(&metadata, Some(&none)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_writes_changed_fields() {
        let (persister, metadata) = seeded().await;
        let condition = Where::property_equals("id", 2);
        let mut found: Tracked<Bar> = persister
            .find_by(&metadata, Some(&condition), None)
            .await
            .unwrap()
            .unwrap();
        found.rating = Some(1);

        let updated = persister.update(&metadata, found).await.unwrap();
        assert!(ChangeTracker::get_changed_fields(&updated, &metadata.fields).is_empty());

        let stored = persister.records("bar").await;
        assert_eq!(stored[1].get("rating"), Some(&Value::Int(1)));
        assert_eq!(stored[1].get("barName"), Some(&Value::from("Bar 456")));
    }

    #[tokio::test]
    async fn test_update_clears_optional_field() {
        let (persister, metadata) = seeded().await;
        let condition = Where::property_equals("id", 3);
        let mut found: Tracked<Bar> = persister
            .find_by(&metadata, Some(&condition), None)
            .await
            .unwrap()
            .unwrap();
        found.rating = None;
        persister.update(&metadata, found).await.unwrap();

        let stored = persister.records("bar").await;
        assert_eq!(stored[2].get("rating"), None);
        let cleared = Where::property_is_null("rating");
        assert_eq!(persister.count(&metadata, Some(&cleared)).await.unwrap(), 1);

        let reloaded: Tracked<Bar> = persister
            .find_by(&metadata, Some(&condition), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.rating, None);
        assert_eq!(reloaded.bar_name, "Bar 789");
    }

    #[tokio::test]
    async fn test_update_of_missing_row_fails() {
        let (persister, metadata) = seeded().await;
        let ghost = Bar {
            id: Some(99),
            ..bar("Bar 99", 1)
        };
        let err = persister
            .update(&metadata, Tracked::new(ghost))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { id: Value::Int(99), .. }));
        assert_eq!(persister.count(&metadata, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_without_id_fails() {
        let persister = MemoryPersister::new();
        let metadata = bar_metadata();
        let err = persister
            .update(&metadata, Tracked::new(bar("Bar 1", 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::MissingId { .. }));
    }

    #[tokio::test]
    async fn test_remove_callbacks_run_per_entity() {
        let persister = MemoryPersister::new();
        let mut metadata = bar_metadata();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        metadata
            .add_callback(
                "onRemove",
                CallbackPhase::AfterRemove,
                Arc::new(move |entity: &mut dyn Entity| {
                    if let Some(name) = entity.get_property("barName") {
                        sink.lock().unwrap().push(name);
                    }
                    Ok(())
                }),
            )
            .unwrap();

        persister.insert(&metadata, bar("Bar 123", 1)).await.unwrap();
        persister.insert(&metadata, bar("Bar 456", 1)).await.unwrap();
        persister.delete_all(&metadata, None).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Value::from("Bar 123"), Value::from("Bar 456")]
        );
        assert_eq!(persister.count(&metadata, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_related_through_manager() {
        let persister = MemoryPersister::new();

        let mut cart = EntityMetadata::new("cart");
        cart.factory = Some(default_factory::<DynamicEntity>());
        cart.set_id_property("id").unwrap();
        cart.add_field(EntityField::new("id", "id")).unwrap();
        cart.add_one_to_many("items", "cart", None).unwrap();
        let cart = Arc::new(cart);

        let mut item = EntityMetadata::new("cart_items");
        item.factory = Some(default_factory::<DynamicEntity>());
        item.set_id_property("id").unwrap();
        item.add_field(EntityField::new("id", "id")).unwrap();
        item.add_field(EntityField::new("sku", "sku")).unwrap();
        item.add_field(EntityField::new("cart", "cart_id").joined(Some(Arc::clone(&cart))))
            .unwrap();
        item.add_many_to_one("cart", "cart").unwrap();
        let item = Arc::new(item);

        let manager = MetadataManager::new();
        manager.setup_entity_metadata(Arc::clone(&cart));
        manager.setup_entity_metadata(Arc::clone(&item));

        let first = persister.insert(&cart, DynamicEntity::new()).await.unwrap();
        let second = persister.insert(&cart, DynamicEntity::new()).await.unwrap();
        for (sku, owner) in [("A", &first), ("B", &second), ("C", &first)] {
            let reference = Record::new().with("id", owner.get_property("id").unwrap());
            persister
                .insert(&item, DynamicEntity::new().with("sku", sku).with("cart", reference))
                .await
                .unwrap();
        }

        let items: Vec<Tracked<DynamicEntity>> = persister
            .find_related(&manager, &cart, first.entity(), "items")
            .await
            .unwrap();
        let skus: Vec<_> = items.iter().map(|i| i.get_property("sku").unwrap()).collect();
        assert_eq!(skus, vec![Value::from("A"), Value::from("C")]);

        let unresolved: Result<Vec<Tracked<DynamicEntity>>> = persister
            .find_related(&manager, &cart, first.entity(), "wishes")
            .await;
        assert!(matches!(
            unresolved,
            Err(DbError::UnresolvedRelation { .. })
        ));
    }
}

//! Table-keyed metadata index that links one-to-many relations to the table
//! on their many-to-one side.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::{debug, warn};

use crate::metadata::{EntityMetadata, EntityRelation};

/// Indexes entity metadata by table name and resolves relation tables.
///
/// A one-to-many relation `A.items` mapped by `cart` resolves to the table of
/// any indexed entity holding a many-to-one `cart` that targets `A`'s table.
/// Resolution runs when an entity is set up (in both directions) and again on
/// lookup, so the order entities are set up in does not matter. When several
/// entities match, the one set up first wins.
#[derive(Debug, Default)]
pub struct MetadataManager {
    /// In setup order; a table set up again keeps its position.
    tables: RwLock<Vec<Arc<EntityMetadata>>>,
    resolved: RwLock<HashMap<(String, String), String>>,
}

impl MetadataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `metadata` under its table name, replacing any previous entry.
    pub fn setup_entity_metadata(&self, metadata: Arc<EntityMetadata>) {
        let table = metadata.table_name.clone();
        debug!(table = %table, "setting up entity metadata");
        {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            match tables.iter_mut().find(|entry| entry.table_name == table) {
                Some(entry) => *entry = Arc::clone(&metadata),
                None => tables.push(Arc::clone(&metadata)),
            }
        }

        let tables = self.snapshot();
        // This entity's own one-to-many relations.
        for relation in metadata.one_to_many() {
            self.resolve(&tables, &metadata, &relation.property_name);
        }
        // Earlier entities whose many side may be this one.
        for owner in tables.iter().filter(|owner| owner.table_name != table) {
            for relation in owner.one_to_many() {
                self.resolve(&tables, owner, &relation.property_name);
            }
        }
    }

    pub fn get_metadata_by_table(&self, table: &str) -> Option<Arc<EntityMetadata>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|metadata| metadata.table_name == table)
            .cloned()
    }

    /// Indexed table names, sorted.
    pub fn tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|metadata| metadata.table_name.clone())
            .collect();
        tables.sort();
        tables
    }

    /// Remote table of the one-to-many relation `property` on `table`.
    ///
    /// Returns `None` when the relation does not exist or no matching
    /// many-to-one counterpart has been indexed yet.
    pub fn one_to_many_table(&self, table: &str, property: &str) -> Option<String> {
        let key = (table.to_string(), property.to_string());
        if let Some(resolved) = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(resolved.clone());
        }

        let owner = self.get_metadata_by_table(table)?;
        let resolved = self.resolve(&self.snapshot(), &owner, property);
        if resolved.is_none() {
            warn!(table, property, "one-to-many relation has no matching many-to-one");
        }
        resolved
    }

    fn snapshot(&self) -> Vec<Arc<EntityMetadata>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn resolve(
        &self,
        tables: &[Arc<EntityMetadata>],
        owner: &EntityMetadata,
        property: &str,
    ) -> Option<String> {
        let relation = owner
            .one_to_many()
            .find(|relation| relation.property_name == property)?;

        let remote = relation.table.clone().or_else(|| {
            tables
                .iter()
                .find(|candidate| {
                    candidate.relations.iter().any(|r| match r {
                        EntityRelation::ManyToOne(many) => {
                            many.property_name == relation.mapped_by
                                && many.table == owner.table_name
                        }
                        EntityRelation::OneToMany(_) => false,
                    })
                })
                .map(|candidate| candidate.table_name.clone())
        })?;

        let key = (owner.table_name.clone(), property.to_string());
        let mut resolved = self.resolved.write().unwrap_or_else(PoisonError::into_inner);
        if resolved.get(&key) != Some(&remote) {
            debug!(
                table = %owner.table_name,
                property,
                remote = %remote,
                "resolved one-to-many relation"
            );
            resolved.insert(key, remote.clone());
        }
        Some(remote)
    }
}

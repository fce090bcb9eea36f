//! The metadata model: how one entity type maps onto its table.

use std::{fmt, sync::Arc};

use chrono::NaiveDateTime;
use relmap_utils::string::validate_identifier;
use serde::{Deserialize, Serialize};

use crate::{
    entity::Entity,
    error::{CoreError, Result},
    value::{Record, Value},
};

/// Builds an entity instance from a plain data object keyed by property name.
pub type EntityFactory = Arc<dyn Fn(&Record) -> Result<Box<dyn Entity>> + Send + Sync>;

/// Runs a lifecycle callback against an entity.
pub type CallbackHandler = Arc<dyn Fn(&mut dyn Entity) -> Result<()> + Send + Sync>;

/// Whether a field holds a plain value or a reference to another entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Value,
    JoinedEntity,
}

/// One mapped property.
#[derive(Debug, Clone)]
pub struct EntityField {
    pub property_name: String,
    pub column_name: String,
    pub column_type: Option<String>,
    pub nullable: bool,
    pub insertable: bool,
    pub updatable: bool,
    pub kind: FieldKind,
    pub metadata: Option<Arc<EntityMetadata>>,
}

impl EntityField {
    pub fn new(property_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            column_name: column_name.into(),
            column_type: None,
            nullable: true,
            insertable: true,
            updatable: true,
            kind: FieldKind::Value,
            metadata: None,
        }
    }

    pub fn column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn insertable(mut self, insertable: bool) -> Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    /// Marks the field as a reference to another entity. The nested metadata,
    /// when given, names the id property whose value is stored in the column.
    pub fn joined(mut self, metadata: Option<Arc<EntityMetadata>>) -> Self {
        self.kind = FieldKind::JoinedEntity;
        self.metadata = metadata;
        self
    }

    pub fn is_joined(&self) -> bool {
        self.kind == FieldKind::JoinedEntity
    }

    /// Reduces a property value to what is stored in the column.
    ///
    /// Joined-entity references stored as records collapse to the referenced
    /// entity's id; every other value passes through.
    pub fn column_value(&self, value: Value) -> Value {
        if !self.is_joined() {
            return value;
        }
        match value {
            Value::Record(record) => {
                let id_property = self
                    .metadata
                    .as_deref()
                    .map(|metadata| metadata.id_property_name.as_str())
                    .filter(|id| !id.is_empty())
                    .unwrap_or("id");
                record.get(id_property).cloned().unwrap_or(Value::Null)
            }
            other => other,
        }
    }

    /// Inverse of [`column_value`](Self::column_value) for joined entities
    /// that carry nested metadata: wraps a raw id in a record.
    pub fn property_value(&self, value: Value) -> Value {
        match (&self.kind, self.metadata.as_deref(), value) {
            (FieldKind::JoinedEntity, Some(metadata), value)
                if !value.is_null() && !matches!(value, Value::Record(_)) =>
            {
                Value::Record(Record::new().with(metadata.id_property_name.clone(), value))
            }
            (_, _, value) => value,
        }
    }
}

/// One-to-many relation, owned by the "one" side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRelationOneToMany {
    pub property_name: String,
    pub mapped_by: String,
    pub table: Option<String>,
}

/// Many-to-one relation: `property_name` holds a reference into `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRelationManyToOne {
    pub property_name: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRelation {
    OneToMany(EntityRelationOneToMany),
    ManyToOne(EntityRelationManyToOne),
}

impl EntityRelation {
    pub fn property_name(&self) -> &str {
        match self {
            EntityRelation::OneToMany(relation) => &relation.property_name,
            EntityRelation::ManyToOne(relation) => &relation.property_name,
        }
    }
}

/// Points in an entity's persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackPhase {
    BeforeInsert,
    AfterInsert,
    BeforeRemove,
    AfterRemove,
    BeforeUpdate,
    AfterUpdate,
    AfterLoad,
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackPhase::BeforeInsert => "before-insert",
            CallbackPhase::AfterInsert => "after-insert",
            CallbackPhase::BeforeRemove => "before-remove",
            CallbackPhase::AfterRemove => "after-remove",
            CallbackPhase::BeforeUpdate => "before-update",
            CallbackPhase::AfterUpdate => "after-update",
            CallbackPhase::AfterLoad => "after-load",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone)]
pub struct EntityCallback {
    pub property_name: String,
    pub phase: CallbackPhase,
    pub handler: CallbackHandler,
}

impl fmt::Debug for EntityCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCallback")
            .field("property_name", &self.property_name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalKind {
    Date,
    Time,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalProperty {
    pub property_name: String,
    pub kind: TemporalKind,
}

impl TemporalKind {
    /// Narrows a timestamp to this kind.
    pub fn value_at(&self, timestamp: NaiveDateTime) -> Value {
        match self {
            TemporalKind::Date => Value::Date(timestamp.date()),
            TemporalKind::Time => Value::Time(timestamp.time()),
            TemporalKind::Timestamp => Value::Timestamp(timestamp),
        }
    }
}

/// Everything known about one entity type.
///
/// Created empty the first time a declaration touches the type, then filled
/// in additively. Shared behind an `Arc` once declared.
#[derive(Clone, Default)]
pub struct EntityMetadata {
    pub table_name: String,
    pub id_property_name: String,
    pub fields: Vec<EntityField>,
    pub relations: Vec<EntityRelation>,
    pub temporal_properties: Vec<TemporalProperty>,
    pub created_date_properties: Vec<String>,
    pub updated_date_properties: Vec<String>,
    pub callbacks: Vec<EntityCallback>,
    pub factory: Option<EntityFactory>,
}

impl fmt::Debug for EntityMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMetadata")
            .field("table_name", &self.table_name)
            .field("id_property_name", &self.id_property_name)
            .field("fields", &self.fields)
            .field("relations", &self.relations)
            .field("temporal_properties", &self.temporal_properties)
            .field("created_date_properties", &self.created_date_properties)
            .field("updated_date_properties", &self.updated_date_properties)
            .field("callbacks", &self.callbacks)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

impl EntityMetadata {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// `true` once the table, id property and at least one field are declared.
    pub fn is_ready(&self) -> bool {
        !self.table_name.is_empty() && !self.id_property_name.is_empty() && !self.fields.is_empty()
    }

    pub fn field(&self, property: &str) -> Option<&EntityField> {
        self.fields.iter().find(|f| f.property_name == property)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&EntityField> {
        self.fields.iter().find(|f| f.column_name == column)
    }

    pub fn id_field(&self) -> Option<&EntityField> {
        self.field(&self.id_property_name)
    }

    pub fn temporal_kind(&self, property: &str) -> Option<TemporalKind> {
        self.temporal_properties
            .iter()
            .find(|t| t.property_name == property)
            .map(|t| t.kind)
    }

    pub fn one_to_many(&self) -> impl Iterator<Item = &EntityRelationOneToMany> {
        self.relations.iter().filter_map(|relation| match relation {
            EntityRelation::OneToMany(r) => Some(r),
            EntityRelation::ManyToOne(_) => None,
        })
    }

    pub fn many_to_one(&self) -> impl Iterator<Item = &EntityRelationManyToOne> {
        self.relations.iter().filter_map(|relation| match relation {
            EntityRelation::ManyToOne(r) => Some(r),
            EntityRelation::OneToMany(_) => None,
        })
    }

    pub fn has_callbacks(&self, phase: CallbackPhase) -> bool {
        self.callbacks.iter().any(|c| c.phase == phase)
    }

    /// Runs every callback registered for `phase`, in declaration order.
    pub fn run_callbacks(&self, phase: CallbackPhase, entity: &mut dyn Entity) -> Result<()> {
        for callback in self.callbacks.iter().filter(|c| c.phase == phase) {
            tracing::trace!(
                table = %self.table_name,
                callback = %callback.property_name,
                %phase,
                "running lifecycle callback"
            );
            (callback.handler)(entity)?;
        }
        Ok(())
    }

    /// Stamps the creation and update date properties (insert) or only the
    /// update date properties (update) with `now`.
    pub fn stamp_dates(
        &self,
        entity: &mut dyn Entity,
        now: NaiveDateTime,
        creating: bool,
    ) -> Result<()> {
        let created = self
            .created_date_properties
            .iter()
            .filter(|_| creating);
        for property in created.chain(self.updated_date_properties.iter()) {
            let kind = self
                .temporal_kind(property)
                .unwrap_or(TemporalKind::Timestamp);
            entity.set_property(property, kind.value_at(now))?;
        }
        Ok(())
    }

    /// Builds a boxed entity through the installed factory.
    pub fn instantiate(&self, record: &Record) -> Result<Box<dyn Entity>> {
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| CoreError::MissingFactory {
                table: self.table_name.clone(),
            })?;
        factory(record)
    }

    /// Builds a typed entity through the installed factory.
    pub fn create<E: Entity>(&self, record: &Record) -> Result<E> {
        self.instantiate(record)?
            .into_any()
            .downcast::<E>()
            .map(|entity| *entity)
            .map_err(|_| CoreError::EntityTypeMismatch {
                table: self.table_name.clone(),
                expected: std::any::type_name::<E>(),
            })
    }

    /// Sets the table name and installs the factory. The factory can only be
    /// installed once.
    pub fn set_table(&mut self, table_name: &str, factory: EntityFactory) -> Result<()> {
        if self.factory.is_some() {
            return Err(CoreError::FactoryAlreadyInstalled {
                table: self.table_name.clone(),
            });
        }
        self.table_name = table_name.to_string();
        self.factory = Some(factory);
        Ok(())
    }

    pub fn add_field(&mut self, field: EntityField) -> Result<()> {
        check_property(&field.property_name)?;
        if field.column_name.is_empty() {
            return Err(CoreError::EmptyColumnName {
                property: field.property_name,
            });
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn set_id_property(&mut self, property: &str) -> Result<()> {
        check_property(property)?;
        self.id_property_name = property.to_string();
        Ok(())
    }

    pub fn add_one_to_many(
        &mut self,
        property: &str,
        mapped_by: &str,
        table: Option<&str>,
    ) -> Result<()> {
        check_property(property)?;
        check_property(mapped_by)?;
        self.relations
            .push(EntityRelation::OneToMany(EntityRelationOneToMany {
                property_name: property.to_string(),
                mapped_by: mapped_by.to_string(),
                table: table.filter(|t| !t.is_empty()).map(str::to_string),
            }));
        Ok(())
    }

    pub fn add_many_to_one(&mut self, property: &str, table: &str) -> Result<()> {
        check_property(property)?;
        self.relations
            .push(EntityRelation::ManyToOne(EntityRelationManyToOne {
                property_name: property.to_string(),
                table: table.to_string(),
            }));
        Ok(())
    }

    pub fn add_temporal(&mut self, property: &str, kind: TemporalKind) -> Result<()> {
        check_property(property)?;
        self.temporal_properties.push(TemporalProperty {
            property_name: property.to_string(),
            kind,
        });
        Ok(())
    }

    pub fn add_created_date(&mut self, property: &str) -> Result<()> {
        check_property(property)?;
        self.created_date_properties.push(property.to_string());
        Ok(())
    }

    pub fn add_updated_date(&mut self, property: &str) -> Result<()> {
        check_property(property)?;
        self.updated_date_properties.push(property.to_string());
        Ok(())
    }

    pub fn add_callback(
        &mut self,
        property: &str,
        phase: CallbackPhase,
        handler: CallbackHandler,
    ) -> Result<()> {
        check_property(property)?;
        self.callbacks.push(EntityCallback {
            property_name: property.to_string(),
            phase,
            handler,
        });
        Ok(())
    }
}

fn check_property(property: &str) -> Result<()> {
    validate_identifier(property).map_err(|err| CoreError::invalid_property(property, err))
}

/// Factory for entities that start from `Default` and receive every record
/// entry through [`Entity::set_property`].
pub fn default_factory<E: Entity + Default>() -> EntityFactory {
    Arc::new(|record: &Record| {
        let mut entity = E::default();
        for (property, value) in record.iter() {
            entity.set_property(property, value.clone())?;
        }
        Ok(Box::new(entity) as Box<dyn Entity>)
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::entity::DynamicEntity;

    fn cart_metadata() -> EntityMetadata {
        let mut metadata = EntityMetadata::new("cart");
        metadata.id_property_name = "id".to_string();
        metadata.fields.push(EntityField::new("id", "id").insertable(false));
        metadata.fields.push(EntityField::new("createdAt", "created_at"));
        metadata.temporal_properties.push(TemporalProperty {
            property_name: "createdAt".to_string(),
            kind: TemporalKind::Date,
        });
        metadata.created_date_properties.push("createdAt".to_string());
        metadata.factory = Some(default_factory::<DynamicEntity>());
        metadata
    }

    #[test]
    fn test_field_defaults() {
        let field = EntityField::new("barName", "bar_name");
        assert!(field.nullable);
        assert!(field.insertable);
        assert!(field.updatable);
        assert_eq!(field.kind, FieldKind::Value);
    }

    #[test]
    fn test_joined_column_value() {
        let mut cart = EntityMetadata::new("cart");
        cart.id_property_name = "cartId".to_string();
        let field = EntityField::new("cart", "cart_id").joined(Some(Arc::new(cart)));

        let reference = Value::Record(Record::new().with("cartId", 9));
        assert_eq!(field.column_value(reference), Value::Int(9));
        assert_eq!(field.column_value(Value::Int(4)), Value::Int(4));
        assert_eq!(
            field.property_value(Value::Int(4)),
            Value::Record(Record::new().with("cartId", 4))
        );
        assert_eq!(field.property_value(Value::Null), Value::Null);
    }

    #[test]
    fn test_stamp_dates_respects_temporal_kind() {
        let metadata = cart_metadata();
        let mut entity = DynamicEntity::new();
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        metadata.stamp_dates(&mut entity, now, false).unwrap();
        assert_eq!(entity.get_property("createdAt"), None);

        metadata.stamp_dates(&mut entity, now, true).unwrap();
        assert_eq!(
            entity.get_property("createdAt"),
            Some(Value::Date(now.date()))
        );
    }

    #[test]
    fn test_create_downcasts_through_factory() {
        let metadata = cart_metadata();
        let entity: DynamicEntity = metadata
            .create(&Record::new().with("id", 3))
            .unwrap();
        assert_eq!(entity.get_property("id"), Some(Value::Int(3)));

        #[derive(Debug)]
        struct Other;
        crate::impl_entity!(Other {});
        assert!(matches!(
            metadata.create::<Other>(&Record::new()),
            Err(CoreError::EntityTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_mutators_validate_property_names() {
        let mut metadata = EntityMetadata::default();
        assert!(matches!(
            metadata.add_field(EntityField::new("bar-name", "bar_name")),
            Err(CoreError::InvalidPropertyName { .. })
        ));
        assert!(matches!(
            metadata.add_field(EntityField::new("barName", "")),
            Err(CoreError::EmptyColumnName { .. })
        ));
        assert!(metadata.set_id_property("1id").is_err());
        assert!(metadata.add_one_to_many("items", "cart", Some("")).is_ok());
        assert!(metadata.fields.is_empty());

        let relation = metadata.one_to_many().next().unwrap();
        assert_eq!(relation.table, None);
    }

    #[test]
    fn test_factory_installed_once() {
        let mut metadata = cart_metadata();
        let err = metadata
            .set_table("cart", default_factory::<DynamicEntity>())
            .unwrap_err();
        assert!(matches!(err, CoreError::FactoryAlreadyInstalled { .. }));
    }

    #[test]
    fn test_missing_factory() {
        let metadata = EntityMetadata::new("bar");
        assert!(matches!(
            metadata.instantiate(&Record::new()),
            Err(CoreError::MissingFactory { .. })
        ));
    }
}

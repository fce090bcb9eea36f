//! Process-wide entity metadata registry.
//!
//! Metadata is keyed by the entity's [`TypeId`] and filled in by explicit
//! registration calls run once at program start, usually through
//! [`EntityDeclaration`]:
//!
//! ```ignore
//! EntityDeclaration::<CartItem>::new("cart_items")
//!     .id("id")
//!     .column(EntityField::new("id", "id").insertable(false))
//!     .column(EntityField::new("cart", "cart_id").joined(None))
//!     .many_to_one::<Cart>("cart")
//!     .declare()?;
//! ```

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    marker::PhantomData,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use tracing::trace;

use crate::{
    entity::Entity,
    error::{CoreError, Result},
    metadata::{
        default_factory, CallbackHandler, CallbackPhase, EntityFactory, EntityField,
        EntityMetadata, TemporalKind,
    },
};

static REGISTRY: LazyLock<RwLock<HashMap<TypeId, Arc<EntityMetadata>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Returns the metadata registered for `E`, if any registration touched it.
pub fn get_metadata<E: Entity>() -> Option<Arc<EntityMetadata>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&TypeId::of::<E>())
        .cloned()
}

/// Runs `mutator` on the metadata for `E`, starting from empty metadata if
/// none exists yet. The result is stored only if the mutator succeeds.
pub fn update_metadata<E, F>(mutator: F) -> Result<Arc<EntityMetadata>>
where
    E: Entity,
    F: FnOnce(&mut EntityMetadata) -> Result<()>,
{
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    let mut metadata = registry
        .get(&TypeId::of::<E>())
        .map(|current| EntityMetadata::clone(current))
        .unwrap_or_default();

    mutator(&mut metadata)?;

    let metadata = Arc::new(metadata);
    registry.insert(TypeId::of::<E>(), Arc::clone(&metadata));
    trace!(
        entity = type_name::<E>(),
        table = %metadata.table_name,
        fields = metadata.fields.len(),
        "updated entity metadata"
    );
    Ok(metadata)
}

/// Sets the table name and installs a `Default`-based factory.
pub fn register_table<E: Entity + Default>(table_name: &str) -> Result<()> {
    register_table_with::<E>(table_name, default_factory::<E>())
}

pub fn register_table_with<E: Entity>(table_name: &str, factory: EntityFactory) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.set_table(table_name, factory)).map(drop)
}

pub fn register_column<E: Entity>(field: EntityField) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.add_field(field)).map(drop)
}

pub fn register_id<E: Entity>(property: &str) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.set_id_property(property)).map(drop)
}

pub fn register_one_to_many<E: Entity>(
    property: &str,
    mapped_by: &str,
    table: Option<&str>,
) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.add_one_to_many(property, mapped_by, table))
        .map(drop)
}

/// Appends a many-to-one relation whose table is read from the target's
/// metadata.
pub fn register_many_to_one<E: Entity, T: Entity>(property: &str) -> Result<()> {
    let table = get_metadata::<T>()
        .map(|target| target.table_name.clone())
        .filter(|table| !table.is_empty())
        .ok_or_else(|| CoreError::MissingTargetTable {
            property: property.to_string(),
            target: type_name::<T>(),
        })?;
    register_many_to_one_table::<E>(property, &table)
}

pub fn register_many_to_one_table<E: Entity>(property: &str, table: &str) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.add_many_to_one(property, table)).map(drop)
}

pub fn register_temporal<E: Entity>(property: &str, kind: TemporalKind) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.add_temporal(property, kind)).map(drop)
}

pub fn register_created_date<E: Entity>(property: &str) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.add_created_date(property)).map(drop)
}

pub fn register_updated_date<E: Entity>(property: &str) -> Result<()> {
    update_metadata::<E, _>(|metadata| metadata.add_updated_date(property)).map(drop)
}

/// Registers a typed lifecycle callback. `property` names the callback for
/// diagnostics.
pub fn register_callback<E, F>(property: &str, phase: CallbackPhase, callback: F) -> Result<()>
where
    E: Entity,
    F: Fn(&mut E) -> Result<()> + Send + Sync + 'static,
{
    let handler = erase_callback(property, callback);
    update_metadata::<E, _>(|metadata| metadata.add_callback(property, phase, handler)).map(drop)
}

fn erase_callback<E, F>(property: &str, callback: F) -> CallbackHandler
where
    E: Entity,
    F: Fn(&mut E) -> Result<()> + Send + Sync + 'static,
{
    let property = property.to_string();
    Arc::new(move |entity: &mut dyn Entity| {
        let entity = entity.as_any_mut().downcast_mut::<E>().ok_or_else(|| {
            CoreError::CallbackFailed {
                property: property.clone(),
                reason: format!("entity is not a `{}`", type_name::<E>()),
            }
        })?;
        callback(entity)
    })
}

type Step = Box<dyn FnOnce() -> Result<()>>;

/// Fluent declaration of one entity type.
///
/// Steps are recorded in call order and applied by [`declare`](Self::declare),
/// which stops at the first failing step.
pub struct EntityDeclaration<E: Entity> {
    steps: Vec<Step>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity + Default> EntityDeclaration<E> {
    pub fn new(table_name: &str) -> Self {
        Self::with_factory(table_name, default_factory::<E>())
    }
}

impl<E: Entity> EntityDeclaration<E> {
    pub fn with_factory(table_name: &str, factory: EntityFactory) -> Self {
        let table_name = table_name.to_string();
        Self {
            steps: Vec::new(),
            _entity: PhantomData,
        }
        .step(move || register_table_with::<E>(&table_name, factory))
    }

    fn step(mut self, step: impl FnOnce() -> Result<()> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn id(self, property: &str) -> Self {
        let property = property.to_string();
        self.step(move || register_id::<E>(&property))
    }

    pub fn column(self, field: EntityField) -> Self {
        self.step(move || register_column::<E>(field))
    }

    pub fn one_to_many(self, property: &str, mapped_by: &str) -> Self {
        let (property, mapped_by) = (property.to_string(), mapped_by.to_string());
        self.step(move || register_one_to_many::<E>(&property, &mapped_by, None))
    }

    pub fn one_to_many_table(self, property: &str, mapped_by: &str, table: &str) -> Self {
        let (property, mapped_by, table) =
            (property.to_string(), mapped_by.to_string(), table.to_string());
        self.step(move || register_one_to_many::<E>(&property, &mapped_by, Some(&table)))
    }

    pub fn many_to_one<T: Entity>(self, property: &str) -> Self {
        let property = property.to_string();
        self.step(move || register_many_to_one::<E, T>(&property))
    }

    pub fn many_to_one_table(self, property: &str, table: &str) -> Self {
        let (property, table) = (property.to_string(), table.to_string());
        self.step(move || register_many_to_one_table::<E>(&property, &table))
    }

    pub fn temporal(self, property: &str, kind: TemporalKind) -> Self {
        let property = property.to_string();
        self.step(move || register_temporal::<E>(&property, kind))
    }

    pub fn created_date(self, property: &str) -> Self {
        let property = property.to_string();
        self.step(move || register_created_date::<E>(&property))
    }

    pub fn updated_date(self, property: &str) -> Self {
        let property = property.to_string();
        self.step(move || register_updated_date::<E>(&property))
    }

    pub fn callback<F>(self, property: &str, phase: CallbackPhase, callback: F) -> Self
    where
        F: Fn(&mut E) -> Result<()> + Send + Sync + 'static,
    {
        let property = property.to_string();
        self.step(move || register_callback::<E, F>(&property, phase, callback))
    }

    /// Applies every recorded step and returns the resulting metadata.
    pub fn declare(self) -> Result<Arc<EntityMetadata>> {
        for step in self.steps {
            step()?;
        }
        update_metadata::<E, _>(|_| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::{impl_entity, value::Value};

    #[derive(Debug, Default, Clone)]
    struct Cart {
        id: Option<i64>,
        label: Option<String>,
    }

    impl_entity!(Cart { id, label });

    #[derive(Debug, Default, Clone)]
    struct CartItem {
        id: Option<i64>,
        cart: Option<Value>,
        touched: u32,
    }

    impl_entity!(CartItem { id, cart, touched });

    #[derive(Debug, Default, Clone)]
    struct Orphan {
        id: Option<i64>,
    }

    impl_entity!(Orphan { id });

    #[derive(Debug, Default, Clone)]
    struct Unnamed {
        id: Option<i64>,
    }

    impl_entity!(Unnamed { id });

    #[test]
    #[serial]
    fn test_declaration_builds_metadata() {
        EntityDeclaration::<Cart>::new("cart")
            .id("id")
            .column(EntityField::new("id", "id").insertable(false))
            .column(EntityField::new("label", "label"))
            .one_to_many("items", "cart")
            .declare()
            .unwrap();

        let metadata = EntityDeclaration::<CartItem>::new("cart_items")
            .id("id")
            .column(EntityField::new("id", "id"))
            .column(EntityField::new("cart", "cart_id").joined(get_metadata::<Cart>()))
            .many_to_one::<Cart>("cart")
            .callback("touch", CallbackPhase::BeforeInsert, |item: &mut CartItem| {
                item.touched += 1;
                Ok(())
            })
            .declare()
            .unwrap();

        assert_eq!(metadata.table_name, "cart_items");
        assert_eq!(metadata.id_property_name, "id");
        assert_eq!(metadata.fields.len(), 2);
        let relation = metadata.many_to_one().next().unwrap();
        assert_eq!(relation.table, "cart");

        let mut item = CartItem::default();
        metadata
            .run_callbacks(CallbackPhase::BeforeInsert, &mut item)
            .unwrap();
        assert_eq!(item.touched, 1);

        let cart = get_metadata::<Cart>().unwrap();
        assert_eq!(cart.one_to_many().count(), 1);
    }

    #[test]
    #[serial]
    fn test_many_to_one_requires_target_table() {
        let err = register_many_to_one::<Orphan, Unnamed>("parent").unwrap_err();
        assert!(matches!(err, CoreError::MissingTargetTable { .. }));
    }

    #[test]
    #[serial]
    fn test_failed_registration_is_not_stored() {
        let err = register_column::<Unnamed>(EntityField::new("not valid", "col")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPropertyName { .. }));
        assert!(get_metadata::<Unnamed>().is_none());
    }

    #[test]
    #[serial]
    fn test_callback_rejects_foreign_entity() {
        let handler = erase_callback("touch", |item: &mut CartItem| {
            item.touched += 1;
            Ok(())
        });
        let mut cart = Cart::default();
        let err = handler(&mut cart).unwrap_err();
        assert!(matches!(err, CoreError::CallbackFailed { .. }));
    }
}

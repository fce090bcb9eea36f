//! The entity boundary.
//!
//! Persistence code never touches entity fields directly. It reads and writes
//! properties by name through [`Entity`], which plain structs get from the
//! [`impl_entity!`](crate::impl_entity) macro.

use std::{any::Any, fmt};

use crate::{
    error::Result,
    value::{Record, Value},
};

/// An application data object whose properties are mapped to columns.
pub trait Entity: Any + Send + Sync + fmt::Debug {
    /// Reads a property. `None` means the property is unset.
    fn get_property(&self, property: &str) -> Option<Value>;

    /// Writes a property, converting the value to the field's type.
    fn set_property(&mut self, property: &str, value: Value) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// An entity backed by a [`Record`].
///
/// Used for schemas declared at runtime (for example from a schema file),
/// where there is no Rust struct per table. Any property name is accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicEntity {
    values: Record,
}

impl DynamicEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(values: Record) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn into_record(self) -> Record {
        self.values
    }

    pub fn with(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.values.insert(property, value);
        self
    }
}

impl Entity for DynamicEntity {
    fn get_property(&self, property: &str) -> Option<Value> {
        self.values.get(property).cloned()
    }

    fn set_property(&mut self, property: &str, value: Value) -> Result<()> {
        self.values.insert(property, value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_entity_properties() {
        let mut entity = DynamicEntity::new().with("barName", "Bar 123");
        assert_eq!(entity.get_property("barName"), Some(Value::from("Bar 123")));
        assert_eq!(entity.get_property("missing"), None);

        entity.set_property("count", Value::Int(2)).unwrap();
        assert_eq!(entity.values().len(), 2);
    }

    #[test]
    fn test_dynamic_entity_downcast() {
        let boxed: Box<dyn Entity> = Box::new(DynamicEntity::new().with("id", 1));
        let entity = boxed.into_any().downcast::<DynamicEntity>().unwrap();
        assert_eq!(entity.get_property("id"), Some(Value::Int(1)));
    }
}

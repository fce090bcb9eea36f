//! Macros for mapping plain structs onto the [`Entity`](crate::Entity) trait.

/// Implements [`Entity`](crate::Entity) for a struct by listing the fields
/// that are exposed as properties.
///
/// Every listed field's type must implement
/// [`PropertyValue`](crate::PropertyValue). The property name is the field
/// name unless a string literal is given with `=>`.
///
/// # Syntax
///
/// ```ignore
/// impl_entity!(Bar {
///     id,
///     bar_name => "barName",
///     opened_on,
/// });
/// ```
///
/// This expands to an `Entity` impl whose `get_property("barName")` reads
/// `self.bar_name` and whose `set_property` converts the incoming
/// [`Value`](crate::Value) back into the field's type.
#[macro_export]
macro_rules! impl_entity {
    (
        $entity:ident {
            $($field:ident $(=> $property:literal)?),* $(,)?
        }
    ) => {
        impl $crate::entity::Entity for $entity {
            fn get_property(&self, property: &str) -> Option<$crate::value::Value> {
                match property {
                    $(
                        $crate::impl_entity!(@name $field $(, $property)?) => {
                            $crate::value::PropertyValue::to_value(&self.$field)
                        }
                    )*
                    _ => None,
                }
            }

            fn set_property(
                &mut self,
                property: &str,
                value: $crate::value::Value,
            ) -> $crate::error::Result<()> {
                match property {
                    $(
                        $crate::impl_entity!(@name $field $(, $property)?) => {
                            self.$field = $crate::value::PropertyValue::from_value(value)?;
                            Ok(())
                        }
                    )*
                    _ => Err($crate::error::CoreError::UnknownProperty {
                        entity: stringify!($entity),
                        property: property.to_string(),
                    }),
                }
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn into_any(self: Box<Self>) -> Box<dyn ::std::any::Any> {
                self
            }
        }
    };

    (@name $field:ident, $property:literal) => {
        $property
    };

    (@name $field:ident) => {
        stringify!($field)
    };
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::{entity::Entity, error::CoreError, value::Value};

    #[derive(Debug, Default, Clone)]
    struct Bar {
        id: Option<i64>,
        bar_name: String,
        opened_on: Option<NaiveDate>,
    }

    crate::impl_entity!(Bar {
        id,
        bar_name => "barName",
        opened_on,
    });

    #[test]
    fn test_generated_getters() {
        let bar = Bar {
            id: None,
            bar_name: "Bar 123".to_string(),
            opened_on: NaiveDate::from_ymd_opt(2021, 6, 1),
        };

        assert_eq!(bar.get_property("id"), None);
        assert_eq!(bar.get_property("barName"), Some(Value::from("Bar 123")));
        assert_eq!(
            bar.get_property("opened_on"),
            Some(Value::Date(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()))
        );
        assert_eq!(bar.get_property("bar_name"), None);
    }

    #[test]
    fn test_generated_setters() {
        let mut bar = Bar::default();
        bar.set_property("id", Value::Int(7)).unwrap();
        bar.set_property("barName", Value::from("Bar 456")).unwrap();
        assert_eq!(bar.id, Some(7));
        assert_eq!(bar.bar_name, "Bar 456");

        let err = bar.set_property("nope", Value::Null).unwrap_err();
        assert!(matches!(err, CoreError::UnknownProperty { entity: "Bar", .. }));

        let err = bar.set_property("barName", Value::Int(1)).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }
}

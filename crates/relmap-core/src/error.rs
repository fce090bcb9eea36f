//! Error types for relmap-core.

use miette::Diagnostic;
use relmap_utils::error::{IdentifierError, TemporalError};
use thiserror::Error;

/// Errors raised while declaring entities or moving values in and out of them.
#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Invalid property name `{property}`: {source}")]
    #[diagnostic(
        code(relmap_core::invalid_property_name),
        help("Property names must be plain identifiers such as `barName` or `cart_id`")
    )]
    InvalidPropertyName {
        property: String,
        #[source]
        source: IdentifierError,
    },

    #[error("Column name for property `{property}` is empty")]
    #[diagnostic(code(relmap_core::empty_column_name))]
    EmptyColumnName { property: String },

    #[error("Relation target `{target}` of property `{property}` has no table name")]
    #[diagnostic(
        code(relmap_core::missing_target_table),
        help("Declare the target entity's table before declaring relations that point at it")
    )]
    MissingTargetTable {
        property: String,
        target: &'static str,
    },

    #[error("Entity factory for table `{table}` is already installed")]
    #[diagnostic(
        code(relmap_core::factory_already_installed),
        help("A table and its factory can only be declared once per entity type")
    )]
    FactoryAlreadyInstalled { table: String },

    #[error("No entity factory installed for table `{table}`")]
    #[diagnostic(
        code(relmap_core::missing_factory),
        help("Declare the entity with `EntityDeclaration::new` or `register_table` first")
    )]
    MissingFactory { table: String },

    #[error("Entity for table `{table}` is not a `{expected}`")]
    #[diagnostic(code(relmap_core::entity_type_mismatch))]
    EntityTypeMismatch {
        table: String,
        expected: &'static str,
    },

    #[error("Unknown property `{property}` on `{entity}`")]
    #[diagnostic(code(relmap_core::unknown_property))]
    UnknownProperty {
        entity: &'static str,
        property: String,
    },

    #[error("Expected a {expected} value but found {found}")]
    #[diagnostic(code(relmap_core::type_mismatch))]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value out of range for {target}: {value}")]
    #[diagnostic(code(relmap_core::out_of_range))]
    OutOfRange { target: &'static str, value: String },

    #[error(transparent)]
    #[diagnostic(code(relmap_core::temporal))]
    Temporal(#[from] TemporalError),

    #[error("Callback `{property}` failed: {reason}")]
    #[diagnostic(code(relmap_core::callback))]
    CallbackFailed { property: String, reason: String },
}

impl CoreError {
    pub fn invalid_property(property: &str, source: IdentifierError) -> Self {
        Self::InvalidPropertyName {
            property: property.to_string(),
            source,
        }
    }
}

/// Result type alias for relmap-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_property_display() {
        let err = CoreError::invalid_property("", IdentifierError::Empty);
        assert_eq!(
            err.to_string(),
            "Invalid property name ``: Identifier is empty"
        );
    }

    #[test]
    fn test_missing_target_table_display() {
        let err = CoreError::MissingTargetTable {
            property: "cart".to_string(),
            target: "Cart",
        };
        assert_eq!(
            err.to_string(),
            "Relation target `Cart` of property `cart` has no table name"
        );
    }
}

//! Declarative schema files.
//!
//! A schema file declares entities as TOML tables:
//!
//! ```toml
//! [[entity]]
//! table = "cart"
//! id = "id"
//! updated_date = ["updatedAt"]
//!
//! [[entity.column]]
//! property = "id"
//!
//! [[entity.column]]
//! property = "updatedAt"
//! column = "updated_at"
//! temporal = "timestamp"
//!
//! [[entity.one_to_many]]
//! property = "items"
//! mapped_by = "cart"
//! ```
//!
//! Entities declared this way have no Rust type, so they are backed by
//! [`DynamicEntity`] and their metadata is built directly instead of going
//! through the type registry.

use std::{collections::HashMap, path::Path, sync::Arc};

use relmap_core::{
    metadata::default_factory, DynamicEntity, EntityField, EntityMetadata, MetadataManager,
    Record, TemporalKind, Value,
};
use relmap_utils::{
    string::validate_identifier,
    time::{parse_date, parse_time, parse_timestamp},
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{CliError, CliResult},
    utils::read_file,
};

#[derive(Debug, Default, Deserialize)]
pub struct SchemaFile {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntitySchema>,
}

#[derive(Debug, Deserialize)]
pub struct EntitySchema {
    pub table: String,

    #[serde(default = "default_id")]
    pub id: String,

    #[serde(default, rename = "column")]
    pub columns: Vec<ColumnSchema>,

    #[serde(default)]
    pub one_to_many: Vec<OneToManySchema>,

    #[serde(default)]
    pub many_to_one: Vec<ManyToOneSchema>,

    #[serde(default)]
    pub created_date: Vec<String>,

    #[serde(default)]
    pub updated_date: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnSchema {
    pub property: String,

    /// Defaults to the property name.
    pub column: Option<String>,

    pub column_type: Option<String>,

    #[serde(default = "enabled")]
    pub nullable: bool,

    #[serde(default = "enabled")]
    pub insertable: bool,

    #[serde(default = "enabled")]
    pub updatable: bool,

    pub temporal: Option<TemporalKind>,

    /// Table of the entity this column references.
    pub joined: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OneToManySchema {
    pub property: String,
    pub mapped_by: String,
    pub table: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManyToOneSchema {
    pub property: String,
    pub table: String,
}

fn default_id() -> String {
    "id".to_string()
}

fn enabled() -> bool {
    true
}

impl SchemaFile {
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = read_file(path)?;
        let schema = Self::parse(&content)?;
        debug!(
            "loaded {} entities from {}",
            schema.entities.len(),
            path.display()
        );
        Ok(schema)
    }

    pub fn parse(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the metadata of every declared entity, keyed by table.
    ///
    /// Joined columns receive the referenced entity's metadata, so the
    /// referenced table may be declared anywhere in the file.
    pub fn build(&self) -> CliResult<HashMap<String, Arc<EntityMetadata>>> {
        let mut built: HashMap<String, EntityMetadata> = HashMap::new();
        for entity in &self.entities {
            let metadata = entity.build()?;
            if built.insert(entity.table.clone(), metadata).is_some() {
                return Err(CliError::InvalidSchema(format!(
                    "table `{}` is declared twice",
                    entity.table
                )));
            }
        }

        let snapshot = built.clone();
        for entity in &self.entities {
            for column in &entity.columns {
                let Some(target) = column.joined.as_deref() else {
                    continue;
                };
                let nested = snapshot
                    .get(target)
                    .cloned()
                    .ok_or_else(|| CliError::UnknownTable(target.to_string()))?;
                if let Some(field) = built
                    .get_mut(&entity.table)
                    .and_then(|metadata| {
                        metadata
                            .fields
                            .iter_mut()
                            .find(|field| field.property_name == column.property)
                    })
                {
                    field.metadata = Some(Arc::new(nested));
                }
            }
        }

        Ok(built
            .into_iter()
            .map(|(table, metadata)| (table, Arc::new(metadata)))
            .collect())
    }

    /// Builds all entities and indexes them in a fresh manager.
    pub fn manager(&self) -> CliResult<MetadataManager> {
        let mut built = self.build()?;
        let manager = MetadataManager::new();
        for entity in &self.entities {
            if let Some(metadata) = built.remove(&entity.table) {
                manager.setup_entity_metadata(metadata);
            }
        }
        Ok(manager)
    }
}

impl EntitySchema {
    fn build(&self) -> CliResult<EntityMetadata> {
        validate_identifier(&self.table).map_err(|err| {
            CliError::InvalidSchema(format!("table `{}`: {err}", self.table))
        })?;

        let mut metadata = EntityMetadata::default();
        metadata.set_table(&self.table, default_factory::<DynamicEntity>())?;
        metadata.set_id_property(&self.id)?;

        for column in &self.columns {
            let mut field = EntityField::new(
                column.property.as_str(),
                column.column.as_deref().unwrap_or(&column.property),
            )
            .nullable(column.nullable)
            .insertable(column.insertable)
            .updatable(column.updatable);
            if let Some(column_type) = &column.column_type {
                field = field.column_type(column_type.as_str());
            }
            if column.joined.is_some() {
                field = field.joined(None);
            }
            metadata.add_field(field)?;

            if let Some(kind) = column.temporal {
                metadata.add_temporal(&column.property, kind)?;
            }
        }

        for relation in &self.one_to_many {
            metadata.add_one_to_many(
                &relation.property,
                &relation.mapped_by,
                relation.table.as_deref(),
            )?;
        }
        for relation in &self.many_to_one {
            metadata.add_many_to_one(&relation.property, &relation.table)?;
        }
        // A joined column implies a many-to-one onto the referenced table.
        for column in &self.columns {
            let Some(target) = column.joined.as_deref() else {
                continue;
            };
            match self
                .many_to_one
                .iter()
                .find(|relation| relation.property == column.property)
            {
                Some(relation) if relation.table != target => {
                    return Err(CliError::InvalidSchema(format!(
                        "column `{}` of `{}` joins `{target}` but its many-to-one targets `{}`",
                        column.property, self.table, relation.table
                    )));
                }
                Some(_) => {}
                None => metadata.add_many_to_one(&column.property, target)?,
            }
        }
        for property in &self.created_date {
            metadata.add_created_date(property)?;
        }
        for property in &self.updated_date {
            metadata.add_updated_date(property)?;
        }

        if metadata.id_field().is_none() {
            return Err(CliError::InvalidSchema(format!(
                "table `{}` has no column for its id property `{}`",
                self.table, self.id
            )));
        }

        Ok(metadata)
    }
}

/// Reads a data file holding one JSON object or an array of them.
pub fn read_rows(path: &Path, metadata: &EntityMetadata) -> CliResult<Vec<DynamicEntity>> {
    let content = read_file(path)?;
    parse_rows(&content, metadata)
}

pub fn parse_rows(content: &str, metadata: &EntityMetadata) -> CliResult<Vec<DynamicEntity>> {
    let objects = match serde_json::from_str::<serde_json::Value>(content)? {
        serde_json::Value::Array(items) => items,
        object @ serde_json::Value::Object(_) => vec![object],
        other => {
            return Err(CliError::InvalidData(format!(
                "expected an object or an array of objects, found {other}"
            )))
        }
    };

    objects
        .into_iter()
        .map(|object| match Value::from(object) {
            Value::Record(record) => row_entity(record, metadata),
            other => Err(CliError::InvalidData(format!(
                "expected an object, found {}",
                other.type_name()
            ))),
        })
        .collect()
}

/// Turns temporal text into temporal values and rejects unmapped properties.
fn row_entity(record: Record, metadata: &EntityMetadata) -> CliResult<DynamicEntity> {
    let mut values = Record::new();
    for (property, value) in record {
        if metadata.field(&property).is_none() {
            return Err(CliError::InvalidData(format!(
                "`{property}` is not mapped on `{}`",
                metadata.table_name
            )));
        }
        let value = match (metadata.temporal_kind(&property), value) {
            (Some(kind), Value::Text(text)) => parse_temporal(kind, &text)?,
            (_, value) => value,
        };
        values.insert(property, value);
    }
    Ok(DynamicEntity::from_record(values))
}

fn parse_temporal(kind: TemporalKind, text: &str) -> CliResult<Value> {
    let value = match kind {
        TemporalKind::Date => parse_date(text).map(Value::Date),
        TemporalKind::Time => parse_time(text).map(Value::Time),
        TemporalKind::Timestamp => parse_timestamp(text).map(Value::Timestamp),
    };
    value.map_err(|err| CliError::InvalidData(err.to_string()))
}

/// Parses a `property=value` filter. The value is read as JSON when it
/// parses, as text otherwise.
pub fn parse_filter(filter: &str) -> CliResult<(String, Value)> {
    let Some((property, raw)) = filter.split_once('=') else {
        return Err(CliError::InvalidFilter(filter.to_string()));
    };
    let property = property.trim();
    if property.is_empty() {
        return Err(CliError::InvalidFilter(filter.to_string()));
    }
    let raw = raw.trim();
    let value = serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::Text(raw.to_string()));
    Ok((property.to_string(), value))
}

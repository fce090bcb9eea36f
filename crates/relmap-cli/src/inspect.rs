use nu_ansi_term::Color::{Blue, Cyan, Green, Yellow};
use relmap_core::{EntityMetadata, EntityRelation, MetadataManager};
use serde_json::json;
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::info;

use crate::{
    error::{CliError, CliResult},
    utils::{yes_no, Colored},
};

pub fn inspect_schema(manager: &MetadataManager, table: Option<&str>, json: bool) -> CliResult<()> {
    let tables = match table {
        Some(table) => {
            if manager.get_metadata_by_table(table).is_none() {
                return Err(CliError::UnknownTable(table.to_string()));
            }
            vec![table.to_string()]
        }
        None => manager.tables(),
    };

    let entities = tables
        .iter()
        .filter_map(|table| manager.get_metadata_by_table(table));

    if json {
        let output: Vec<serde_json::Value> = entities
            .map(|metadata| metadata_json(manager, &metadata))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for metadata in entities {
        info!("\n{}", fields_table(&metadata));
        if !metadata.relations.is_empty() {
            info!("{}", relations_table(manager, &metadata));
        }
    }
    Ok(())
}

fn fields_table(metadata: &EntityMetadata) -> String {
    let mut builder = Builder::new();
    builder.push_record(["Property", "Column", "Type", "Insert", "Update", "Notes"]);

    for field in &metadata.fields {
        let mut notes = Vec::new();
        if field.property_name == metadata.id_property_name {
            notes.push("id".to_string());
        }
        if field.is_joined() {
            let target = field
                .metadata
                .as_ref()
                .map(|nested| nested.table_name.as_str())
                .unwrap_or("?");
            notes.push(format!("joined {target}"));
        }
        if let Some(kind) = metadata.temporal_kind(&field.property_name) {
            notes.push(format!("{kind:?}").to_lowercase());
        }
        if metadata.created_date_properties.contains(&field.property_name) {
            notes.push("created".to_string());
        }
        if metadata.updated_date_properties.contains(&field.property_name) {
            notes.push("updated".to_string());
        }

        builder.push_record([
            Colored(Blue, &field.property_name).to_string(),
            Colored(Cyan, &field.column_name).to_string(),
            field.column_type.clone().unwrap_or_default(),
            yes_no(field.insertable).to_string(),
            yes_no(field.updatable).to_string(),
            notes.join(", "),
        ]);
    }

    builder
        .build()
        .with(Panel::header(format!(
            "{}",
            Colored(Green, &metadata.table_name)
        )))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string()
}

fn relations_table(manager: &MetadataManager, metadata: &EntityMetadata) -> String {
    let mut builder = Builder::new();
    builder.push_record(["Relation", "Property", "Mapped by", "Table"]);

    for relation in &metadata.relations {
        let row = match relation {
            EntityRelation::OneToMany(relation) => {
                let table = manager
                    .one_to_many_table(&metadata.table_name, &relation.property_name)
                    .map(|table| Colored(Green, table).to_string())
                    .unwrap_or_else(|| Colored(Yellow, "unresolved").to_string());
                [
                    "one-to-many".to_string(),
                    relation.property_name.clone(),
                    relation.mapped_by.clone(),
                    table,
                ]
            }
            EntityRelation::ManyToOne(relation) => [
                "many-to-one".to_string(),
                relation.property_name.clone(),
                String::new(),
                Colored(Green, &relation.table).to_string(),
            ],
        };
        builder.push_record(row);
    }

    builder
        .build()
        .with(Style::rounded())
        .to_string()
}

fn metadata_json(manager: &MetadataManager, metadata: &EntityMetadata) -> serde_json::Value {
    let fields: Vec<_> = metadata
        .fields
        .iter()
        .map(|field| {
            json!({
                "property": field.property_name,
                "column": field.column_name,
                "column_type": field.column_type,
                "nullable": field.nullable,
                "insertable": field.insertable,
                "updatable": field.updatable,
                "kind": field.kind,
                "joined": field.metadata.as_ref().map(|nested| nested.table_name.clone()),
                "temporal": metadata.temporal_kind(&field.property_name),
            })
        })
        .collect();

    let relations: Vec<_> = metadata
        .relations
        .iter()
        .map(|relation| match relation {
            EntityRelation::OneToMany(relation) => json!({
                "type": "one_to_many",
                "property": relation.property_name,
                "mapped_by": relation.mapped_by,
                "table": manager.one_to_many_table(&metadata.table_name, &relation.property_name),
            }),
            EntityRelation::ManyToOne(relation) => json!({
                "type": "many_to_one",
                "property": relation.property_name,
                "table": relation.table,
            }),
        })
        .collect();

    json!({
        "table": metadata.table_name,
        "id": metadata.id_property_name,
        "fields": fields,
        "relations": relations,
        "created_date": metadata.created_date_properties,
        "updated_date": metadata.updated_date_properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaFile;

    fn manager() -> MetadataManager {
        SchemaFile::parse(
            r#"
[[entity]]
table = "cart"
[[entity.column]]
property = "id"
[[entity.one_to_many]]
property = "items"
mapped_by = "cart"

[[entity]]
table = "cart_item"
[[entity.column]]
property = "id"
[[entity.column]]
property = "cart"
column = "cart_id"
joined = "cart"
"#,
        )
        .unwrap()
        .manager()
        .unwrap()
    }

    #[test]
    fn test_metadata_json_includes_resolved_relation() {
        let manager = manager();
        let cart = manager.get_metadata_by_table("cart").unwrap();
        let output = metadata_json(&manager, &cart);

        assert_eq!(output["table"], "cart");
        assert_eq!(output["relations"][0]["table"], "cart_item");
    }

    #[test]
    fn test_fields_table_marks_joined_column() {
        crate::utils::disable_color();
        let manager = manager();
        let item = manager.get_metadata_by_table("cart_item").unwrap();
        let table = fields_table(&item);

        assert!(table.contains("cart_id"));
        assert!(table.contains("joined cart"));
    }

    #[test]
    fn test_unknown_table() {
        assert!(matches!(
            inspect_schema(&manager(), Some("user"), true),
            Err(CliError::UnknownTable(_))
        ));
    }
}

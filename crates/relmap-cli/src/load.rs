use nu_ansi_term::Color::Green;
use relmap_core::{projection::to_json, DynamicEntity, EntityMetadata, Sort, Tracked};
use relmap_db::{MemoryPersister, Persister};
use tabled::{builder::Builder, settings::Style};
use tracing::info;

use crate::{error::CliResult, utils::Colored};

/// Inserts `rows` into a fresh in-memory store and reads them back in id
/// order, the way a database-backed persister would see them.
pub async fn load_rows(
    metadata: &EntityMetadata,
    rows: Vec<DynamicEntity>,
) -> CliResult<Vec<DynamicEntity>> {
    let persister = MemoryPersister::new();
    for row in rows {
        persister.insert(metadata, row).await?;
    }

    let sort = Sort::asc(metadata.id_property_name.as_str());
    let stored: Vec<Tracked<DynamicEntity>> =
        persister.find_all(metadata, None, Some(&sort)).await?;
    Ok(stored.into_iter().map(|tracked| tracked.into_inner()).collect())
}

pub fn print_rows(metadata: &EntityMetadata, rows: &[DynamicEntity], json: bool) -> CliResult<()> {
    if json {
        let output: Vec<_> = rows
            .iter()
            .map(|row| serde_json::Value::Object(to_json(row, metadata)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut builder = Builder::new();
    builder.push_record(
        metadata
            .fields
            .iter()
            .map(|field| field.property_name.clone()),
    );
    for row in rows {
        let values = to_json(row, metadata);
        builder.push_record(metadata.fields.iter().map(|field| {
            values
                .get(&field.property_name)
                .map(|value| value.to_string())
                .unwrap_or_default()
        }));
    }

    info!("{}", builder.build().with(Style::rounded()));
    info!(
        "Stored {} rows in {}",
        Colored(Green, rows.len()),
        Colored(Green, &metadata.table_name)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use relmap_core::{Entity, Value};

    use super::*;
    use crate::schema::{parse_rows, SchemaFile};

    #[tokio::test]
    async fn test_load_assigns_ids_and_dates() {
        let mut built = SchemaFile::parse(
            r#"
[[entity]]
table = "bar"
created_date = ["createdAt"]
[[entity.column]]
property = "id"
[[entity.column]]
property = "barName"
[[entity.column]]
property = "createdAt"
temporal = "date"
"#,
        )
        .unwrap()
        .build()
        .unwrap();
        let metadata = built.remove("bar").unwrap();
        let rows = parse_rows(
            r#"[{"barName": "first"}, {"barName": "second"}]"#,
            &metadata,
        )
        .unwrap();

        let stored = load_rows(&metadata, rows).await.unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].get_property("id"), Some(Value::Int(1)));
        assert_eq!(stored[1].get_property("id"), Some(Value::Int(2)));
        assert_eq!(
            stored[1].get_property("barName"),
            Some(Value::Text("second".to_string()))
        );
        assert!(matches!(
            stored[0].get_property("createdAt"),
            Some(Value::Date(_))
        ));
    }
}

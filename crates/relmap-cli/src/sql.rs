use nu_ansi_term::Color::{Blue, Cyan, Green, Magenta};
use relmap_config::Config;
use relmap_core::{DynamicEntity, Entity, EntityMetadata, Sort, SortDirection, Where};
use relmap_db::{
    AndChainFormulaBuilder, DbError, DeleteQueryBuilder, InsertQueryBuilder, QueryArg,
    SelectQueryBuilder, Statement, UpdateQueryBuilder,
};
use serde_json::json;
use tracing::info;

use crate::{
    error::CliResult,
    schema::parse_filter,
    utils::Colored,
};

pub fn insert_statement(
    config: &Config,
    metadata: &EntityMetadata,
    rows: &[DynamicEntity],
) -> CliResult<Statement> {
    let mut builder = InsertQueryBuilder::new();
    builder
        .set_table_prefix(config.table_prefix.as_str())
        .set_table_name(metadata.table_name.as_str());
    for row in rows {
        builder.append_entity(
            row,
            &metadata.fields,
            &metadata.temporal_properties,
            &[metadata.id_property_name.as_str()],
        );
    }
    Ok(builder.build()?)
}

pub fn update_statement(
    config: &Config,
    metadata: &EntityMetadata,
    row: &DynamicEntity,
) -> CliResult<Statement> {
    let id = row
        .get_property(&metadata.id_property_name)
        .filter(|id| !id.is_null())
        .ok_or_else(|| DbError::MissingId {
            table: metadata.table_name.clone(),
            property: metadata.id_property_name.clone(),
        })?;
    let id_column = metadata
        .id_field()
        .map(|field| field.column_name.as_str())
        .unwrap_or(metadata.id_property_name.as_str());

    let mut condition = AndChainFormulaBuilder::new();
    condition.append(
        &format!("{}{}", config.table_prefix, metadata.table_name),
        id_column,
        id,
    );

    let mut builder = UpdateQueryBuilder::new();
    builder
        .set_table_prefix(config.table_prefix.as_str())
        .set_table_name(metadata.table_name.as_str())
        .append_entity(
            row,
            &metadata.fields,
            &metadata.temporal_properties,
            &[metadata.id_property_name.as_str()],
        )
        .set_where_from_query_builder(&condition)?;
    Ok(builder.build()?)
}

pub fn select_statement(
    config: &Config,
    metadata: &EntityMetadata,
    filters: &[String],
    order: &[String],
    limit: Option<u64>,
) -> CliResult<Statement> {
    let condition = filter_condition(filters)?;
    let sort = order.iter().fold(Sort::default(), |sort, property| {
        match property.strip_prefix('-') {
            Some(property) => sort.then(property, SortDirection::Desc),
            None => sort.then(property.as_str(), SortDirection::Asc),
        }
    });

    let mut builder = SelectQueryBuilder::new(metadata);
    builder
        .set_table_prefix(config.table_prefix.as_str())
        .filter(condition.as_ref())
        .order_by(Some(&sort));
    if let Some(limit) = limit {
        builder.limit(limit);
    }
    Ok(builder.build()?)
}

pub fn delete_statement(
    config: &Config,
    metadata: &EntityMetadata,
    filters: &[String],
) -> CliResult<Statement> {
    let condition = filter_condition(filters)?;
    let mut builder = DeleteQueryBuilder::new(metadata);
    builder
        .set_table_prefix(config.table_prefix.as_str())
        .filter(condition.as_ref());
    Ok(builder.build()?)
}

fn filter_condition(filters: &[String]) -> CliResult<Option<Where>> {
    let conditions = filters
        .iter()
        .map(|filter| {
            let (property, value) = parse_filter(filter)?;
            Ok(match value {
                relmap_core::Value::Null => Where::property_is_null(property),
                relmap_core::Value::List(values) => Where::property_list_equals(property, values),
                value => Where::property_equals(property, value),
            })
        })
        .collect::<CliResult<Vec<_>>>()?;

    Ok(match conditions.len() {
        0 => None,
        1 => conditions.into_iter().next(),
        _ => Some(Where::And(conditions)),
    })
}

pub fn print_statement(config: &Config, statement: &Statement, json: bool) -> CliResult<()> {
    let (sql, values) = statement.render(config.identifier_quote);

    if json {
        let args: Vec<_> = statement
            .args
            .iter()
            .map(|arg| match arg {
                QueryArg::Identifier(name) => json!({ "identifier": name }),
                QueryArg::Value(value) => json!({ "value": value.to_json() }),
            })
            .collect();
        let output = json!({
            "template": statement.template,
            "args": args,
            "sql": sql,
            "values": values.iter().map(|value| value.to_json()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    info!("{} {}", Colored(Green, "template:"), statement.template);
    for (idx, arg) in statement.args.iter().enumerate() {
        match arg {
            QueryArg::Identifier(name) => {
                info!("  [{idx}] {} {}", Colored(Blue, "identifier"), name)
            }
            QueryArg::Value(value) => {
                info!("  [{idx}] {} {}", Colored(Magenta, "value"), value)
            }
        }
    }
    info!("{} {}", Colored(Green, "sql:"), Colored(Cyan, sql));
    info!("{} {}", Colored(Green, "inline:"), statement);
    Ok(())
}

use relmap_core::{EntityMetadata, Sort, SortDirection, Where};

use crate::{
    error::BuildError,
    query::{
        formula::WhereFormula,
        statement::{QueryArg, Statement},
    },
};

/// Builds `SELECT` statements over one entity's table.
///
/// Selected columns are the metadata's field columns, qualified by table.
#[derive(Debug, Clone)]
pub struct SelectQueryBuilder<'a> {
    metadata: &'a EntityMetadata,
    table_prefix: String,
    condition: Option<Where>,
    sort: Sort,
    limit: Option<u64>,
}

impl<'a> SelectQueryBuilder<'a> {
    pub fn new(metadata: &'a EntityMetadata) -> Self {
        Self {
            metadata,
            table_prefix: String::new(),
            condition: None,
            sort: Sort::default(),
            limit: None,
        }
    }

    pub fn set_table_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn filter(&mut self, condition: Option<&Where>) -> &mut Self {
        self.condition = condition.cloned();
        self
    }

    pub fn order_by(&mut self, sort: Option<&Sort>) -> &mut Self {
        self.sort = sort.cloned().unwrap_or_default();
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(&self) -> Result<Statement, BuildError> {
        let table = effective_table(&self.table_prefix, self.metadata, "SELECT")?;
        if self.metadata.fields.is_empty() {
            return Err(BuildError::NoColumns {
                statement: "SELECT",
                table,
            });
        }

        let mut args = Vec::new();
        args.extend(
            self.metadata
                .fields
                .iter()
                .map(|field| QueryArg::identifier(format!("{table}.{}", field.column_name))),
        );
        args.push(QueryArg::Identifier(table.clone()));

        let mut template = format!(
            "SELECT {} FROM ??",
            vec!["??"; self.metadata.fields.len()].join(", ")
        );
        push_where(&mut template, &mut args, &table, self.metadata, self.condition.as_ref());

        if !self.sort.is_empty() {
            let orders: Vec<&str> = self
                .sort
                .orders
                .iter()
                .map(|order| {
                    let column = self
                        .metadata
                        .field(&order.property)
                        .map(|field| field.column_name.as_str())
                        .unwrap_or(order.property.as_str());
                    args.push(QueryArg::identifier(format!("{table}.{column}")));
                    match order.direction {
                        SortDirection::Asc => "?? ASC",
                        SortDirection::Desc => "?? DESC",
                    }
                })
                .collect();
            template.push_str(" ORDER BY ");
            template.push_str(&orders.join(", "));
        }

        if let Some(limit) = self.limit {
            template.push_str(&format!(" LIMIT {limit}"));
        }

        Ok(Statement::new(template, args))
    }
}

/// Builds `SELECT COUNT(*) AS count` statements.
#[derive(Debug, Clone)]
pub struct CountQueryBuilder<'a> {
    metadata: &'a EntityMetadata,
    table_prefix: String,
    condition: Option<Where>,
}

impl<'a> CountQueryBuilder<'a> {
    pub fn new(metadata: &'a EntityMetadata) -> Self {
        Self {
            metadata,
            table_prefix: String::new(),
            condition: None,
        }
    }

    pub fn set_table_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn filter(&mut self, condition: Option<&Where>) -> &mut Self {
        self.condition = condition.cloned();
        self
    }

    pub fn build(&self) -> Result<Statement, BuildError> {
        let table = effective_table(&self.table_prefix, self.metadata, "SELECT")?;
        let mut args = vec![QueryArg::Identifier(table.clone())];
        let mut template = "SELECT COUNT(*) AS count FROM ??".to_string();
        push_where(&mut template, &mut args, &table, self.metadata, self.condition.as_ref());
        Ok(Statement::new(template, args))
    }
}

pub(crate) fn effective_table(
    prefix: &str,
    metadata: &EntityMetadata,
    statement: &'static str,
) -> Result<String, BuildError> {
    if metadata.table_name.is_empty() {
        return Err(BuildError::MissingTable { statement });
    }
    Ok(format!("{prefix}{}", metadata.table_name))
}

pub(crate) fn push_where(
    template: &mut String,
    args: &mut Vec<QueryArg>,
    table: &str,
    metadata: &EntityMetadata,
    condition: Option<&Where>,
) {
    if let Some(condition) = condition {
        let fragment = WhereFormula::new(table, metadata).build(condition);
        template.push_str(" WHERE ");
        template.push_str(&fragment.template);
        args.extend(fragment.args);
    }
}

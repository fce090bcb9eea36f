use relmap_core::{Entity, EntityField, TemporalProperty, Value};

use crate::{
    error::BuildError,
    query::statement::{bind_value, QueryArg, Statement},
};

/// Builds a single, possibly multi-row, `INSERT` statement from entities.
///
/// Columns are the union of every appended row's written columns, in the
/// order they were first seen. A row missing one of them writes `DEFAULT`.
#[derive(Debug, Clone, Default)]
pub struct InsertQueryBuilder {
    table_prefix: String,
    table_name: Option<String>,
    columns: Vec<String>,
    rows: Vec<Vec<(String, Value)>>,
}

impl InsertQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn set_table_name(&mut self, table_name: impl Into<String>) -> &mut Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// `prefix + name`, once a name is set.
    pub fn table(&self) -> Option<String> {
        self.table_name
            .as_ref()
            .map(|name| format!("{}{name}", self.table_prefix))
    }

    /// Appends one row read off `entity`.
    ///
    /// Non-insertable fields and unset values are skipped, so the database
    /// fills in its defaults. Id properties are written only when they hold a
    /// non-null value.
    pub fn append_entity(
        &mut self,
        entity: &dyn Entity,
        fields: &[EntityField],
        temporal_properties: &[TemporalProperty],
        id_property_names: &[&str],
    ) -> &mut Self {
        let mut row = Vec::new();
        for field in fields.iter().filter(|field| field.insertable) {
            let Some(value) = entity.get_property(&field.property_name) else {
                continue;
            };
            if value.is_null() && id_property_names.contains(&field.property_name.as_str()) {
                continue;
            }
            let kind = temporal_properties
                .iter()
                .find(|t| t.property_name == field.property_name)
                .map(|t| t.kind);

            if !self.columns.contains(&field.column_name) {
                self.columns.push(field.column_name.clone());
            }
            row.push((
                field.column_name.clone(),
                bind_value(field.column_value(value), kind),
            ));
        }
        self.rows.push(row);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn build(&self) -> Result<Statement, BuildError> {
        let table = self.table().ok_or(BuildError::MissingTable {
            statement: "INSERT",
        })?;
        if self.rows.is_empty() {
            return Err(BuildError::NoRows {
                statement: "INSERT",
            });
        }
        if self.columns.is_empty() {
            return Err(BuildError::NoColumns {
                statement: "INSERT",
                table,
            });
        }

        let mut args = Vec::with_capacity(1 + self.columns.len() * (1 + self.rows.len()));
        args.push(QueryArg::Identifier(table));
        args.extend(self.columns.iter().cloned().map(QueryArg::Identifier));

        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let slots: Vec<&str> = self
                    .columns
                    .iter()
                    .map(|column| match row.iter().find(|(c, _)| c == column) {
                        Some((_, value)) => {
                            args.push(QueryArg::Value(value.clone()));
                            "?"
                        }
                        None => "DEFAULT",
                    })
                    .collect();
                format!("({})", slots.join(", "))
            })
            .collect();

        let template = format!(
            "INSERT INTO ?? ({}) VALUES {}",
            vec!["??"; self.columns.len()].join(", "),
            rows.join(", ")
        );
        Ok(Statement::new(template, args))
    }
}

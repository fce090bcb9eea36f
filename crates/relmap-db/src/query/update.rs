use relmap_core::{Entity, EntityField, TemporalProperty, Value};

use crate::{
    error::BuildError,
    query::{
        formula::AndChainFormulaBuilder,
        statement::{bind_value, QueryArg, Statement},
    },
};

/// Builds an `UPDATE ... SET ... WHERE ...` statement from one entity.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueryBuilder {
    table_prefix: String,
    table_name: Option<String>,
    assignments: Vec<(String, Value)>,
    condition: Option<Statement>,
}

impl UpdateQueryBuilder {
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

    pub fn table(&self) -> Option<String> {
        self.table_name
            .as_ref()
            .map(|name| format!("{}{name}", self.table_prefix))
    }

    /// Adds `SET` assignments for `entity`.
    ///
    /// Non-updatable fields, id properties and unset values are skipped. An
    /// explicit null is written as `NULL`. A later assignment to the same
    /// column replaces the earlier one.
    pub fn append_entity(
        &mut self,
        entity: &dyn Entity,
        fields: &[EntityField],
        temporal_properties: &[TemporalProperty],
        id_property_names: &[&str],
    ) -> &mut Self {
        self.append(entity, fields, temporal_properties, id_property_names, false)
    }

    /// Adds `SET` assignments for fields known to have changed.
    ///
    /// Same as [`append_entity`](Self::append_entity), except that a field
    /// whose value became unset is written as `NULL`.
    pub fn append_changes(
        &mut self,
        entity: &dyn Entity,
        changed: &[EntityField],
        temporal_properties: &[TemporalProperty],
        id_property_names: &[&str],
    ) -> &mut Self {
        self.append(entity, changed, temporal_properties, id_property_names, true)
    }

    fn append(
        &mut self,
        entity: &dyn Entity,
        fields: &[EntityField],
        temporal_properties: &[TemporalProperty],
        id_property_names: &[&str],
        unset_as_null: bool,
    ) -> &mut Self {
        for field in fields.iter().filter(|field| field.updatable) {
            if id_property_names.contains(&field.property_name.as_str()) {
                continue;
            }
            let value = match entity.get_property(&field.property_name) {
                Some(value) => value,
                None if unset_as_null => Value::Null,
                None => continue,
            };
            let kind = temporal_properties
                .iter()
                .find(|t| t.property_name == field.property_name)
                .map(|t| t.kind);
            let value = bind_value(field.column_value(value), kind);

            match self
                .assignments
                .iter_mut()
                .find(|(column, _)| *column == field.column_name)
            {
                Some((_, current)) => *current = value,
                None => self.assignments.push((field.column_name.clone(), value)),
            }
        }
        self
    }

    /// Uses the conditions of `formula` as the `WHERE` clause.
    pub fn set_where_from_query_builder(
        &mut self,
        formula: &AndChainFormulaBuilder,
    ) -> Result<&mut Self, BuildError> {
        self.condition = Some(formula.build()?);
        Ok(self)
    }

    /// Uses an already built fragment as the `WHERE` clause.
    pub fn set_where(&mut self, condition: Statement) -> &mut Self {
        self.condition = Some(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn build(&self) -> Result<Statement, BuildError> {
        let table = self.table().ok_or(BuildError::MissingTable {
            statement: "UPDATE",
        })?;
        if self.assignments.is_empty() {
            return Err(BuildError::NoColumns {
                statement: "UPDATE",
                table,
            });
        }
        let Some(condition) = &self.condition else {
            return Err(BuildError::MissingWhere { table });
        };

        let mut args = Vec::with_capacity(1 + self.assignments.len() * 2 + condition.args.len());
        args.push(QueryArg::Identifier(table));
        let sets: Vec<&str> = self
            .assignments
            .iter()
            .map(|(column, value)| {
                args.push(QueryArg::Identifier(column.clone()));
                if value.is_null() {
                    "?? = NULL"
                } else {
                    args.push(QueryArg::Value(value.clone()));
                    "?? = ?"
                }
            })
            .collect();
        args.extend(condition.args.iter().cloned());

        let template = format!(
            "UPDATE ?? SET {} WHERE {}",
            sets.join(", "),
            condition.template
        );
        Ok(Statement::new(template, args))
    }
}

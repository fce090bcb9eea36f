//! WHERE fragments: the AND-chain builder and the [`Where`] translation.

use relmap_core::{EntityMetadata, Value, Where};

use crate::{
    error::BuildError,
    query::statement::{bind_value, QueryArg, Statement},
};

/// Accumulates `table.column = value` predicates joined with `AND`.
///
/// ```ignore
/// let mut formula = AndChainFormulaBuilder::new();
/// formula.append("cart", "id", 3).append("cart", "owner", "dana");
/// // (?? = ? AND ?? = ?) with [cart.id, 3, cart.owner, 'dana']
/// ```
#[derive(Debug, Clone, Default)]
pub struct AndChainFormulaBuilder {
    conditions: Vec<(String, Value)>,
}

impl AndChainFormulaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, table: &str, column: &str, value: impl Into<Value>) -> &mut Self {
        self.conditions
            .push((format!("{table}.{column}"), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Emits `(?? = ? AND ...)`. A null value is compared with `IS NULL`.
    pub fn build(&self) -> Result<Statement, BuildError> {
        if self.conditions.is_empty() {
            return Err(BuildError::NoConditions);
        }

        let mut args = Vec::with_capacity(self.conditions.len() * 2);
        let predicates: Vec<&str> = self
            .conditions
            .iter()
            .map(|(identifier, value)| {
                args.push(QueryArg::identifier(identifier.clone()));
                if value.is_null() {
                    "?? IS NULL"
                } else {
                    args.push(QueryArg::Value(bind_value(value.clone(), None)));
                    "?? = ?"
                }
            })
            .collect();

        Ok(Statement::new(
            format!("({})", predicates.join(" AND ")),
            args,
        ))
    }
}

/// Translates a [`Where`] into a fragment over one table, mapping property
/// names to qualified column identifiers through the metadata.
pub struct WhereFormula<'a> {
    table: &'a str,
    metadata: &'a EntityMetadata,
}

impl<'a> WhereFormula<'a> {
    pub fn new(table: &'a str, metadata: &'a EntityMetadata) -> Self {
        Self { table, metadata }
    }

    pub fn build(&self, condition: &Where) -> Statement {
        let mut args = Vec::new();
        let template = self.fragment(condition, &mut args);
        Statement::new(template, args)
    }

    fn identifier(&self, property: &str) -> QueryArg {
        let column = self
            .metadata
            .field(property)
            .map(|field| field.column_name.as_str())
            .unwrap_or(property);
        QueryArg::identifier(format!("{}.{column}", self.table))
    }

    fn value(&self, property: &str, value: &Value) -> QueryArg {
        let value = match self.metadata.field(property) {
            Some(field) => field.column_value(value.clone()),
            None => value.clone(),
        };
        QueryArg::Value(bind_value(value, self.metadata.temporal_kind(property)))
    }

    fn fragment(&self, condition: &Where, args: &mut Vec<QueryArg>) -> String {
        match condition {
            Where::PropertyEquals { property, value } if value.is_null() => {
                args.push(self.identifier(property));
                "?? IS NULL".to_string()
            }
            Where::PropertyEquals { property, value } => {
                args.push(self.identifier(property));
                args.push(self.value(property, value));
                "?? = ?".to_string()
            }
            Where::PropertyListEquals { values, .. } if values.is_empty() => "1 = 0".to_string(),
            Where::PropertyListEquals { property, values } => {
                args.push(self.identifier(property));
                args.extend(values.iter().map(|value| self.value(property, value)));
                format!("?? IN ({})", vec!["?"; values.len()].join(", "))
            }
            Where::PropertyIsNull { property } => {
                args.push(self.identifier(property));
                "?? IS NULL".to_string()
            }
            Where::And(conditions) => self.join(conditions, " AND ", "1 = 1", args),
            Where::Or(conditions) => self.join(conditions, " OR ", "1 = 0", args),
        }
    }

    fn join(
        &self,
        conditions: &[Where],
        separator: &str,
        empty: &str,
        args: &mut Vec<QueryArg>,
    ) -> String {
        if conditions.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = conditions
            .iter()
            .map(|condition| self.fragment(condition, args))
            .collect();
        format!("({})", parts.join(separator))
    }
}

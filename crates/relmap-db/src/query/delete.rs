use relmap_core::{EntityMetadata, Where};

use crate::{
    error::BuildError,
    query::{
        select::{effective_table, push_where},
        statement::{QueryArg, Statement},
    },
};

/// Builds `DELETE FROM` statements. Without a condition every row goes.
#[derive(Debug, Clone)]
pub struct DeleteQueryBuilder<'a> {
    metadata: &'a EntityMetadata,
    table_prefix: String,
    condition: Option<Where>,
}

impl<'a> DeleteQueryBuilder<'a> {
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
        let table = effective_table(&self.table_prefix, self.metadata, "DELETE")?;
        let mut args = vec![QueryArg::Identifier(table.clone())];
        let mut template = "DELETE FROM ??".to_string();
        push_where(&mut template, &mut args, &table, self.metadata, self.condition.as_ref());
        Ok(Statement::new(template, args))
    }
}

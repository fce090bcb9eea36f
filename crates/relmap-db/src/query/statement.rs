//! Parameterized statements with separate identifier and value channels.

use std::fmt;

use relmap_core::{TemporalKind, Value};
use relmap_utils::{
    string::quote_identifier,
    time::{format_date, format_time, format_timestamp},
};

/// Placeholder for an identifier argument.
pub const IDENTIFIER_PLACEHOLDER: &str = "??";
/// Placeholder for a bound value argument.
pub const VALUE_PLACEHOLDER: &str = "?";

/// One positional argument of a [`Statement`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    /// Table or column name, possibly dotted (`table.column`).
    Identifier(String),
    Value(Value),
}

impl QueryArg {
    pub fn identifier(name: impl Into<String>) -> Self {
        QueryArg::Identifier(name.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        QueryArg::Value(value.into())
    }
}

/// A statement template plus its arguments in emission order.
///
/// `??` in the template takes the next [`QueryArg::Identifier`], `?` the next
/// [`QueryArg::Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub template: String,
    pub args: Vec<QueryArg>,
}

impl Statement {
    pub fn new(template: impl Into<String>, args: Vec<QueryArg>) -> Self {
        Self {
            template: template.into(),
            args,
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.args.iter().filter_map(|arg| match arg {
            QueryArg::Value(value) => Some(value),
            QueryArg::Identifier(_) => None,
        })
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            QueryArg::Identifier(name) => Some(name.as_str()),
            QueryArg::Value(_) => None,
        })
    }

    /// Expands identifier placeholders into quoted identifiers and returns
    /// the SQL together with the values left to bind, for clients that only
    /// understand `?`.
    pub fn render(&self, quote: char) -> (String, Vec<Value>) {
        let mut sql = String::with_capacity(self.template.len());
        let mut values = Vec::new();
        let mut args = self.args.iter();
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '?' {
                sql.push(c);
                continue;
            }
            let wants_identifier = chars.peek() == Some(&'?');
            if wants_identifier {
                chars.next();
            }
            match (wants_identifier, args.next()) {
                (true, Some(QueryArg::Identifier(name))) => {
                    sql.push_str(&quote_identifier(name, quote));
                }
                (false, Some(QueryArg::Value(value))) => {
                    sql.push('?');
                    values.push(value.clone());
                }
                (_, arg) => {
                    // Arguments out of step with the template; leave the
                    // placeholder for the client to reject.
                    tracing::warn!(template = %self.template, ?arg, "placeholder mismatch");
                    sql.push_str(if wants_identifier { "??" } else { "?" });
                }
            }
        }
        (sql, values)
    }
}

impl fmt::Display for Statement {
    /// Inlines every argument. For logs and previews only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, values) = self.render('`');
        let mut values = values.iter();
        for part in sql.split('?').enumerate() {
            match part {
                (0, text) => write!(f, "{text}")?,
                (_, text) => match values.next() {
                    Some(value) => write!(f, "{value}{text}")?,
                    None => write!(f, "?{text}")?,
                },
            }
        }
        Ok(())
    }
}

/// Converts a property value to what is bound for its column.
///
/// Temporal values become SQL text narrowed to the property's temporal kind.
/// Lists and records are bound as JSON text.
pub fn bind_value(value: Value, kind: Option<TemporalKind>) -> Value {
    match (value, kind) {
        (Value::Timestamp(ts), Some(TemporalKind::Date)) => Value::Text(format_date(&ts.date())),
        (Value::Timestamp(ts), Some(TemporalKind::Time)) => Value::Text(format_time(&ts.time())),
        (Value::Timestamp(ts), _) => Value::Text(format_timestamp(&ts)),
        (Value::Date(date), _) => Value::Text(format_date(&date)),
        (Value::Time(time), _) => Value::Text(format_time(&time)),
        (value @ (Value::List(_) | Value::Record(_)), _) => Value::Text(value.to_json().to_string()),
        (value, _) => value,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn statement() -> Statement {
        Statement::new(
            "UPDATE ?? SET ?? = ? WHERE (?? = ?)",
            vec![
                QueryArg::identifier("bar"),
                QueryArg::identifier("bar_name"),
                QueryArg::value("O'Hara"),
                QueryArg::identifier("bar.id"),
                QueryArg::value(4),
            ],
        )
    }

    #[test]
    fn test_render_quotes_identifiers() {
        let (sql, values) = statement().render('`');
        assert_eq!(
            sql,
            "UPDATE `bar` SET `bar_name` = ? WHERE (`bar`.`id` = ?)"
        );
        assert_eq!(values, vec![Value::from("O'Hara"), Value::Int(4)]);
    }

    #[test]
    fn test_display_inlines_values() {
        assert_eq!(
            statement().to_string(),
            "UPDATE `bar` SET `bar_name` = 'O''Hara' WHERE (`bar`.`id` = 4)"
        );
    }

    #[test]
    fn test_channels() {
        let statement = statement();
        assert_eq!(
            statement.identifiers().collect::<Vec<_>>(),
            vec!["bar", "bar_name", "bar.id"]
        );
        assert_eq!(statement.values().count(), 2);
    }

    #[test]
    fn test_bind_value_formats_temporal_values() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            bind_value(Value::Timestamp(ts), None),
            Value::from("2024-03-01 09:30:00")
        );
        assert_eq!(
            bind_value(Value::Timestamp(ts), Some(TemporalKind::Date)),
            Value::from("2024-03-01")
        );
        assert_eq!(
            bind_value(Value::List(vec![Value::Int(1)]), None),
            Value::from("[1]")
        );
        assert_eq!(bind_value(Value::Int(3), None), Value::Int(3));
    }
}

//! Backend-neutral filter conditions and sort orders.
//!
//! A [`Where`] is evaluated directly by the memory persister and translated
//! into SQL by the query builders. Both refer to entities by property name.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// `property = value`
    PropertyEquals { property: String, value: Value },
    /// `property IN (values)`; an empty list matches nothing.
    PropertyListEquals { property: String, values: Vec<Value> },
    PropertyIsNull { property: String },
    /// Every condition holds; an empty list matches everything.
    And(Vec<Where>),
    /// Some condition holds; an empty list matches nothing.
    Or(Vec<Where>),
}

impl Where {
    pub fn property_equals(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Where::PropertyEquals {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn property_list_equals<V: Into<Value>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Where::PropertyListEquals {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn property_is_null(property: impl Into<String>) -> Self {
        Where::PropertyIsNull {
            property: property.into(),
        }
    }

    pub fn and(self, other: Where) -> Self {
        match self {
            Where::And(mut conditions) => {
                conditions.push(other);
                Where::And(conditions)
            }
            condition => Where::And(vec![condition, other]),
        }
    }

    pub fn or(self, other: Where) -> Self {
        match self {
            Where::Or(mut conditions) => {
                conditions.push(other);
                Where::Or(conditions)
            }
            condition => Where::Or(vec![condition, other]),
        }
    }

    /// Evaluates the condition, reading properties through `property`.
    ///
    /// An unset property only matches [`Where::PropertyIsNull`].
    pub fn matches_with(&self, property: &dyn Fn(&str) -> Option<Value>) -> bool {
        match self {
            Where::PropertyEquals { property: name, value } => {
                property(name).is_some_and(|current| current == *value)
            }
            Where::PropertyListEquals { property: name, values } => {
                property(name).is_some_and(|current| values.contains(&current))
            }
            Where::PropertyIsNull { property: name } => {
                property(name).map_or(true, |current| current.is_null())
            }
            Where::And(conditions) => conditions.iter().all(|c| c.matches_with(property)),
            Where::Or(conditions) => conditions.iter().any(|c| c.matches_with(property)),
        }
    }

    /// Property names referenced by the condition, in order of appearance.
    pub fn properties(&self) -> Vec<&str> {
        match self {
            Where::PropertyEquals { property, .. }
            | Where::PropertyListEquals { property, .. }
            | Where::PropertyIsNull { property } => vec![property.as_str()],
            Where::And(conditions) | Where::Or(conditions) => {
                conditions.iter().flat_map(Where::properties).collect()
            }
        }
    }
}

/// Sort direction for queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub property: String,
    pub direction: SortDirection,
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub orders: Vec<SortOrder>,
}

impl Sort {
    pub fn by(property: impl Into<String>, direction: SortDirection) -> Self {
        Sort::default().then(property, direction)
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::by(property, SortDirection::Asc)
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::by(property, SortDirection::Desc)
    }

    pub fn then(mut self, property: impl Into<String>, direction: SortDirection) -> Self {
        self.orders.push(SortOrder {
            property: property.into(),
            direction,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Compares two entities by the sort keys. Unset values sort first in
    /// ascending order.
    pub fn compare(
        &self,
        left: &dyn Fn(&str) -> Option<Value>,
        right: &dyn Fn(&str) -> Option<Value>,
    ) -> Ordering {
        for order in &self.orders {
            let (l, r) = (left(&order.property), right(&order.property));
            let ordering = l.partial_cmp(&r).unwrap_or(Ordering::Equal);
            let ordering = match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

//! Filtered, ordered views over the records of one record type
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::store::record::{Record, RecordId};
use crate::store::schema::RecordType;
use crate::store::value::Value;
use crate::store::StoreError;

/// Predicate over the records of a record type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Filter {
    /// Every record
    #[default]
    All,
    /// Column equals value
    Eq(String, Value),
    /// Column value is one of the listed values
    In(String, Vec<Value>),
    /// Column is not Null
    NotNull(String),
    /// Record id is one of the listed ids
    Ids(Vec<RecordId>),
    /// All of the nested filters hold
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq<V: Into<Value>>(column: &str, value: V) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn not_null(column: &str) -> Self {
        Filter::NotNull(column.to_string())
    }

    pub fn ids(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Filter::Ids(ids.into_iter().collect())
    }

    /// Combine two filters, both must hold
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut fs), Filter::And(others)) => {
                fs.extend(others);
                Filter::And(fs)
            }
            (Filter::And(mut fs), f) => {
                fs.push(f);
                Filter::And(fs)
            }
            (f, g) => Filter::And(vec![f, g]),
        }
    }

    /// Check that every referenced column exists on the record type
    pub fn validate(&self, record_type: &RecordType) -> Result<(), StoreError> {
        match self {
            Filter::All | Filter::Ids(_) => Ok(()),
            Filter::Eq(col, _) | Filter::In(col, _) | Filter::NotNull(col) => {
                record_type.column(col).map(|_| ())
            }
            Filter::And(fs) => fs.iter().try_for_each(|f| f.validate(record_type)),
        }
    }

    /// Evaluate the filter against a record
    pub fn matches(&self, record: &Record) -> Result<bool, StoreError> {
        Ok(match self {
            Filter::All => true,
            Filter::Eq(col, v) => record.get(col)? == v,
            Filter::In(col, vs) => vs.contains(record.get(col)?),
            Filter::NotNull(col) => !record.get(col)?.is_null(),
            Filter::Ids(ids) => ids.contains(&record.id()),
            Filter::And(fs) => {
                for f in fs {
                    if !f.matches(record)? {
                        return Ok(false);
                    }
                }
                true
            }
        })
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::All => write!(f, "all"),
            Filter::Eq(col, v) => write!(f, "{} = {}", col, v),
            Filter::In(col, vs) => write!(
                f,
                "{} in ({})",
                col,
                vs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
            ),
            Filter::NotNull(col) => write!(f, "{} is not null", col),
            Filter::Ids(ids) => write!(
                f,
                "id in ({})",
                ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
            ),
            Filter::And(fs) => write!(
                f,
                "{}",
                fs.iter().map(|x| format!("({})", x)).collect::<Vec<_>>().join(" and ")
            ),
        }
    }
}

/// A filtered query over one record type, results are ordered by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySet {
    record_type: String,
    filter: Filter,
}

impl QuerySet {
    /// Query every record of a record type
    pub fn all(record_type: &str) -> Self {
        Self {
            record_type: record_type.to_string(),
            filter: Filter::All,
        }
    }

    /// Narrow the query with another filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(filter);
        self
    }

    /// Shorthand for `filter(Filter::eq(column, value))`
    pub fn filter_by<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn get_filter(&self) -> &Filter {
        &self.filter
    }
}

impl Display for QuerySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} where {}", self.record_type, self.filter)
    }
}

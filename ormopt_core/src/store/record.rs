//! A stored row of a record type
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::store::schema::{ID_COLUMN, PROBLEM_RUN_COLUMN};
use crate::store::value::Value;
use crate::store::StoreError;

/// Primary key of a record, unique within its record type
pub type RecordId = i64;

/// A record of some record type
///
/// The `id` column is also present in `values`, so every column can be read through
/// [`Record::get`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    record_type: String,
    id: RecordId,
    values: IndexMap<String, Value>,
}

impl Record {
    pub(crate) fn new(record_type: &str, id: RecordId, mut values: IndexMap<String, Value>) -> Self {
        values.shift_insert(0, ID_COLUMN.to_string(), Value::Integer(id));
        Self {
            record_type: record_type.to_string(),
            id,
            values,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Read a column value
    pub fn get(&self, attribute: &str) -> Result<&Value, StoreError> {
        self.values
            .get(attribute)
            .ok_or_else(|| StoreError::MissingAttribute {
                record_type: self.record_type.clone(),
                attribute: attribute.to_string(),
            })
    }

    /// Update a column value, the change is persisted with [`crate::store::RecordStore::save`]
    ///
    /// The primary key can't be changed.
    pub fn set<V: Into<Value>>(&mut self, attribute: &str, value: V) -> Result<(), StoreError> {
        if attribute == ID_COLUMN {
            return Err(StoreError::ImmutableColumn(ID_COLUMN.to_string()));
        }
        self.values.insert(attribute.to_string(), value.into());
        Ok(())
    }

    /// All column values
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Id of the problem run this record last contributed to
    pub fn problem_run_id(&self) -> Option<RecordId> {
        self.values.get(PROBLEM_RUN_COLUMN).and_then(Value::as_i64)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} id={}>", self.record_type, self.id)
    }
}

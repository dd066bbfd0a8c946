//! Module providing the record store: schemas, records, querysets and the [`RecordStore`]
//! boundary used by the rest of the crate.

pub mod json;
pub mod memory;
pub mod query;
pub mod record;
pub mod schema;
pub mod value;

use indexmap::IndexMap;
use thiserror::Error;

pub use memory::MemoryStore;
pub use query::{Filter, QuerySet};
pub use record::{Record, RecordId};
pub use schema::{Column, ColumnBuilder, ColumnKind, ForeignKey, RecordType, Schema};
pub use value::Value;

/// Access to typed records
///
/// Every operation that reads or writes data takes the store as an explicit parameter,
/// there is no ambient session.
pub trait RecordStore {
    /// Schema describing the record types in the store
    fn schema(&self) -> &Schema;

    /// Run a query, records are returned in id order
    fn query(&self, queryset: &QuerySet) -> Result<Vec<Record>, StoreError>;

    /// Get a single record by id
    fn get(&self, record_type: &str, id: RecordId) -> Result<Record, StoreError>;

    /// Insert a new record, the store assigns the id
    ///
    /// Columns missing from `values` are stored as Null.
    fn insert(
        &mut self,
        record_type: &str,
        values: IndexMap<String, Value>,
    ) -> Result<Record, StoreError>;

    /// Persist changes to an existing record
    fn save(&mut self, record: &Record) -> Result<(), StoreError>;

    /// Delete a record
    fn delete(&mut self, record_type: &str, id: RecordId) -> Result<(), StoreError>;

    /// Start a transaction
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Make the changes of the current transaction permanent
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard the changes of the current transaction
    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Get the first record matching a queryset
    fn find_one(&self, queryset: &QuerySet) -> Result<Record, StoreError> {
        self.query(queryset)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound {
                record_type: queryset.record_type().to_string(),
                filter: queryset.get_filter().to_string(),
            })
    }
}

/// Errors raised by the record store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No record matched a lookup
    #[error("Specified {record_type} ({filter}) does not exist")]
    NotFound { record_type: String, filter: String },
    /// The record type is not part of the schema
    #[error("Record type {0} is not registered")]
    UnknownRecordType(String),
    /// No record type is mapped to the table
    #[error("No record type is mapped to table {0}")]
    UnknownTable(String),
    /// A record type or table was registered twice
    #[error("Record type or table {0} is already registered")]
    DuplicateRecordType(String),
    /// The column does not exist on the record type
    #[error("{record_type} has no attribute {attribute}")]
    MissingAttribute {
        record_type: String,
        attribute: String,
    },
    /// Value kind does not match the column kind
    #[error("Column {column} of {record_type} expects {expected}, got {value}")]
    TypeMismatch {
        record_type: String,
        column: String,
        expected: ColumnKind,
        value: Value,
    },
    /// The column can't be modified
    #[error("Column {0} can't be modified")]
    ImmutableColumn(String),
    /// The store rejected a write
    #[error("Couldn't save object {record}: {reason}")]
    Integrity { record: String, reason: String },
    /// Transaction used out of order
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// A builder was missing a required field
    #[error("Required field {0} was not set")]
    UninitializedField(&'static str),
}

impl From<derive_builder::UninitializedFieldError> for StoreError {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        StoreError::UninitializedField(value.field_name())
    }
}

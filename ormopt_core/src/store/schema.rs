//! Record type declarations (tables, columns and foreign keys)
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::store::value::Value;
use crate::store::StoreError;

/// Primary key column present on every record type
pub const ID_COLUMN: &str = "id";
/// Column added to run tracked record types, references [`PROBLEM_RUN_TABLE`]
pub const PROBLEM_RUN_COLUMN: &str = "problem_run_id";
/// Record type holding problem details
pub const PROBLEM_DETAIL_TYPE: &str = "ProblemDetail";
/// Table holding problem details
pub const PROBLEM_DETAIL_TABLE: &str = "problem_details";
/// Record type holding problem runs
pub const PROBLEM_RUN_TYPE: &str = "ProblemRun";
/// Table holding problem runs
pub const PROBLEM_RUN_TABLE: &str = "problem_runs";
/// Column of a problem run referencing its problem detail
pub const PROBLEM_DETAIL_COLUMN: &str = "problem_details_id";

/// Kind of data a column can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Bool,
}

impl ColumnKind {
    /// Check if a (non-null) value can be stored in a column of this kind
    ///
    /// Float columns also accept integers.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ColumnKind::Integer, Value::Integer(_))
                | (ColumnKind::Float, Value::Float(_))
                | (ColumnKind::Float, Value::Integer(_))
                | (ColumnKind::Text, Value::Text(_))
                | (ColumnKind::Bool, Value::Bool(_))
        )
    }
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Integer => write!(f, "INTEGER"),
            ColumnKind::Float => write!(f, "FLOAT"),
            ColumnKind::Text => write!(f, "TEXT"),
            ColumnKind::Bool => write!(f, "BOOL"),
        }
    }
}

/// Reference from a column to a (unique) column of another table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Table name of the referenced record type
    pub table: String,
    /// Referenced column
    pub column: String,
}

impl ForeignKey {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Full `table.column` name of the target
    pub fn target_fullname(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// A column of a record type
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(error = "StoreError"))]
pub struct Column {
    /// Column name
    #[builder(setter(into))]
    pub name: String,
    /// Kind of value stored in the column
    pub kind: ColumnKind,
    /// Whether the column may hold Null
    #[builder(default = "true")]
    pub nullable: bool,
    /// Whether values must be unique across the table
    #[builder(default = "false")]
    pub unique: bool,
    /// Foreign key this column holds, if any
    #[builder(default = "None", setter(strip_option))]
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    /// Create a nullable, non-unique column
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: true,
            unique: false,
            foreign_key: None,
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)?;
        if let Some(fk) = &self.foreign_key {
            write!(f, " -> {}", fk.target_fullname())?;
        }
        Ok(())
    }
}

/// A relational entity: named, stored in a table, with an integer primary key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    /// Name used to refer to the record type
    pub name: String,
    /// Table the records are stored in
    pub table: String,
    /// Columns in declaration order, the first is always [`ID_COLUMN`]
    columns: IndexMap<String, Column>,
    /// Whether records get stamped with the problem run they contributed to
    track_runs: bool,
}

impl RecordType {
    /// Create a new run tracked record type with only an id column
    pub fn new(name: &str, table: &str) -> Self {
        let mut columns = IndexMap::new();
        columns.insert(
            ID_COLUMN.to_string(),
            Column {
                name: ID_COLUMN.to_string(),
                kind: ColumnKind::Integer,
                nullable: false,
                unique: true,
                foreign_key: None,
            },
        );
        Self {
            name: name.to_string(),
            table: table.to_string(),
            columns,
            track_runs: true,
        }
    }

    /// Add a column
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Add a nullable attribute column
    pub fn with_attribute(self, name: &str, kind: ColumnKind) -> Self {
        self.with_column(Column::new(name, kind))
    }

    /// Add a nullable integer column referencing `table.column`
    pub fn with_foreign_key(self, name: &str, table: &str, column: &str) -> Self {
        let mut col = Column::new(name, ColumnKind::Integer);
        col.foreign_key = Some(ForeignKey::new(table, column));
        self.with_column(col)
    }

    /// Opt this record type out of run stamping
    pub fn untracked(mut self) -> Self {
        self.track_runs = false;
        self
    }

    /// Whether records of this type are stamped with problem runs
    pub fn is_run_tracked(&self) -> bool {
        self.track_runs
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&Column, StoreError> {
        self.columns
            .get(name)
            .ok_or_else(|| StoreError::MissingAttribute {
                record_type: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// All columns in declaration order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Columns with a unique constraint
    pub fn unique_columns(&self) -> Vec<&Column> {
        self.columns.values().filter(|c| c.unique).collect()
    }

    /// Columns holding a foreign key
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &ForeignKey)> {
        self.columns
            .values()
            .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c, fk)))
    }

    /// Human readable description of the columns
    pub fn column_info(&self) -> String {
        self.columns
            .values()
            .filter(|c| c.name != ID_COLUMN)
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Collection of every record type known to a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    record_types: IndexMap<String, RecordType>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Create a schema holding only the run ledger record types
    pub fn new() -> Self {
        let mut record_types = IndexMap::new();
        let detail = RecordType::new(PROBLEM_DETAIL_TYPE, PROBLEM_DETAIL_TABLE)
            .with_attribute("name", ColumnKind::Text)
            .with_attribute("description", ColumnKind::Text)
            .with_attribute("version", ColumnKind::Text)
            .untracked();
        let run = RecordType::new(PROBLEM_RUN_TYPE, PROBLEM_RUN_TABLE)
            .with_foreign_key(PROBLEM_DETAIL_COLUMN, PROBLEM_DETAIL_TABLE, ID_COLUMN)
            .untracked();
        record_types.insert(detail.name.clone(), detail);
        record_types.insert(run.name.clone(), run);
        Self { record_types }
    }

    /// Register a record type
    ///
    /// Run tracked types get a [`PROBLEM_RUN_COLUMN`] column. Foreign keys must reference an
    /// already registered table and one of its columns.
    pub fn register(&mut self, record_type: RecordType) -> Result<(), StoreError> {
        let mut record_type = record_type;
        if self.record_types.contains_key(&record_type.name) {
            return Err(StoreError::DuplicateRecordType(record_type.name));
        }
        if self.record_type_by_table(&record_type.table).is_some() {
            return Err(StoreError::DuplicateRecordType(record_type.table));
        }
        if record_type.track_runs && !record_type.has_column(PROBLEM_RUN_COLUMN) {
            record_type = record_type.with_foreign_key(PROBLEM_RUN_COLUMN, PROBLEM_RUN_TABLE, ID_COLUMN);
        }
        for (_, fk) in record_type.foreign_keys() {
            // Self references are resolved against the type being registered
            let target = if fk.table == record_type.table {
                &record_type
            } else {
                self.resolve_foreign_key(fk)?
            };
            target.column(&fk.column)?;
        }
        self.record_types.insert(record_type.name.clone(), record_type);
        Ok(())
    }

    /// Register a record type, returning the updated schema
    pub fn with_record_type(mut self, record_type: RecordType) -> Result<Self, StoreError> {
        self.register(record_type)?;
        Ok(self)
    }

    /// Look up a record type by name
    pub fn record_type(&self, name: &str) -> Result<&RecordType, StoreError> {
        self.record_types
            .get(name)
            .ok_or_else(|| StoreError::UnknownRecordType(name.to_string()))
    }

    /// Look up the record type mapped to a table
    pub fn record_type_by_table(&self, table: &str) -> Option<&RecordType> {
        self.record_types.values().find(|rt| rt.table == table)
    }

    /// Find the record type a foreign key points to
    pub fn resolve_foreign_key(&self, fk: &ForeignKey) -> Result<&RecordType, StoreError> {
        self.record_type_by_table(&fk.table)
            .ok_or_else(|| StoreError::UnknownTable(fk.table.clone()))
    }

    /// All record types in registration order
    pub fn record_types(&self) -> impl Iterator<Item = &RecordType> {
        self.record_types.values()
    }
}

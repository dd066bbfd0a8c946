//! Module providing JSON snapshots of a [`MemoryStore`]
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::memory::{MemoryStore, Tables};
use crate::store::record::{Record, RecordId};
use crate::store::schema::{Schema, ID_COLUMN};
use crate::store::value::Value;
use crate::store::RecordStore;

// region JSON Store
/// Represents a JSON serialized store: the schema, then the rows of every table
#[derive(Serialize, Deserialize)]
struct JsonStore {
    schema: Schema,
    records: IndexMap<String, Vec<IndexMap<String, Value>>>,
    next_ids: IndexMap<String, RecordId>,
}
// endregion JSON Store

// region Conversions
impl MemoryStore {
    /// Read a store snapshot written by [`MemoryStore::write_json`]
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<MemoryStore, JsonError> {
        let store_str = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) => return Err(JsonError::UnableToRead(format!("{:?}", err))),
        };
        let json_store = match serde_json::from_str::<JsonStore>(&store_str) {
            Ok(store) => store,
            Err(err) => return Err(JsonError::UnableToParse(format!("{:?}", err))),
        };
        MemoryStore::from_json(json_store)
    }

    /// Write the committed contents of the store to a file
    ///
    /// JSON has no infinite or NaN numbers, a float column holding one fails with
    /// [`JsonError::NonFiniteFloat`].
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), JsonError> {
        let store_string = serde_json::to_string_pretty(&self.to_json()?)?;
        fs::write(path, store_string)?;
        Ok(())
    }

    fn from_json(json_store: JsonStore) -> Result<Self, JsonError> {
        let mut tables = Tables::default();
        for (record_type, rows) in json_store.records {
            if json_store.schema.record_type(&record_type).is_err() {
                return Err(JsonError::UnknownRecordType(record_type));
            }
            let table = tables.rows.entry(record_type.clone()).or_default();
            for mut values in rows {
                let id = match values.shift_remove(ID_COLUMN).as_ref().and_then(Value::as_i64) {
                    Some(id) => id,
                    None => return Err(JsonError::MissingId(record_type)),
                };
                table.insert(id, Record::new(&record_type, id, values));
            }
            // Keep handing out ids above every stored id
            let next = table.keys().max().map_or(1, |max| max + 1);
            let stored = json_store.next_ids.get(&record_type).copied().unwrap_or(1);
            tables.next_ids.insert(record_type, next.max(stored));
        }
        Ok(MemoryStore::from_parts(json_store.schema, tables))
    }

    fn to_json(&self) -> Result<JsonStore, JsonError> {
        let tables = self.committed_tables();
        let mut records = IndexMap::new();
        for (record_type, table) in &tables.rows {
            let mut rows = Vec::with_capacity(table.len());
            for record in table.values() {
                for (column, value) in record.values() {
                    if matches!(value, Value::Float(f) if !f.is_finite()) {
                        return Err(JsonError::NonFiniteFloat {
                            record: record.to_string(),
                            column: column.clone(),
                        });
                    }
                }
                rows.push(record.values().clone());
            }
            records.insert(record_type.clone(), rows);
        }
        Ok(JsonStore {
            schema: self.schema().clone(),
            records,
            next_ids: tables.next_ids.clone(),
        })
    }
}

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("Unable to read file due to {0}")]
    UnableToRead(String),
    #[error("Unable to parse json due to {0}")]
    UnableToParse(String),
    #[error("Snapshot holds records of unregistered type {0}")]
    UnknownRecordType(String),
    #[error("Snapshot holds a {0} record without an integer id")]
    MissingId(String),
    #[error("{record} holds a non-finite float in {column}")]
    NonFiniteFloat { record: String, column: String },
    #[error("Serde json parse error")]
    SerdeJsonParseError(#[from] serde_json::Error),
    #[error("Unable to write to file")]
    UnableToWrite(#[from] std::io::Error),
}
// endregion Conversions

#[cfg(test)]
mod json_tests {
    use super::*;
    use crate::store::memory::tests::diet_schema;
    use crate::store::query::QuerySet;

    #[test]
    fn snapshot_survives_a_file() {
        let mut store = MemoryStore::new(diet_schema());
        store
            .insert_values("Food", [("name", Value::from("oats")), ("cost", 1.5.into())])
            .unwrap();
        store
            .insert_values("Food", [("name", Value::from("milk")), ("cost", 2.into())])
            .unwrap();
        store.delete("Food", 2).unwrap();

        let path = std::env::temp_dir().join(format!("ormopt_snapshot_{}.json", std::process::id()));
        store.write_json(&path).unwrap();
        let mut read = MemoryStore::read_json(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(read.schema(), store.schema());
        let foods = read.query(&QuerySet::all("Food")).unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].get("cost").unwrap(), &Value::Float(1.5));
        assert_eq!(foods[0].get("problem_run_id").unwrap(), &Value::Null);
        // The deleted id is not reused
        let rice = read.insert_values("Food", [("name", "rice")]).unwrap();
        assert_eq!(rice.id(), 3);
    }

    #[test]
    fn unknown_record_type_is_rejected() {
        let json_store = JsonStore {
            schema: Schema::new(),
            records: IndexMap::from([("Food".to_string(), vec![])]),
            next_ids: IndexMap::new(),
        };
        match MemoryStore::from_json(json_store) {
            Err(JsonError::UnknownRecordType(name)) => assert_eq!(name, "Food"),
            _ => panic!("Unregistered record type accepted"),
        }
    }

    #[test]
    fn open_transactions_are_not_written() {
        let mut store = MemoryStore::new(diet_schema());
        store.insert_values("Food", [("name", "oats")]).unwrap();
        store.begin().unwrap();
        store.insert_values("Food", [("name", "milk")]).unwrap();

        let path = std::env::temp_dir().join(format!("ormopt_open_tx_{}.json", std::process::id()));
        store.write_json(&path).unwrap();
        let read = MemoryStore::read_json(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let foods = read.query(&QuerySet::all("Food")).unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].get("name").unwrap(), &Value::from("oats"));
        assert!(!read.in_transaction());
    }

    #[test]
    fn infinite_floats_are_refused() {
        let mut store = MemoryStore::new(diet_schema());
        store
            .insert_values("Nutrient", [("name", Value::from("fat")), ("upper_bound", f64::INFINITY.into())])
            .unwrap();
        let path = std::env::temp_dir().join(format!("ormopt_inf_{}.json", std::process::id()));
        match store.write_json(&path) {
            Err(JsonError::NonFiniteFloat { column, .. }) => assert_eq!(column, "upper_bound"),
            _ => panic!("Infinite float written to json"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_reported() {
        let res = MemoryStore::read_json(std::env::temp_dir().join("ormopt_no_such_file.json"));
        assert!(matches!(res, Err(JsonError::UnableToRead(_))));
    }
}

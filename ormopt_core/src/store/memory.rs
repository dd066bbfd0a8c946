//! In-memory implementation of [`RecordStore`]
use indexmap::IndexMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::store::query::QuerySet;
use crate::store::record::{Record, RecordId};
use crate::store::schema::{RecordType, Schema, ID_COLUMN};
use crate::store::value::Value;
use crate::store::{RecordStore, StoreError};

/// Rows of every record type, plus the next id to hand out per type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Tables {
    pub(crate) rows: IndexMap<String, IndexMap<RecordId, Record>>,
    pub(crate) next_ids: IndexMap<String, RecordId>,
}

/// A record store kept in memory
///
/// Transactions take a snapshot of every table on [`RecordStore::begin`], which
/// [`RecordStore::rollback`] restores. Nested transactions are not supported.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    schema: Schema,
    tables: Tables,
    snapshot: Option<Tables>,
}

impl MemoryStore {
    /// Create an empty store for a schema
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            tables: Tables::default(),
            snapshot: None,
        }
    }

    pub(crate) fn from_parts(schema: Schema, tables: Tables) -> Self {
        Self {
            schema,
            tables,
            snapshot: None,
        }
    }

    /// Tables as of the last commit, open transactions are left out
    pub(crate) fn committed_tables(&self) -> &Tables {
        self.snapshot.as_ref().unwrap_or(&self.tables)
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Number of records of a record type
    pub fn count(&self, record_type: &str) -> usize {
        self.tables.rows.get(record_type).map_or(0, |t| t.len())
    }

    /// Insert a record from `(column, value)` pairs
    pub fn insert_values<V: Into<Value>>(
        &mut self,
        record_type: &str,
        values: impl IntoIterator<Item = (&'static str, V)>,
    ) -> Result<Record, StoreError> {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into()))
            .collect();
        self.insert(record_type, values)
    }

    // region Validation Functions
    /// Check that a record can be written, `record` already holds every column
    fn validate_record(&self, record_type: &RecordType, record: &Record) -> Result<(), StoreError> {
        for column in record.values().keys() {
            record_type.column(column)?;
        }
        for column in record_type.columns() {
            let value = record.get(&column.name)?;
            if value.is_null() {
                if !column.nullable {
                    return Err(StoreError::Integrity {
                        record: record.to_string(),
                        reason: format!("column {} is not nullable", column.name),
                    });
                }
                continue;
            }
            if !column.kind.accepts(value) {
                return Err(StoreError::TypeMismatch {
                    record_type: record_type.name.clone(),
                    column: column.name.clone(),
                    expected: column.kind,
                    value: value.clone(),
                });
            }
            if column.unique && column.name != ID_COLUMN {
                let clash = self.rows_of(&record_type.name).any(|other| {
                    other.id() != record.id()
                        && other.get(&column.name).is_ok_and(|v| v == value)
                });
                if clash {
                    return Err(StoreError::Integrity {
                        record: record.to_string(),
                        reason: format!(
                            "unique constraint on {}.{} violated by value {}",
                            record_type.table, column.name, value
                        ),
                    });
                }
            }
            if let Some(fk) = &column.foreign_key {
                let target = self.schema.resolve_foreign_key(fk)?;
                let self_reference = target.name == record_type.name
                    && record.get(&fk.column).is_ok_and(|v| v == value);
                let exists = self_reference
                    || self
                        .rows_of(&target.name)
                        .any(|other| other.get(&fk.column).is_ok_and(|v| v == value));
                if !exists {
                    return Err(StoreError::Integrity {
                        record: record.to_string(),
                        reason: format!(
                            "foreign key {} references missing {} = {}",
                            column.name,
                            fk.target_fullname(),
                            value
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that no record still references the record being deleted
    fn validate_delete(&self, record: &Record) -> Result<(), StoreError> {
        let record_type = self.schema.record_type(record.record_type())?;
        for other_type in self.schema.record_types() {
            for (column, fk) in other_type.foreign_keys() {
                if fk.table != record_type.table {
                    continue;
                }
                let target = record.get(&fk.column)?;
                let referrer = self.rows_of(&other_type.name).find(|other| {
                    !(other.record_type() == record.record_type() && other.id() == record.id())
                        && other.get(&column.name).is_ok_and(|v| v == target)
                });
                if let Some(referrer) = referrer {
                    return Err(StoreError::Integrity {
                        record: record.to_string(),
                        reason: format!("still referenced by {} via {}", referrer, column.name),
                    });
                }
            }
        }
        Ok(())
    }
    // endregion Validation Functions

    fn rows_of(&self, record_type: &str) -> impl Iterator<Item = &Record> {
        self.tables.rows.get(record_type).into_iter().flat_map(|t| t.values())
    }
}

impl RecordStore for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn query(&self, queryset: &QuerySet) -> Result<Vec<Record>, StoreError> {
        let record_type = self.schema.record_type(queryset.record_type())?;
        queryset.get_filter().validate(record_type)?;
        let mut results = Vec::new();
        for record in self.rows_of(&record_type.name) {
            if queryset.get_filter().matches(record)? {
                results.push(record.clone());
            }
        }
        trace!("query {} returned {} records", queryset, results.len());
        Ok(results)
    }

    fn get(&self, record_type: &str, id: RecordId) -> Result<Record, StoreError> {
        self.schema.record_type(record_type)?;
        self.tables
            .rows
            .get(record_type)
            .and_then(|t| t.get(&id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                record_type: record_type.to_string(),
                filter: format!("id = {}", id),
            })
    }

    fn insert(
        &mut self,
        record_type: &str,
        values: IndexMap<String, Value>,
    ) -> Result<Record, StoreError> {
        let rt = self.schema.record_type(record_type)?;
        if values.contains_key(ID_COLUMN) {
            return Err(StoreError::ImmutableColumn(ID_COLUMN.to_string()));
        }
        let id = self.tables.next_ids.get(record_type).copied().unwrap_or(1);
        let mut full_values = IndexMap::new();
        for column in rt.columns().filter(|c| c.name != ID_COLUMN) {
            full_values.insert(column.name.clone(), Value::Null);
        }
        for (column, value) in values {
            full_values.insert(column, value);
        }
        let record = Record::new(record_type, id, full_values);
        self.validate_record(rt, &record)?;
        self.tables.next_ids.insert(record_type.to_string(), id + 1);
        self.tables
            .rows
            .entry(record_type.to_string())
            .or_default()
            .insert(id, record.clone());
        debug!("inserted {}", record);
        Ok(record)
    }

    fn save(&mut self, record: &Record) -> Result<(), StoreError> {
        let rt = self.schema.record_type(record.record_type())?;
        let existing = self.get(record.record_type(), record.id())?;
        // Columns the caller never set keep their stored value
        let mut merged = existing.values().clone();
        for (column, value) in record.values() {
            merged.insert(column.clone(), value.clone());
        }
        merged.shift_remove(ID_COLUMN);
        let merged = Record::new(record.record_type(), record.id(), merged);
        self.validate_record(rt, &merged)?;
        if let Some(table) = self.tables.rows.get_mut(record.record_type()) {
            table.insert(record.id(), merged);
        }
        debug!("saved {}", record);
        Ok(())
    }

    fn delete(&mut self, record_type: &str, id: RecordId) -> Result<(), StoreError> {
        let record = self.get(record_type, id)?;
        self.validate_delete(&record)?;
        if let Some(table) = self.tables.rows.get_mut(record_type) {
            table.shift_remove(&id);
        }
        debug!("deleted {}", record);
        Ok(())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err(StoreError::Transaction(
                "a transaction is already open".to_string(),
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(StoreError::Transaction("no open transaction to commit".to_string())),
        }
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        match self.snapshot.take() {
            Some(tables) => {
                self.tables = tables;
                Ok(())
            }
            None => Err(StoreError::Transaction(
                "no open transaction to roll back".to_string(),
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::query::Filter;
    use crate::store::schema::{ColumnBuilder, ColumnKind, RecordType};

    /// Schema shaped like the diet problem: foods, nutrients and food nutrient amounts
    pub(crate) fn diet_schema() -> Schema {
        Schema::new()
            .with_record_type(
                RecordType::new("Food", "foods")
                    .with_column(
                        ColumnBuilder::default()
                            .name("name")
                            .kind(ColumnKind::Text)
                            .unique(true)
                            .build()
                            .unwrap(),
                    )
                    .with_attribute("cost", ColumnKind::Float),
            )
            .and_then(|s| {
                s.with_record_type(
                    RecordType::new("Nutrient", "nutrients")
                        .with_attribute("name", ColumnKind::Text)
                        .with_attribute("lower_bound", ColumnKind::Float)
                        .with_attribute("upper_bound", ColumnKind::Float),
                )
            })
            .and_then(|s| {
                s.with_record_type(
                    RecordType::new("FoodNutrientAmount", "food_nutrient_amounts")
                        .with_foreign_key("food_id", "foods", "id")
                        .with_foreign_key("nutrient_id", "nutrients", "id")
                        .with_attribute("amount", ColumnKind::Float),
                )
            })
            .unwrap()
    }

    fn store_with_foods() -> MemoryStore {
        let mut store = MemoryStore::new(diet_schema());
        store
            .insert_values("Food", [("name", Value::from("oats")), ("cost", 1.5.into())])
            .unwrap();
        store
            .insert_values("Food", [("name", Value::from("milk")), ("cost", 2.into())])
            .unwrap();
        store
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let store = store_with_foods();
        let foods = store.query(&QuerySet::all("Food")).unwrap();
        assert_eq!(foods.iter().map(|r| r.id()).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(foods[1].get("cost").unwrap(), &Value::Integer(2));
        assert_eq!(foods[0].get("problem_run_id").unwrap(), &Value::Null);
    }

    #[test]
    fn query_applies_filters() {
        let store = store_with_foods();
        let res = store
            .query(&QuerySet::all("Food").filter_by("name", "milk"))
            .unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].id(), 2);
        assert!(store
            .query(&QuerySet::all("Food").filter(Filter::not_null("colour")))
            .is_err());
    }

    #[test]
    fn get_and_find_one_report_missing_records() {
        let store = store_with_foods();
        assert_eq!(store.get("Food", 1).unwrap().get("name").unwrap(), &Value::from("oats"));
        match store.get("Food", 9) {
            Err(StoreError::NotFound { record_type, filter }) => {
                assert_eq!(record_type, "Food");
                assert_eq!(filter, "id = 9");
            }
            _ => panic!("Missing record not reported"),
        }
        let missing = store.find_one(&QuerySet::all("Food").filter_by("name", "rice"));
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn unique_violation_names_record() {
        let mut store = store_with_foods();
        let mut milk = store.get("Food", 2).unwrap();
        milk.set("name", "oats").unwrap();
        match store.save(&milk) {
            Err(StoreError::Integrity { record, reason }) => {
                assert_eq!(record, "<Food id=2>");
                assert!(reason.contains("foods.name"));
            }
            _ => panic!("Unique constraint not enforced"),
        }
        // The stored record is unchanged
        assert_eq!(store.get("Food", 2).unwrap().get("name").unwrap(), &Value::from("milk"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut store = store_with_foods();
        let res = store.insert_values("Food", [("cost", Value::from("cheap"))]);
        assert!(matches!(res, Err(StoreError::TypeMismatch { .. })));
        assert_eq!(store.count("Food"), 2);
    }

    #[test]
    fn foreign_keys_must_exist() {
        let mut store = store_with_foods();
        let res = store.insert_values(
            "FoodNutrientAmount",
            [("food_id", Value::from(1)), ("nutrient_id", 5.into())],
        );
        match res {
            Err(StoreError::Integrity { reason, .. }) => assert!(reason.contains("nutrients.id")),
            _ => panic!("Dangling foreign key not caught"),
        }
    }

    #[test]
    fn delete_refuses_referenced_records() {
        let mut store = store_with_foods();
        store.insert_values("Nutrient", [("name", "protein")]).unwrap();
        store
            .insert_values("FoodNutrientAmount", [("food_id", 1), ("nutrient_id", 1)])
            .unwrap();
        assert!(matches!(store.delete("Food", 1), Err(StoreError::Integrity { .. })));
        store.delete("Food", 2).unwrap();
        assert_eq!(store.count("Food"), 1);
    }

    #[test]
    fn rollback_restores_snapshot() {
        let mut store = store_with_foods();
        store.begin().unwrap();
        assert!(store.in_transaction());
        store.insert_values("Food", [("name", "rice")]).unwrap();
        assert_eq!(store.count("Food"), 3);
        store.rollback().unwrap();
        assert_eq!(store.count("Food"), 2);
        // Ids handed out inside the rolled back transaction are reused
        let rice = store.insert_values("Food", [("name", "rice")]).unwrap();
        assert_eq!(rice.id(), 3);
    }

    #[test]
    fn transactions_do_not_nest() {
        let mut store = store_with_foods();
        store.begin().unwrap();
        assert!(matches!(store.begin(), Err(StoreError::Transaction(_))));
        store.commit().unwrap();
        assert!(matches!(store.commit(), Err(StoreError::Transaction(_))));
        assert!(matches!(store.rollback(), Err(StoreError::Transaction(_))));
    }
}

//! Projection of queried records onto model data
use indexmap::IndexMap;
use log::trace;

use crate::orm::{IndexSpec, OrmError};
use crate::store::{QuerySet, RecordStore, Value};

/// Data for one set or parameter, built fresh from a query every time it is needed
#[derive(Debug, Clone, PartialEq)]
pub enum DataMapping {
    /// A single value
    Scalar(Value),
    /// Values in query order
    List(Vec<Value>),
    /// Values keyed by one column
    Indexed(IndexMap<Value, Value>),
    /// Values keyed by a tuple of columns
    MultiIndexed(IndexMap<Vec<Value>, Value>),
}

impl DataMapping {
    /// Values held by the mapping, in order
    pub fn values(&self) -> Vec<Value> {
        match self {
            DataMapping::Scalar(v) => vec![v.clone()],
            DataMapping::List(vs) => vs.clone(),
            DataMapping::Indexed(map) => map.values().cloned().collect(),
            DataMapping::MultiIndexed(map) => map.values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DataMapping::Scalar(_) => 1,
            DataMapping::List(vs) => vs.len(),
            DataMapping::Indexed(map) => map.len(),
            DataMapping::MultiIndexed(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the shape, used in error messages
    pub fn shape(&self) -> &'static str {
        match self {
            DataMapping::Scalar(_) => "scalar",
            DataMapping::List(_) => "list",
            DataMapping::Indexed(_) => "indexed",
            DataMapping::MultiIndexed(_) => "multi-indexed",
        }
    }
}

/// Project `from_attr` of the records selected by `queryset` onto a [`DataMapping`]
///
/// Records whose `from_attr` is Null are skipped. Without an index, a single remaining value
/// gives a [`DataMapping::Scalar`] and any other count a [`DataMapping::List`]. With an
/// index, later records overwrite earlier ones with the same key.
///
/// # Examples
/// ```rust
/// use ormopt_core::orm::projection::{project, DataMapping};
/// use ormopt_core::orm::IndexSpec;
/// use ormopt_core::store::{ColumnKind, MemoryStore, QuerySet, RecordStore, RecordType, Schema, Value};
/// let schema = Schema::new()
///     .with_record_type(RecordType::new("Food", "foods").with_attribute("cost", ColumnKind::Float))
///     .unwrap();
/// let mut store = MemoryStore::new(schema);
/// store.insert_values("Food", [("cost", 2.5)]).unwrap();
/// let costs = project(&store, "Food", "cost", &IndexSpec::from("id"), &QuerySet::all("Food")).unwrap();
/// if let DataMapping::Indexed(costs) = costs {
///     assert_eq!(costs[&Value::Integer(1)], Value::Float(2.5));
/// } else {
///     panic!("Expected indexed data")
/// }
/// ```
pub fn project<S: RecordStore + ?Sized>(
    store: &S,
    record_type: &str,
    from_attr: &str,
    indexed_by: &IndexSpec,
    queryset: &QuerySet,
) -> Result<DataMapping, OrmError> {
    if queryset.record_type() != record_type {
        return Err(OrmError::QuerySetMismatch {
            expected: record_type.to_string(),
            found: queryset.record_type().to_string(),
        });
    }
    let rt = store.schema().record_type(record_type)?;
    rt.column(from_attr)?;
    for column in indexed_by.columns() {
        rt.column(column)?;
    }
    let records = store.query(queryset)?;
    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let value = record.get(from_attr)?;
        if !value.is_null() {
            rows.push((record, value.clone()));
        }
    }
    trace!(
        "projecting {} over {} non-null rows of {}",
        from_attr,
        rows.len(),
        queryset
    );
    Ok(match indexed_by {
        IndexSpec::NoIndex => {
            if rows.len() == 1 {
                DataMapping::Scalar(rows.remove(0).1)
            } else {
                DataMapping::List(rows.into_iter().map(|(_, v)| v).collect())
            }
        }
        IndexSpec::Single(column) => {
            let mut map = IndexMap::new();
            for (record, value) in rows {
                map.insert(record.get(column)?.clone(), value);
            }
            DataMapping::Indexed(map)
        }
        IndexSpec::Multi(columns) => {
            let mut map = IndexMap::new();
            for (record, value) in rows {
                let key = columns
                    .iter()
                    .map(|c| record.get(c).cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                map.insert(key, value);
            }
            DataMapping::MultiIndexed(map)
        }
    })
}

//! Run ledger: which records took part in which solved problem run
//!
//! Every problem gets one [`ProblemDetail`] record, created with its first recorded run.
//! Each successful solve adds a [`ProblemRun`] and stamps the records the problem read with
//! the id of that run.
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::orm::problem::Problem;
use crate::orm::OrmError;
use crate::store::schema::{
    PROBLEM_DETAIL_COLUMN, PROBLEM_DETAIL_TYPE, PROBLEM_RUN_COLUMN, PROBLEM_RUN_TYPE,
};
use crate::store::{Filter, QuerySet, Record, RecordId, RecordStore, StoreError, Value};

/// Name, description and version of a problem
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemDetail {
    pub id: RecordId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
}

impl TryFrom<&Record> for ProblemDetail {
    type Error = OrmError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let text = |column: &str| -> Result<Option<String>, StoreError> {
            Ok(record.get(column)?.as_str().map(String::from))
        };
        Ok(Self {
            id: record.id(),
            name: text("name")?,
            description: text("description")?,
            version: text("version")?,
        })
    }
}

/// One successful solve of a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemRun {
    pub id: RecordId,
    pub problem_detail_id: Option<RecordId>,
}

impl TryFrom<&Record> for ProblemRun {
    type Error = OrmError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id(),
            problem_detail_id: record.get(PROBLEM_DETAIL_COLUMN)?.as_i64(),
        })
    }
}

/// Detail and run written by [`record_run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    pub detail: ProblemDetail,
    pub run: ProblemRun,
}

/// Record a solved run of `problem` in one transaction
///
/// The problem detail is created if the problem has none yet. Captured records that were
/// deleted since the model was defined are skipped. Any failure rolls the transaction back
/// and leaves the store as it was.
pub fn record_run<S: RecordStore + ?Sized>(
    store: &mut S,
    problem: &Problem,
) -> Result<RecordedRun, OrmError> {
    store.begin()?;
    match write_run(store, problem) {
        Ok(recorded) => {
            store.commit()?;
            info!(
                "recorded run {} of problem {}",
                recorded.run.id,
                problem.name()
            );
            Ok(recorded)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback() {
                warn!("couldn't roll back run of {}: {}", problem.name(), rollback_err);
            }
            Err(err)
        }
    }
}

fn write_run<S: RecordStore + ?Sized>(
    store: &mut S,
    problem: &Problem,
) -> Result<RecordedRun, OrmError> {
    let detail = match problem.problem_detail() {
        Some(id) => store.get(PROBLEM_DETAIL_TYPE, id)?,
        None => {
            let mut values = IndexMap::new();
            values.insert("name".to_string(), Value::from(problem.name()));
            values.insert("description".to_string(), Value::from(problem.description()));
            values.insert("version".to_string(), Value::from(problem.version()));
            store.insert(PROBLEM_DETAIL_TYPE, values)?
        }
    };
    let mut values = IndexMap::new();
    values.insert(PROBLEM_DETAIL_COLUMN.to_string(), Value::from(detail.id()));
    let run = store.insert(PROBLEM_RUN_TYPE, values)?;

    let mut captured: IndexMap<String, Vec<RecordId>> = IndexMap::new();
    for (record_type, id) in problem.referenced_records() {
        captured.entry(record_type).or_default().push(id);
    }
    for (record_type, ids) in captured {
        if !store.schema().record_type(&record_type)?.is_run_tracked() {
            debug!("{} is not run tracked, skipping {} records", record_type, ids.len());
            continue;
        }
        // Records deleted since the model was defined are no longer stamped
        let queryset = QuerySet::all(&record_type).filter(Filter::ids(ids.clone()));
        let records = store.query(&queryset)?;
        if records.len() < ids.len() {
            let missing: Vec<_> = ids
                .iter()
                .filter(|id| !records.iter().any(|r| r.id() == **id))
                .collect();
            debug!("{} records {:?} no longer exist, not stamping them", record_type, missing);
        }
        for mut record in records {
            record.set(PROBLEM_RUN_COLUMN, run.id())?;
            store.save(&record)?;
        }
    }
    Ok(RecordedRun {
        detail: ProblemDetail::try_from(&detail)?,
        run: ProblemRun::try_from(&run)?,
    })
}

/// Every problem detail in the store
pub fn problem_details<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<ProblemDetail>, OrmError> {
    store
        .query(&QuerySet::all(PROBLEM_DETAIL_TYPE))?
        .iter()
        .map(ProblemDetail::try_from)
        .collect()
}

/// Runs recorded under a problem detail, oldest first
pub fn problem_runs<S: RecordStore + ?Sized>(
    store: &S,
    problem_detail: RecordId,
) -> Result<Vec<ProblemRun>, OrmError> {
    let queryset = QuerySet::all(PROBLEM_RUN_TYPE).filter_by(PROBLEM_DETAIL_COLUMN, problem_detail);
    store
        .query(&queryset)?
        .iter()
        .map(ProblemRun::try_from)
        .collect()
}

/// Records of `record_type` last used by a run
pub fn records_of_run<S: RecordStore + ?Sized>(
    store: &S,
    record_type: &str,
    run: RecordId,
) -> Result<Vec<Record>, OrmError> {
    Ok(store.query(&QuerySet::all(record_type).filter_by(PROBLEM_RUN_COLUMN, run))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::solvers::SolverOptions;
    use crate::orm::components::OrmSetBuilder;
    use crate::orm::problem::tests::{diet_definition, diet_store, StubSolver};
    use crate::orm::problem::ProblemDefinition;
    use crate::store::schema::{ColumnKind, RecordType};
    use crate::store::{MemoryStore, Schema};

    #[test]
    fn runs_are_listed_per_detail() {
        let mut store = diet_store();
        let mut problem = Problem::new(diet_definition(), store.schema(), "Diet", None, None).unwrap();
        problem.create_instance(&store).unwrap();
        let solver = StubSolver { fail: false };
        problem.solve(&mut store, &solver, &SolverOptions::default()).unwrap();
        problem.solve(&mut store, &solver, &SolverOptions::default()).unwrap();

        let details = problem_details(&store).unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].name.as_deref(), Some("Diet"));
        assert_eq!(details[0].description, None);
        let runs = problem_runs(&store, details[0].id).unwrap();
        assert_eq!(runs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(runs.iter().all(|r| r.problem_detail_id == Some(details[0].id)));

        assert!(records_of_run(&store, "Food", 1).unwrap().is_empty());
        assert_eq!(records_of_run(&store, "Food", 2).unwrap().len(), 2);
    }

    /// Memory store whose saves of one record type are refused
    struct RefusingStore {
        inner: MemoryStore,
        refuse: &'static str,
    }

    impl RecordStore for RefusingStore {
        fn schema(&self) -> &Schema {
            self.inner.schema()
        }

        fn query(&self, queryset: &QuerySet) -> Result<Vec<Record>, StoreError> {
            self.inner.query(queryset)
        }

        fn get(&self, record_type: &str, id: RecordId) -> Result<Record, StoreError> {
            self.inner.get(record_type, id)
        }

        fn insert(
            &mut self,
            record_type: &str,
            values: IndexMap<String, Value>,
        ) -> Result<Record, StoreError> {
            self.inner.insert(record_type, values)
        }

        fn save(&mut self, record: &Record) -> Result<(), StoreError> {
            if record.record_type() == self.refuse {
                return Err(StoreError::Integrity {
                    record: record.to_string(),
                    reason: "read only".to_string(),
                });
            }
            self.inner.save(record)
        }

        fn delete(&mut self, record_type: &str, id: RecordId) -> Result<(), StoreError> {
            self.inner.delete(record_type, id)
        }

        fn begin(&mut self) -> Result<(), StoreError> {
            self.inner.begin()
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            self.inner.commit()
        }

        fn rollback(&mut self) -> Result<(), StoreError> {
            self.inner.rollback()
        }
    }

    #[test]
    fn stamping_failure_rolls_back() {
        let mut store = RefusingStore {
            inner: diet_store(),
            refuse: "FoodNutrientAmount",
        };
        let mut problem = Problem::new(diet_definition(), store.schema(), "Diet", None, None).unwrap();
        problem.create_instance(&store).unwrap();

        let res = problem.solve(&mut store, &StubSolver { fail: false }, &SolverOptions::default());
        assert!(matches!(res, Err(OrmError::Store(StoreError::Integrity { .. }))));
        let store = store.inner;
        assert!(!store.in_transaction());
        assert_eq!(store.count("ProblemDetail"), 0);
        assert_eq!(store.count("ProblemRun"), 0);
        // Foods are stamped before the refused amounts, the rollback undoes them
        assert_eq!(store.get("Food", 1).unwrap().problem_run_id(), None);
        assert_eq!(problem.problem_detail(), None);
        assert_eq!(problem.current_problem_run(), None);
    }

    #[test]
    fn deleted_records_are_skipped() {
        let mut store = diet_store();
        let mut problem = Problem::new(diet_definition(), store.schema(), "Diet", None, None).unwrap();
        problem.create_instance(&store).unwrap();
        store.delete("FoodNutrientAmount", 4).unwrap();

        problem
            .solve(&mut store, &StubSolver { fail: false }, &SolverOptions::default())
            .unwrap();
        let run = problem.current_problem_run().unwrap();
        assert_eq!(store.count("ProblemRun"), 1);
        assert_eq!(records_of_run(&store, "FoodNutrientAmount", run).unwrap().len(), 3);
        assert_eq!(records_of_run(&store, "Food", run).unwrap().len(), 2);
        assert!(problem.solution().is_some());
    }

    #[test]
    fn untracked_records_are_not_stamped() {
        let schema = Schema::new()
            .with_record_type(
                RecordType::new("Shelf", "shelves")
                    .with_attribute("capacity", ColumnKind::Float)
                    .untracked(),
            )
            .unwrap();
        let mut store = MemoryStore::new(schema);
        store.insert_values("Shelf", [("capacity", 3.)]).unwrap();
        let definition = ProblemDefinition::new().with_set(
            OrmSetBuilder::default()
                .name("shelves")
                .record_type("Shelf")
                .build()
                .unwrap(),
        );
        let mut problem = Problem::new(definition, store.schema(), "Shelves", None, None).unwrap();
        problem.define_problem(&store).unwrap();

        let recorded = record_run(&mut store, &problem).unwrap();
        assert_eq!(recorded.run.problem_detail_id, Some(recorded.detail.id));
        assert_eq!(store.count("ProblemRun"), 1);
        assert_eq!(store.get("Shelf", 1).unwrap().problem_run_id(), None);
    }
}

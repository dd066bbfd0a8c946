//! Record type level helpers for adding record sourced components to any abstract model
//!
//! These work without a [`crate::orm::problem::Problem`]: a [`RecordMapper`] adds sets,
//! parameters and variables built from one record type, and [`create_data_dict`] projects
//! the data of every record sourced set and parameter of a model.
use indexmap::IndexMap;
use log::{debug, warn};

use crate::optimize::model::{AbstractModel, ModelData};
use crate::optimize::parameter::ParamComponent;
use crate::optimize::set::SetComponent;
use crate::optimize::variable::VarComponent;
use crate::orm::inference::infer_index_sets;
use crate::orm::{IndexSpec, OrmError, OrmOrigin, RecordSource};
use crate::store::{QuerySet, RecordStore, RecordType, Schema};

/// Adds components built from the records of one record type
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper<'a> {
    schema: &'a Schema,
    record_type: &'a RecordType,
}

impl<'a> RecordMapper<'a> {
    pub fn new(schema: &'a Schema, record_type: &str) -> Result<Self, OrmError> {
        Ok(Self {
            schema,
            record_type: schema.record_type(record_type)?,
        })
    }

    pub fn record_type(&self) -> &str {
        &self.record_type.name
    }

    /// Add a set whose members are `from_attr` of the queried records
    ///
    /// Without a queryset every record is used.
    pub fn create_set(
        &self,
        model: &mut AbstractModel,
        name: &str,
        from_attr: &str,
        queryset: Option<QuerySet>,
    ) -> Result<(), OrmError> {
        let source = self.source(from_attr, IndexSpec::NoIndex, queryset)?;
        debug!("creating set {} from {}", name, source.origin);
        model.add_set(SetComponent::from_records(name, source))?;
        Ok(())
    }

    /// Add a parameter whose values are `from_attr` of the queried records, keyed by
    /// `indexed_by`
    ///
    /// When `param` names no index sets they are inferred from the sets already in the model.
    pub fn create_param(
        &self,
        model: &mut AbstractModel,
        mut param: ParamComponent,
        from_attr: &str,
        indexed_by: IndexSpec,
        queryset: Option<QuerySet>,
    ) -> Result<(), OrmError> {
        if param.index_sets.is_empty() {
            param.index_sets = self.infer(model, &param.name, &indexed_by)?;
        }
        let source = self.source(from_attr, indexed_by, queryset)?;
        debug!(
            "creating param {} from {} over {:?}",
            param.name, source.origin, param.index_sets
        );
        param.source = Some(source);
        model.add_param(param)?;
        Ok(())
    }

    /// Add a variable indexed like `indexed_by`
    ///
    /// When `var` names no index sets they are inferred from the sets already in the model.
    pub fn create_var(
        &self,
        model: &mut AbstractModel,
        mut var: VarComponent,
        indexed_by: IndexSpec,
    ) -> Result<(), OrmError> {
        if var.index_sets.is_empty() {
            var.index_sets = self.infer(model, &var.name, &indexed_by)?;
        } else {
            self.check_columns(&indexed_by)?;
        }
        debug!("creating var {} over {:?}", var.name, var.index_sets);
        model.add_var(var)?;
        Ok(())
    }

    fn infer(
        &self,
        model: &AbstractModel,
        component: &str,
        indexed_by: &IndexSpec,
    ) -> Result<Vec<String>, OrmError> {
        let sets = infer_index_sets(self.schema, &self.record_type.name, indexed_by, model.sets())?;
        if sets.is_empty() && indexed_by.is_indexed() {
            warn!(
                "no declared set indexes {} of {} by {}",
                component, self.record_type.name, indexed_by
            );
        }
        Ok(sets.into_iter().map(|s| s.name.clone()).collect())
    }

    fn check_columns(&self, indexed_by: &IndexSpec) -> Result<(), OrmError> {
        for column in indexed_by.columns() {
            self.record_type.column(column)?;
        }
        Ok(())
    }

    fn source(
        &self,
        from_attr: &str,
        indexed_by: IndexSpec,
        queryset: Option<QuerySet>,
    ) -> Result<RecordSource, OrmError> {
        self.record_type.column(from_attr)?;
        self.check_columns(&indexed_by)?;
        let queryset = queryset.unwrap_or_else(|| QuerySet::all(&self.record_type.name));
        check_queryset(&self.record_type.name, &queryset)?;
        queryset.get_filter().validate(self.record_type)?;
        Ok(RecordSource {
            origin: OrmOrigin::new(&self.record_type.name, from_attr),
            indexed_by,
            queryset,
        })
    }
}

/// Fail when a queryset selects records of another type
pub(crate) fn check_queryset(record_type: &str, queryset: &QuerySet) -> Result<(), OrmError> {
    if queryset.record_type() != record_type {
        return Err(OrmError::QuerySetMismatch {
            expected: record_type.to_string(),
            found: queryset.record_type().to_string(),
        });
    }
    Ok(())
}

/// Build the data of every record sourced set and parameter of `model`
///
/// Components without a record source are left out, the model falls back to their
/// declared members or defaults.
pub fn create_data_dict<S: RecordStore + ?Sized>(
    model: &AbstractModel,
    store: &S,
    namespace: &str,
) -> Result<ModelData, OrmError> {
    let mut components = IndexMap::new();
    for set in model.sets() {
        if let Some(source) = set.source() {
            components.insert(set.name.clone(), source.project(store)?);
        }
    }
    for param in model.params() {
        if let Some(source) = &param.source {
            components.insert(param.name.clone(), source.project(store)?);
        }
    }
    let mut data = IndexMap::new();
    data.insert(namespace.to_string(), components);
    Ok(data)
}

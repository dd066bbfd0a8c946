//! Deferred descriptors of model components
//!
//! A wrapper names everything needed to build one component but touches no store until the
//! [`crate::orm::problem::Problem`] it is bound to defines its model.
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use derive_builder::Builder;

use crate::configuration;
use crate::optimize::constraint::{ConstraintComponent, ConstraintRule, ConstraintRuleFn};
use crate::optimize::expression::LinearExpr;
use crate::optimize::instance::ConcreteModel;
use crate::optimize::model::AbstractModel;
use crate::optimize::objective::{ObjectiveComponent, ObjectiveRuleFn, ObjectiveSense};
use crate::optimize::parameter::ParamComponent;
use crate::optimize::variable::{Domain, VarComponent};
use crate::optimize::ModelError;
use crate::orm::mixin::{check_queryset, RecordMapper};
use crate::orm::problem::ProblemKey;
use crate::orm::{IndexSpec, OrmError};
use crate::store::{QuerySet, RecordId, RecordStore, Schema, Value};

/// Problem a wrapper belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    #[default]
    Unbound,
    Bound(ProblemKey),
}

/// Behaviour shared by every component wrapper
pub trait OrmComponent {
    /// Name of the model component
    fn name(&self) -> &str;

    fn binding(&self) -> Binding;

    /// Attach the wrapper to a problem
    fn bind(&mut self, key: ProblemKey);

    /// Key of the problem the wrapper is bound to
    fn problem_key(&self) -> Result<ProblemKey, OrmError> {
        match self.binding() {
            Binding::Bound(key) => Ok(key),
            Binding::Unbound => Err(OrmError::NotBound(self.name().to_string())),
        }
    }

    /// Record type the component is built from, if any
    fn record_type(&self) -> Option<&str> {
        None
    }

    /// Ids of the records selected when the model was defined
    fn captured_ids(&self) -> &[RecordId] {
        &[]
    }

    /// Check attribute and index set names, `declared_sets` are the set names of the problem
    fn validate(&self, schema: &Schema, declared_sets: &[&str]) -> Result<(), OrmError>;
}

// region Validation Functions
fn validate_index_sets(
    component: &str,
    index_sets: &[String],
    declared_sets: &[&str],
) -> Result<(), OrmError> {
    match index_sets
        .iter()
        .find(|s| !declared_sets.contains(&s.as_str()))
    {
        Some(set) => Err(OrmError::UnknownIndexSet {
            component: component.to_string(),
            set: set.clone(),
        }),
        None => Ok(()),
    }
}

fn validate_columns(
    schema: &Schema,
    record_type: &str,
    columns: &[&str],
    queryset: Option<&QuerySet>,
) -> Result<(), OrmError> {
    let rt = schema.record_type(record_type)?;
    for column in columns {
        rt.column(column)?;
    }
    if let Some(queryset) = queryset {
        check_queryset(record_type, queryset)?;
        queryset.get_filter().validate(rt)?;
    }
    Ok(())
}

fn capture<S: RecordStore + ?Sized>(store: &S, queryset: &QuerySet) -> Result<Vec<RecordId>, OrmError> {
    Ok(store.query(queryset)?.iter().map(|r| r.id()).collect())
}
// endregion Validation Functions

// region Sets
/// Set whose members are an attribute of the selected records
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "OrmError"))]
pub struct OrmSet {
    #[builder(setter(into))]
    pub name: String,
    /// Record type the members come from
    #[builder(setter(into))]
    pub record_type: String,
    /// Attribute holding the members
    #[builder(setter(into), default = "configuration::read().from_attr.clone()")]
    pub from_attr: String,
    /// Records to use, every record when None
    #[builder(default = "None", setter(strip_option))]
    pub queryset: Option<QuerySet>,
    #[builder(setter(skip))]
    binding: Binding,
    #[builder(setter(skip))]
    captured_ids: Vec<RecordId>,
}

impl OrmSet {
    pub fn queryset(&self) -> QuerySet {
        self.queryset
            .clone()
            .unwrap_or_else(|| QuerySet::all(&self.record_type))
    }

    /// Add the set to `model`, capturing the ids of the selected records
    pub fn materialize<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        model: &mut AbstractModel,
    ) -> Result<(), OrmError> {
        let queryset = self.queryset();
        let mapper = RecordMapper::new(store.schema(), &self.record_type)?;
        mapper.create_set(model, &self.name, &self.from_attr, Some(queryset.clone()))?;
        self.captured_ids = capture(store, &queryset)?;
        Ok(())
    }
}

impl OrmComponent for OrmSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Binding {
        self.binding
    }

    fn bind(&mut self, key: ProblemKey) {
        self.binding = Binding::Bound(key);
    }

    fn record_type(&self) -> Option<&str> {
        Some(&self.record_type)
    }

    fn captured_ids(&self) -> &[RecordId] {
        &self.captured_ids
    }

    fn validate(&self, schema: &Schema, _declared_sets: &[&str]) -> Result<(), OrmError> {
        validate_columns(
            schema,
            &self.record_type,
            &[self.from_attr.as_str()],
            self.queryset.as_ref(),
        )
    }
}
// endregion Sets

// region Parameters
/// Parameter whose values are an attribute of the selected records
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "OrmError"))]
pub struct OrmParam {
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub record_type: String,
    /// Attribute holding the values
    #[builder(setter(into), default = "configuration::read().from_attr.clone()")]
    pub from_attr: String,
    /// Columns keying the values
    #[builder(setter(into), default = "IndexSpec::NoIndex")]
    pub indexed_by: IndexSpec,
    /// Names of the index sets, inferred from `indexed_by` when empty
    #[builder(default = "Vec::new()")]
    pub index_sets: Vec<String>,
    /// Value for indices without a record
    #[builder(default = "None", setter(name = "default_value", strip_option))]
    pub default: Option<f64>,
    /// Domain every value must lie in
    #[builder(default = "Domain::Reals")]
    pub within: Domain,
    #[builder(default = "None", setter(strip_option))]
    pub queryset: Option<QuerySet>,
    #[builder(setter(skip))]
    binding: Binding,
    #[builder(setter(skip))]
    captured_ids: Vec<RecordId>,
}

impl OrmParam {
    pub fn queryset(&self) -> QuerySet {
        self.queryset
            .clone()
            .unwrap_or_else(|| QuerySet::all(&self.record_type))
    }

    /// Add the parameter to `model`, capturing the ids of the selected records
    pub fn materialize<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        model: &mut AbstractModel,
    ) -> Result<(), OrmError> {
        let queryset = self.queryset();
        let param = ParamComponent {
            name: self.name.clone(),
            index_sets: self.index_sets.clone(),
            default: self.default,
            within: self.within,
            source: None,
        };
        let mapper = RecordMapper::new(store.schema(), &self.record_type)?;
        mapper.create_param(
            model,
            param,
            &self.from_attr,
            self.indexed_by.clone(),
            Some(queryset.clone()),
        )?;
        self.captured_ids = capture(store, &queryset)?;
        Ok(())
    }
}

impl OrmComponent for OrmParam {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Binding {
        self.binding
    }

    fn bind(&mut self, key: ProblemKey) {
        self.binding = Binding::Bound(key);
    }

    fn record_type(&self) -> Option<&str> {
        Some(&self.record_type)
    }

    fn captured_ids(&self) -> &[RecordId] {
        &self.captured_ids
    }

    fn validate(&self, schema: &Schema, declared_sets: &[&str]) -> Result<(), OrmError> {
        let mut columns = self.indexed_by.columns();
        columns.push(self.from_attr.as_str());
        validate_columns(schema, &self.record_type, &columns, self.queryset.as_ref())?;
        validate_index_sets(&self.name, &self.index_sets, declared_sets)
    }
}
// endregion Parameters

// region Variables
/// Variable indexed like the selected records
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "OrmError"))]
pub struct OrmVar {
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub record_type: String,
    /// Columns the variable is indexed like
    #[builder(setter(into), default = "IndexSpec::NoIndex")]
    pub indexed_by: IndexSpec,
    /// Names of the index sets, inferred from `indexed_by` when empty
    #[builder(default = "Vec::new()")]
    pub index_sets: Vec<String>,
    #[builder(default = "Domain::Reals")]
    pub domain: Domain,
    #[builder(default = "configuration::read().lower_bound")]
    pub lower_bound: f64,
    #[builder(default = "configuration::read().upper_bound")]
    pub upper_bound: f64,
    /// Records the variable stands for, every record when None
    #[builder(default = "None", setter(strip_option))]
    pub queryset: Option<QuerySet>,
    #[builder(setter(skip))]
    binding: Binding,
    #[builder(setter(skip))]
    captured_ids: Vec<RecordId>,
}

impl OrmVar {
    pub fn queryset(&self) -> QuerySet {
        self.queryset
            .clone()
            .unwrap_or_else(|| QuerySet::all(&self.record_type))
    }

    /// Add the variable to `model`, capturing the ids of the selected records
    pub fn materialize<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        model: &mut AbstractModel,
    ) -> Result<(), OrmError> {
        let queryset = self.queryset();
        let var = VarComponent {
            name: self.name.clone(),
            index_sets: self.index_sets.clone(),
            domain: self.domain,
            lower_bound: self.lower_bound,
            upper_bound: self.upper_bound,
        };
        let mapper = RecordMapper::new(store.schema(), &self.record_type)?;
        mapper.create_var(model, var, self.indexed_by.clone())?;
        self.captured_ids = capture(store, &queryset)?;
        Ok(())
    }
}

impl OrmComponent for OrmVar {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Binding {
        self.binding
    }

    fn bind(&mut self, key: ProblemKey) {
        self.binding = Binding::Bound(key);
    }

    fn record_type(&self) -> Option<&str> {
        Some(&self.record_type)
    }

    fn captured_ids(&self) -> &[RecordId] {
        &self.captured_ids
    }

    fn validate(&self, schema: &Schema, declared_sets: &[&str]) -> Result<(), OrmError> {
        validate_columns(
            schema,
            &self.record_type,
            &self.indexed_by.columns(),
            self.queryset.as_ref(),
        )?;
        validate_index_sets(&self.name, &self.index_sets, declared_sets)
    }
}
// endregion Variables

// region Rules
/// Constraint built by a rule for every index of its index sets
#[derive(Clone)]
pub struct OrmConstraint {
    pub name: String,
    pub index_sets: Vec<String>,
    rule: ConstraintRuleFn,
    binding: Binding,
}

impl OrmConstraint {
    pub fn materialize(&self, model: &mut AbstractModel) -> Result<(), OrmError> {
        model.add_constraint(ConstraintComponent {
            name: self.name.clone(),
            index_sets: self.index_sets.clone(),
            rule: Rc::clone(&self.rule),
        })?;
        Ok(())
    }
}

impl Debug for OrmConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrmConstraint")
            .field("name", &self.name)
            .field("index_sets", &self.index_sets)
            .field("binding", &self.binding)
            .finish()
    }
}

impl OrmComponent for OrmConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Binding {
        self.binding
    }

    fn bind(&mut self, key: ProblemKey) {
        self.binding = Binding::Bound(key);
    }

    fn validate(&self, _schema: &Schema, declared_sets: &[&str]) -> Result<(), OrmError> {
        validate_index_sets(&self.name, &self.index_sets, declared_sets)
    }
}

/// Create a constraint wrapper from a rule
///
/// # Examples
/// ```rust
/// use ormopt_core::orm::{orm_constraint, OrmComponent};
/// let limit = orm_constraint("limit", &["foods"], |m, idx| {
///     Ok(m.var_expr("buy", idx)?.le(10.).into())
/// });
/// assert_eq!(limit.name(), "limit");
/// assert!(limit.problem_key().is_err());
/// ```
pub fn orm_constraint<F>(name: &str, index_sets: &[&str], rule: F) -> OrmConstraint
where
    F: Fn(&ConcreteModel, &[Value]) -> Result<ConstraintRule, ModelError> + 'static,
{
    OrmConstraint {
        name: name.to_string(),
        index_sets: index_sets.iter().map(|s| s.to_string()).collect(),
        rule: Rc::new(rule),
        binding: Binding::Unbound,
    }
}

/// Objective built by a rule
#[derive(Clone)]
pub struct OrmObjective {
    pub name: String,
    pub index_sets: Vec<String>,
    pub sense: ObjectiveSense,
    rule: ObjectiveRuleFn,
    binding: Binding,
}

impl OrmObjective {
    pub fn materialize(&self, model: &mut AbstractModel) -> Result<(), OrmError> {
        model.add_objective(ObjectiveComponent {
            name: self.name.clone(),
            index_sets: self.index_sets.clone(),
            sense: self.sense,
            rule: Rc::clone(&self.rule),
        })?;
        Ok(())
    }
}

impl Debug for OrmObjective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrmObjective")
            .field("name", &self.name)
            .field("index_sets", &self.index_sets)
            .field("sense", &self.sense)
            .field("binding", &self.binding)
            .finish()
    }
}

impl OrmComponent for OrmObjective {
    fn name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> Binding {
        self.binding
    }

    fn bind(&mut self, key: ProblemKey) {
        self.binding = Binding::Bound(key);
    }

    fn validate(&self, _schema: &Schema, declared_sets: &[&str]) -> Result<(), OrmError> {
        validate_index_sets(&self.name, &self.index_sets, declared_sets)
    }
}

/// Create an objective wrapper from a rule
pub fn orm_objective<F>(
    name: &str,
    index_sets: &[&str],
    sense: ObjectiveSense,
    rule: F,
) -> OrmObjective
where
    F: Fn(&ConcreteModel, &[Value]) -> Result<LinearExpr, ModelError> + 'static,
{
    OrmObjective {
        name: name.to_string(),
        index_sets: index_sets.iter().map(|s| s.to_string()).collect(),
        sense,
        rule: Rc::new(rule),
        binding: Binding::Unbound,
    }
}
// endregion Rules

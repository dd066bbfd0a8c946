//! Module mapping records onto optimization model components
//!
//! Sets, parameters and variables are declared against record types. Their index sets are
//! found by [`inference`], their data is built by [`projection`], and the [`problem::Problem`]
//! orchestrator ties a [`problem::ProblemDefinition`] to a store and a solver, recording each
//! successful run in the [`ledger`].

pub mod components;
pub mod inference;
pub mod ledger;
pub mod mixin;
pub mod problem;
pub mod projection;

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::optimize::solvers::SolverError;
use crate::optimize::ModelError;
use crate::store::{QuerySet, RecordStore, StoreError};

pub use components::{
    orm_constraint, orm_objective, Binding, OrmComponent, OrmConstraint, OrmObjective, OrmParam,
    OrmParamBuilder, OrmSet, OrmSetBuilder, OrmVar, OrmVarBuilder,
};
pub use mixin::{create_data_dict, RecordMapper};
pub use problem::{Problem, ProblemDefinition, ProblemKey, ProblemState};
pub use projection::DataMapping;

/// Columns indexing a data attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum IndexSpec {
    /// The attribute is not indexed
    #[default]
    NoIndex,
    /// Indexed by a single column
    Single(String),
    /// Indexed by a tuple of columns
    Multi(Vec<String>),
}

impl IndexSpec {
    /// Columns named by this index, in order
    pub fn columns(&self) -> Vec<&str> {
        match self {
            IndexSpec::NoIndex => Vec::new(),
            IndexSpec::Single(col) => vec![col.as_str()],
            IndexSpec::Multi(cols) => cols.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        !matches!(self, IndexSpec::NoIndex)
    }
}

impl From<&str> for IndexSpec {
    fn from(value: &str) -> Self {
        IndexSpec::Single(value.to_string())
    }
}

impl From<Vec<&str>> for IndexSpec {
    fn from(value: Vec<&str>) -> Self {
        IndexSpec::Multi(value.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for IndexSpec {
    fn from(value: [&str; N]) -> Self {
        IndexSpec::Multi(value.into_iter().map(String::from).collect())
    }
}

impl Display for IndexSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexSpec::NoIndex => write!(f, "()"),
            IndexSpec::Single(col) => write!(f, "{}", col),
            IndexSpec::Multi(cols) => write!(f, "({})", cols.join(", ")),
        }
    }
}

/// Record type and attribute a model component was built from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrmOrigin {
    pub record_type: String,
    pub from_attr: String,
}

impl OrmOrigin {
    pub fn new(record_type: &str, from_attr: &str) -> Self {
        Self {
            record_type: record_type.to_string(),
            from_attr: from_attr.to_string(),
        }
    }

    pub fn matches(&self, record_type: &str, from_attr: &str) -> bool {
        self.record_type == record_type && self.from_attr == from_attr
    }
}

impl Display for OrmOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.record_type, self.from_attr)
    }
}

/// Everything needed to rebuild the data of a record sourced component
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSource {
    pub origin: OrmOrigin,
    pub indexed_by: IndexSpec,
    pub queryset: QuerySet,
}

impl RecordSource {
    /// Project the current records onto a data mapping
    pub fn project<S: RecordStore + ?Sized>(&self, store: &S) -> Result<DataMapping, OrmError> {
        projection::project(
            store,
            &self.origin.record_type,
            &self.origin.from_attr,
            &self.indexed_by,
            &self.queryset,
        )
    }
}

/// Errors raised while mapping records onto a model
#[derive(Error, Debug)]
pub enum OrmError {
    /// Column named by a component does not exist on its record type
    #[error("{record_type} has no attribute {attribute}")]
    MissingAttribute {
        record_type: String,
        attribute: String,
    },
    /// A foreign key points to a table with no record type
    #[error("No record type is mapped to table {0}")]
    UnknownTable(String),
    /// An explicit index set name is not declared by the problem
    #[error("Index set {set} of {component} is not declared")]
    UnknownIndexSet { component: String, set: String },
    /// The component has not been bound to a problem
    #[error("Component {0} is not bound to a problem")]
    NotBound(String),
    /// The problem model was already defined
    #[error("Problem {0} is already defined")]
    AlreadyDefined(String),
    /// The problem was already instantiated
    #[error("Problem {0} is already instantiated")]
    AlreadyInstantiated(String),
    /// The problem must be instantiated first
    #[error("Problem {0} has not been instantiated")]
    NotInstantiated(String),
    /// A queryset targets a different record type than its component
    #[error("Queryset over {found} used for a component of {expected}")]
    QuerySetMismatch { expected: String, found: String },
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
    #[error("Required field {0} was not set")]
    UninitializedField(&'static str),
}

impl From<StoreError> for OrmError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::MissingAttribute {
                record_type,
                attribute,
            } => OrmError::MissingAttribute {
                record_type,
                attribute,
            },
            StoreError::UnknownTable(table) => OrmError::UnknownTable(table),
            other => OrmError::Store(other),
        }
    }
}

impl From<derive_builder::UninitializedFieldError> for OrmError {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        OrmError::UninitializedField(value.field_name())
    }
}

//! Module for constructing and solving optimization models
//!
//! An [`model::AbstractModel`] declares sets, parameters, variables, constraints and
//! objectives. Combined with data it creates a [`instance::ConcreteModel`], which the
//! [`solvers`] turn into a [`ProblemSolution`].

pub mod constraint;
pub mod expression;
pub mod instance;
pub mod model;
pub mod objective;
pub mod parameter;
pub mod set;
pub mod solvers;
pub mod variable;

use indexmap::IndexMap;
use thiserror::Error;

use crate::optimize::expression::ComponentKey;
use crate::optimize::variable::Domain;
use crate::store::Value;

/// Struct representing the solution to an optimization problem
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemSolution {
    /// The status of the optimization problem
    pub status: OptimizationStatus,
    /// Optimized value of the objective
    pub objective_value: f64,
    /// Values of the variables at the optimum, keyed by variable
    pub variable_values: IndexMap<ComponentKey, f64>,
    /// Values of the dual variables at the optimum
    ///
    /// Some(IndexMap), keyed by constraint, if the solver supports retrieving the dual
    /// values, None otherwise
    pub dual_values: Option<IndexMap<ComponentKey, f64>>,
}

impl ProblemSolution {
    /// Value of a variable at the optimum
    pub fn value(&self, name: &str, index: &[Value]) -> Option<f64> {
        self.variable_values
            .get(&ComponentKey::new(name, index))
            .copied()
    }
}

/// Status of a solved optimization problem
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Problem has been optimized
    Optimal,
    /// An approximate solution has been found
    AlmostOptimal,
}

/// Errors raised while declaring or instantiating a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Component names are shared by sets, parameters, variables, constraints and objectives
    #[error("Tried to add a component with the same name as an existing component: {0}")]
    DuplicateComponent(String),
    /// The model has no component of this name
    #[error("Component {0} does not exist")]
    UnknownComponent(String),
    /// A component is indexed by a set the model does not declare
    #[error("Component {component} is indexed by unknown set {set}")]
    UnknownSet { component: String, set: String },
    /// The model data has no entry for the namespace
    #[error("Model data has no namespace {0}")]
    UnknownNamespace(String),
    /// The data or index does not fit the component
    #[error("Component {component} expected {expected} data, found {found}")]
    ShapeMismatch {
        component: String,
        expected: String,
        found: String,
    },
    /// A data key is not a member of the component's index sets
    #[error("Index {index} is not valid for component {component}")]
    InvalidIndex { component: String, index: String },
    /// A parameter value is not a number
    #[error("Value {value} of parameter {component} is not numeric")]
    NonNumeric { component: String, value: Value },
    /// A parameter value is outside of its domain
    #[error("Value {value} of parameter {component} is not within {domain}")]
    DomainViolation {
        component: String,
        value: f64,
        domain: Domain,
    },
    /// No value, and no default, for a parameter index
    #[error("Parameter {component} has no value for index {index}")]
    MissingValue { component: String, index: String },
    /// An expression uses a variable the model does not hold
    #[error("Variable {0} does not exist in the model")]
    UnknownVariable(String),
    /// Error when trying to add variable with invalid bounds
    #[error("Variable {0} has lower_bound > upper_bound")]
    InvalidVariableBounds(String),
    /// Error when trying to add a constraint with invalid bounds
    #[error("Constraint {0} has lower_bound > upper_bound")]
    InvalidConstraintBounds(String),
    /// Solvers need exactly one objective
    #[error("Expected exactly one objective, found {0}")]
    ObjectiveCount(usize),
    #[error("Required field {0} was not set")]
    UninitializedField(&'static str),
}

impl From<derive_builder::UninitializedFieldError> for ModelError {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        ModelError::UninitializedField(value.field_name())
    }
}

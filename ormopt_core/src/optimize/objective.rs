//! Provides structs for representing an optimization model's objective
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use crate::optimize::expression::{ComponentKey, LinearExpr};
use crate::optimize::instance::ConcreteModel;
use crate::optimize::ModelError;
use crate::store::Value;

/// Represents the sense of the objective, whether it should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectiveSense {
    /// The objective should be minimized
    #[default]
    Minimize,
    /// The objective should be maximized
    Maximize,
}

impl Display for ObjectiveSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "minimize"),
            ObjectiveSense::Maximize => write!(f, "maximize"),
        }
    }
}

/// Rule building the objective expression for one index of its index sets
pub type ObjectiveRuleFn = Rc<dyn Fn(&ConcreteModel, &[Value]) -> Result<LinearExpr, ModelError>>;

/// Objective declared on an abstract model
///
/// An indexed objective creates one objective per index, the solvers accept models with
/// exactly one.
#[derive(Clone)]
pub struct ObjectiveComponent {
    pub name: String,
    pub index_sets: Vec<String>,
    pub sense: ObjectiveSense,
    pub rule: ObjectiveRuleFn,
}

impl ObjectiveComponent {
    pub fn new<F>(name: &str, index_sets: &[&str], sense: ObjectiveSense, rule: F) -> Self
    where
        F: Fn(&ConcreteModel, &[Value]) -> Result<LinearExpr, ModelError> + 'static,
    {
        Self {
            name: name.to_string(),
            index_sets: index_sets.iter().map(|s| s.to_string()).collect(),
            sense,
            rule: Rc::new(rule),
        }
    }

    /// Create a new minimization objective
    pub fn minimize<F>(name: &str, rule: F) -> Self
    where
        F: Fn(&ConcreteModel, &[Value]) -> Result<LinearExpr, ModelError> + 'static,
    {
        Self::new(name, &[], ObjectiveSense::Minimize, rule)
    }

    /// Create a new maximization objective
    pub fn maximize<F>(name: &str, rule: F) -> Self
    where
        F: Fn(&ConcreteModel, &[Value]) -> Result<LinearExpr, ModelError> + 'static,
    {
        Self::new(name, &[], ObjectiveSense::Maximize, rule)
    }
}

impl Debug for ObjectiveComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectiveComponent")
            .field("name", &self.name)
            .field("index_sets", &self.index_sets)
            .field("sense", &self.sense)
            .finish_non_exhaustive()
    }
}

/// An objective of a concrete model
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub key: ComponentKey,
    pub sense: ObjectiveSense,
    pub expr: LinearExpr,
}

impl Display for Objective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} {}", self.key, self.sense, self.expr)
    }
}

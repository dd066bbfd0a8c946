//! Provides structs for representing constraints of an optimization model
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use crate::optimize::expression::{ComponentKey, LinearExpr};
use crate::optimize::instance::ConcreteModel;
use crate::optimize::ModelError;
use crate::store::Value;

/// Represents a linear constraint in an optimization problem
#[derive(Debug, Clone, PartialEq)]
pub enum LinearConstraint {
    /// Represents an equality constraint, where `expr` = `equals`
    Equality {
        /// Linear expression, its constant is moved to the right hand side when solving
        expr: LinearExpr,
        /// The right hand side of the equality constraint
        equals: f64,
    },
    /// Represents an inequality constraint,
    Inequality {
        /// Linear expression, its constant is moved to the right hand side when solving
        expr: LinearExpr,
        /// The lowest value the expression can take
        lower_bound: f64,
        /// The highest value the expression can take
        upper_bound: f64,
    },
}

impl LinearConstraint {
    /// Create a new equality constraint
    ///
    /// # Examples
    /// ```rust
    /// use ormopt_core::optimize::constraint::LinearConstraint;
    /// use ormopt_core::optimize::expression::{ComponentKey, LinearExpr};
    /// let x = LinearExpr::from(ComponentKey::scalar("x"));
    /// let y = LinearExpr::from(ComponentKey::scalar("y"));
    /// // Create a constraint representing 3*x + 2*y = 6
    /// let new_constraint = LinearConstraint::new_equality(3. * x + 2. * y, 6.);
    /// assert_eq!(new_constraint.to_string(), "3*x + 2*y = 6");
    /// ```
    pub fn new_equality(expr: LinearExpr, equals: f64) -> Self {
        LinearConstraint::Equality { expr, equals }
    }

    /// Create a new inequality constraint, infinite bounds leave that side open
    pub fn new_inequality(expr: LinearExpr, lower_bound: f64, upper_bound: f64) -> Self {
        LinearConstraint::Inequality {
            expr,
            lower_bound,
            upper_bound,
        }
    }

    pub fn expr(&self) -> &LinearExpr {
        match self {
            LinearConstraint::Equality { expr, .. } | LinearConstraint::Inequality { expr, .. } => expr,
        }
    }

    /// Bounds on the variable part of the expression, i.e. with the constant moved over
    pub fn row_bounds(&self) -> (f64, f64) {
        let c = self.expr().constant_term();
        match self {
            LinearConstraint::Equality { equals, .. } => (equals - c, equals - c),
            LinearConstraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } => (lower_bound - c, upper_bound - c),
        }
    }

    /// Variables used by the constraint
    pub fn variables(&self) -> impl Iterator<Item = &ComponentKey> {
        self.expr().terms().map(|(k, _)| k)
    }
}

impl Display for LinearConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LinearConstraint::Equality { expr, equals } => write!(f, "{} = {}", expr, equals),
            LinearConstraint::Inequality {
                expr,
                lower_bound,
                upper_bound,
            } => match (lower_bound.is_finite(), upper_bound.is_finite()) {
                (true, true) => write!(f, "{} <= {} <= {}", lower_bound, expr, upper_bound),
                (true, false) => write!(f, "{} >= {}", expr, lower_bound),
                (false, true) => write!(f, "{} <= {}", expr, upper_bound),
                (false, false) => write!(f, "{} free", expr),
            },
        }
    }
}

/// Result of a constraint rule for one index
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintRule {
    /// Add this constraint
    Constraint(LinearConstraint),
    /// No constraint for this index
    Skip,
}

impl From<LinearConstraint> for ConstraintRule {
    fn from(value: LinearConstraint) -> Self {
        ConstraintRule::Constraint(value)
    }
}

/// Rule building the constraint for one index of its index sets
pub type ConstraintRuleFn = Rc<dyn Fn(&ConcreteModel, &[Value]) -> Result<ConstraintRule, ModelError>>;

/// Constraint declared on an abstract model, expanded over the product of its index sets
#[derive(Clone)]
pub struct ConstraintComponent {
    pub name: String,
    pub index_sets: Vec<String>,
    pub rule: ConstraintRuleFn,
}

impl ConstraintComponent {
    pub fn new<F>(name: &str, index_sets: &[&str], rule: F) -> Self
    where
        F: Fn(&ConcreteModel, &[Value]) -> Result<ConstraintRule, ModelError> + 'static,
    {
        Self {
            name: name.to_string(),
            index_sets: index_sets.iter().map(|s| s.to_string()).collect(),
            rule: Rc::new(rule),
        }
    }
}

impl Debug for ConstraintComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintComponent")
            .field("name", &self.name)
            .field("index_sets", &self.index_sets)
            .finish_non_exhaustive()
    }
}

/// A constraint of a concrete model
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub key: ComponentKey,
    pub constraint: LinearConstraint,
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.constraint)
    }
}

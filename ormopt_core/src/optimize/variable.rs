//! Module providing representation of optimization model variables
use std::fmt::{Display, Formatter};

use derive_builder::Builder;

use crate::configuration;
use crate::optimize::expression::{ComponentKey, LinearExpr};
use crate::optimize::ModelError;

/// Domain of a variable or parameter
///
/// # Notes:
/// Not all domains are supported for all solvers, Clarabel only supports the continuous
/// ones, while HiGHS and microlp support all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    /// Any real number
    #[default]
    Reals,
    /// Real numbers >= 0
    NonNegativeReals,
    /// Real numbers <= 0
    NonPositiveReals,
    /// Any integer
    Integers,
    /// Integers >= 0
    NonNegativeIntegers,
    /// 0 or 1
    Binary,
}

impl Domain {
    /// Bounds implied by the domain
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Domain::Reals | Domain::Integers => (f64::NEG_INFINITY, f64::INFINITY),
            Domain::NonNegativeReals | Domain::NonNegativeIntegers => (0., f64::INFINITY),
            Domain::NonPositiveReals => (f64::NEG_INFINITY, 0.),
            Domain::Binary => (0., 1.),
        }
    }

    /// Whether values must be integral
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Domain::Integers | Domain::NonNegativeIntegers | Domain::Binary
        )
    }

    /// Check if a value lies in the domain
    pub fn contains(&self, value: f64) -> bool {
        let (lb, ub) = self.bounds();
        if value.is_nan() || value < lb || value > ub {
            return false;
        }
        !self.is_integer() || value.is_infinite() || value.fract() == 0.
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Reals => write!(f, "Reals"),
            Domain::NonNegativeReals => write!(f, "NonNegativeReals"),
            Domain::NonPositiveReals => write!(f, "NonPositiveReals"),
            Domain::Integers => write!(f, "Integers"),
            Domain::NonNegativeIntegers => write!(f, "NonNegativeIntegers"),
            Domain::Binary => write!(f, "Binary"),
        }
    }
}

/// Variable declared on an abstract model, one variable is created per index
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "ModelError"))]
pub struct VarComponent {
    /// Name of the variable
    #[builder(setter(into))]
    pub name: String,
    /// Sets the variable is indexed by, empty for a single variable
    #[builder(default = "Vec::new()")]
    pub index_sets: Vec<String>,
    /// Domain of the variable
    #[builder(default = "Domain::Reals")]
    pub domain: Domain,
    /// Lower bound, intersected with the domain bounds
    #[builder(default = "configuration::read().lower_bound")]
    pub lower_bound: f64,
    /// Upper bound, intersected with the domain bounds
    #[builder(default = "configuration::read().upper_bound")]
    pub upper_bound: f64,
}

impl VarComponent {
    /// Bounds of the created variables
    pub fn effective_bounds(&self) -> (f64, f64) {
        let (lb, ub) = self.domain.bounds();
        (self.lower_bound.max(lb), self.upper_bound.min(ub))
    }
}

/// A variable of a concrete model
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub key: ComponentKey,
    pub domain: Domain,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Column of the variable in the solver problem
    pub index: usize,
}

impl Variable {
    /// Expression holding only this variable
    pub fn expr(&self) -> LinearExpr {
        LinearExpr::from(self.key.clone())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key, self.domain)
    }
}

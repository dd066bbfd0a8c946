//! Solver interfaces, and the lowering of a concrete model into a linear program
#[cfg(feature = "highs")]
pub mod highs;
#[cfg(feature = "minilp")]
pub mod microlp;

pub mod clarabel;

use derive_builder::Builder;
use indexmap::IndexMap;
use log::info;
use thiserror::Error;

use crate::configuration;
use crate::optimize::expression::ComponentKey;
use crate::optimize::instance::ConcreteModel;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::variable::Domain;
use crate::optimize::{ModelError, OptimizationStatus, ProblemSolution};

/// A solver backend
pub trait Solver {
    /// Name of the backend
    fn name(&self) -> &str;

    /// Solve a concrete model
    fn solve(
        &self,
        model: &ConcreteModel,
        options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError>;
}

/// Options handed to a solver
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "SolverError"))]
pub struct SolverOptions {
    /// Print solver progress
    #[builder(default = "configuration::read().verbose")]
    pub verbose: bool,
    /// Maximum number of solver iterations
    #[builder(default = "configuration::read().max_iterations")]
    pub max_iterations: u32,
    /// Time limit in seconds
    #[builder(default = "None", setter(strip_option))]
    pub time_limit: Option<f64>,
    /// Feasibility and optimality tolerance
    #[builder(default = "configuration::read().tolerance")]
    pub tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        let config = configuration::read();
        Self {
            verbose: config.verbose,
            max_iterations: config.max_iterations,
            time_limit: None,
            tolerance: config.tolerance,
        }
    }
}

/// Errors raised by the solvers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// No point satisfies all constraints
    #[error("Problem is infeasible")]
    Infeasible,
    /// The objective can be improved without limit
    #[error("Problem is unbounded")]
    Unbounded,
    /// The requested backend was not compiled in
    #[error("Solver {0} is not available, enable its feature")]
    SolverNotAvailable(String),
    /// The time or iteration limit was hit
    #[error("Solver stopped before reaching an optimum")]
    Timeout,
    /// The backend can't handle a variable's domain
    #[error("Solver {solver} does not support domain {domain} of variable {variable}")]
    UnsupportedDomain {
        solver: String,
        variable: String,
        domain: Domain,
    },
    /// Any other backend failure
    #[error("Solver failed: {0}")]
    ExecutionFailed(String),
    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),
    #[error("Required field {0} was not set")]
    UninitializedField(&'static str),
}

impl From<derive_builder::UninitializedFieldError> for SolverError {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        SolverError::UninitializedField(value.field_name())
    }
}

/// Create a solver backend
pub fn create_solver(kind: configuration::Solver) -> Result<Box<dyn Solver>, SolverError> {
    match kind {
        configuration::Solver::Clarabel => Ok(Box::new(clarabel::ClarabelSolver::new())),
        #[cfg(feature = "highs")]
        configuration::Solver::Highs => Ok(Box::new(highs::HighsSolver::new())),
        #[cfg(feature = "minilp")]
        configuration::Solver::Minilp => Ok(Box::new(microlp::MicrolpSolver::new())),
        #[allow(unreachable_patterns)]
        other => Err(SolverError::SolverNotAvailable(format!("{:?}", other))),
    }
}

// region Linear Program
/// A row `lower <= sum(coef * x[col]) <= upper`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinearRow {
    pub key: ComponentKey,
    pub coefficients: Vec<(usize, f64)>,
    pub lower: f64,
    pub upper: f64,
}

impl LinearRow {
    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }
}

/// Concrete model lowered to column and row form, shared by every backend
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinearProgram {
    pub columns: Vec<ComponentKey>,
    pub domains: Vec<Domain>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub objective: Vec<f64>,
    pub objective_constant: f64,
    pub sense: ObjectiveSense,
    pub rows: Vec<LinearRow>,
}

impl LinearProgram {
    pub fn from_instance(model: &ConcreteModel) -> Result<Self, SolverError> {
        let objective_component = model.objective()?;
        let mut columns = Vec::with_capacity(model.num_variables());
        let mut domains = Vec::with_capacity(model.num_variables());
        let mut lower = Vec::with_capacity(model.num_variables());
        let mut upper = Vec::with_capacity(model.num_variables());
        let mut positions = IndexMap::new();
        for var in model.variables() {
            positions.insert(&var.key, columns.len());
            columns.push(var.key.clone());
            domains.push(var.domain);
            lower.push(var.lower_bound);
            upper.push(var.upper_bound);
        }
        let column_of = |key: &ComponentKey| {
            positions
                .get(key)
                .copied()
                .ok_or_else(|| ModelError::UnknownVariable(key.to_string()))
        };
        let mut objective = vec![0.; columns.len()];
        for (key, coef) in objective_component.expr.terms() {
            objective[column_of(key)?] += coef;
        }
        let mut rows = Vec::with_capacity(model.constraints().len());
        for constraint in model.constraints() {
            let coefficients = constraint
                .constraint
                .expr()
                .terms()
                .filter(|(_, c)| *c != 0.)
                .map(|(k, c)| column_of(k).map(|i| (i, c)))
                .collect::<Result<Vec<_>, _>>()?;
            let (lower, upper) = constraint.constraint.row_bounds();
            rows.push(LinearRow {
                key: constraint.key.clone(),
                coefficients,
                lower,
                upper,
            });
        }
        Ok(Self {
            columns,
            domains,
            lower,
            upper,
            objective,
            objective_constant: objective_component.expr.constant_term(),
            sense: objective_component.sense,
            rows,
        })
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Fail on the first column whose domain the backend can't handle
    pub fn require_continuous(&self, solver: &str) -> Result<(), SolverError> {
        match self.domains.iter().position(Domain::is_integer) {
            Some(i) => Err(SolverError::UnsupportedDomain {
                solver: solver.to_string(),
                variable: self.columns[i].to_string(),
                domain: self.domains[i],
            }),
            None => Ok(()),
        }
    }

    /// Build a solution from column values
    pub fn solution(
        &self,
        status: OptimizationStatus,
        values: &[f64],
        duals: Option<IndexMap<ComponentKey, f64>>,
    ) -> ProblemSolution {
        let objective_value = self
            .objective
            .iter()
            .zip(values)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.objective_constant;
        let variable_values = self.columns.iter().cloned().zip(values.iter().copied()).collect();
        info!("solved with status {:?}, objective {}", status, objective_value);
        ProblemSolution {
            status,
            objective_value,
            variable_values,
            dual_values: duals,
        }
    }
}
// endregion Linear Program

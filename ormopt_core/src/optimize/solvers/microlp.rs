//! Implements a solver interface for microlp
use log::{debug, warn};
use microlp::{ComparisonOp, OptimizationDirection, Problem};

use crate::optimize::instance::ConcreteModel;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{LinearProgram, Solver, SolverError, SolverOptions};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Pure rust simplex solver with branch and bound for integer domains
#[derive(Debug, Clone, Default)]
pub struct MicrolpSolver {}

impl MicrolpSolver {
    pub fn new() -> Self {
        Self {}
    }
}

/// Round integer bounds inwards, infinite bounds saturate
fn integer_bounds(lower: f64, upper: f64) -> (i32, i32) {
    (lower.ceil() as i32, upper.floor() as i32)
}

impl Solver for MicrolpSolver {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(
        &self,
        model: &ConcreteModel,
        options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError> {
        if options.time_limit.is_some() {
            warn!("microlp does not support time limits, ignoring");
        }
        let lp = LinearProgram::from_instance(model)?;
        let direction = match lp.sense {
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
        };
        let mut problem = Problem::new(direction);
        let mut vars = Vec::with_capacity(lp.num_columns());
        for j in 0..lp.num_columns() {
            let var = if lp.domains[j].is_integer() {
                problem.add_integer_var(lp.objective[j], integer_bounds(lp.lower[j], lp.upper[j]))
            } else {
                problem.add_var(lp.objective[j], (lp.lower[j], lp.upper[j]))
            };
            vars.push(var);
        }
        for row in &lp.rows {
            let terms: Vec<_> = row.coefficients.iter().map(|(j, c)| (vars[*j], *c)).collect();
            if row.is_equality() {
                problem.add_constraint(terms, ComparisonOp::Eq, row.upper);
                continue;
            }
            if row.upper.is_finite() {
                problem.add_constraint(terms.clone(), ComparisonOp::Le, row.upper);
            }
            if row.lower.is_finite() {
                problem.add_constraint(terms, ComparisonOp::Ge, row.lower);
            }
        }
        debug!("microlp: {} columns, {} rows", vars.len(), lp.rows.len());

        let solution = match problem.solve() {
            Ok(solution) => solution,
            Err(microlp::Error::Infeasible) => return Err(SolverError::Infeasible),
            Err(microlp::Error::Unbounded) => return Err(SolverError::Unbounded),
            Err(err) => return Err(SolverError::ExecutionFailed(err.to_string())),
        };
        let values: Vec<f64> = vars.iter().map(|v| solution[*v]).collect();
        Ok(lp.solution(OptimizationStatus::Optimal, &values, None))
    }
}

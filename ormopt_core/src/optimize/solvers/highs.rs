//! Implements a solver interface for HiGHS
use highs::{HighsModelStatus, RowProblem, Sense};
use log::debug;

use crate::optimize::instance::ConcreteModel;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{LinearProgram, Solver, SolverError, SolverOptions};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// HiGHS simplex and branch and bound solver, supports integer domains
#[derive(Debug, Clone, Default)]
pub struct HighsSolver {}

impl HighsSolver {
    pub fn new() -> Self {
        Self {}
    }
}

impl Solver for HighsSolver {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(
        &self,
        model: &ConcreteModel,
        options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError> {
        let lp = LinearProgram::from_instance(model)?;
        let mut pb = RowProblem::default();
        let mut cols = Vec::with_capacity(lp.num_columns());
        for j in 0..lp.num_columns() {
            let bounds = lp.lower[j]..=lp.upper[j];
            let col = if lp.domains[j].is_integer() {
                pb.add_integer_column(lp.objective[j], bounds)
            } else {
                pb.add_column(lp.objective[j], bounds)
            };
            cols.push(col);
        }
        for row in &lp.rows {
            let factors: Vec<_> = row.coefficients.iter().map(|(j, c)| (cols[*j], *c)).collect();
            pb.add_row(row.lower..=row.upper, &factors);
        }
        debug!("highs: {} columns, {} rows", cols.len(), lp.rows.len());

        let sense = match lp.sense {
            ObjectiveSense::Minimize => Sense::Minimise,
            ObjectiveSense::Maximize => Sense::Maximise,
        };
        let mut highs_model = pb.optimise(sense);
        highs_model.set_option("output_flag", options.verbose);
        highs_model.set_option("primal_feasibility_tolerance", options.tolerance);
        highs_model.set_option("dual_feasibility_tolerance", options.tolerance);
        let iterations = iteration_limit(options.max_iterations);
        highs_model.set_option("simplex_iteration_limit", iterations);
        highs_model.set_option("ipm_iteration_limit", iterations);
        if let Some(limit) = options.time_limit {
            highs_model.set_option("time_limit", limit);
        }
        let solved = highs_model.solve();

        match solved.status() {
            HighsModelStatus::Optimal => {
                let solution = solved.get_solution();
                Ok(lp.solution(OptimizationStatus::Optimal, solution.columns(), None))
            }
            HighsModelStatus::Infeasible => Err(SolverError::Infeasible),
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                Err(SolverError::Unbounded)
            }
            HighsModelStatus::ReachedTimeLimit | HighsModelStatus::ReachedIterationLimit => {
                Err(SolverError::Timeout)
            }
            status => Err(SolverError::ExecutionFailed(format!(
                "HiGHS solver returned status: {:?}",
                status
            ))),
        }
    }
}

/// HiGHS takes iteration limits as a C int
fn iteration_limit(max_iterations: u32) -> i32 {
    i32::try_from(max_iterations).unwrap_or(i32::MAX)
}

//! Implements a solver interface for Clarabel
//!
//! Clarabel solves `min 1/2 x'Px + q'x` subject to `Ax + s = b` with `s` in a product of
//! cones. Equality rows go to a zero cone, every finite row or column bound becomes one row
//! of a nonnegative cone.
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use indexmap::IndexMap;
use log::debug;
use nalgebra_sparse::{coo::CooMatrix, csc::CscMatrix as SparseCsc};

use crate::optimize::instance::ConcreteModel;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{LinearProgram, Solver, SolverError, SolverOptions};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Interior point solver for continuous problems
#[derive(Debug, Clone, Default)]
pub struct ClarabelSolver {}

impl ClarabelSolver {
    pub fn new() -> Self {
        Self {}
    }
}

/// Constraint matrix and cones in Clarabel's form
struct ConicForm {
    a: CscMatrix<f64>,
    b: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
    /// Rows of `a` holding model constraints, with their sign relative to the model row
    dual_rows: Vec<(usize, usize, f64)>,
}

impl ConicForm {
    fn from_program(lp: &LinearProgram) -> Self {
        let n = lp.num_columns();
        let mut zero_rows: Vec<(Vec<(usize, f64)>, f64, Option<usize>)> = Vec::new();
        let mut nonneg_rows: Vec<(Vec<(usize, f64)>, f64, Option<(usize, f64)>)> = Vec::new();
        for (r, row) in lp.rows.iter().enumerate() {
            if row.is_equality() {
                zero_rows.push((row.coefficients.clone(), row.upper, Some(r)));
                continue;
            }
            if row.upper.is_finite() {
                nonneg_rows.push((row.coefficients.clone(), row.upper, Some((r, 1.))));
            }
            if row.lower.is_finite() {
                let negated = row.coefficients.iter().map(|(i, c)| (*i, -c)).collect();
                nonneg_rows.push((negated, -row.lower, Some((r, -1.))));
            }
        }
        for j in 0..n {
            if lp.upper[j].is_finite() {
                nonneg_rows.push((vec![(j, 1.)], lp.upper[j], None));
            }
            if lp.lower[j].is_finite() {
                nonneg_rows.push((vec![(j, -1.)], -lp.lower[j], None));
            }
        }

        let m = zero_rows.len() + nonneg_rows.len();
        let mut coo = CooMatrix::new(m, n);
        let mut b = Vec::with_capacity(m);
        let mut dual_rows = Vec::new();
        for (i, (coefficients, rhs, model_row)) in zero_rows.into_iter().enumerate() {
            coefficients.into_iter().for_each(|(j, c)| coo.push(i, j, c));
            b.push(rhs);
            if let Some(r) = model_row {
                dual_rows.push((i, r, 1.));
            }
        }
        let offset = b.len();
        for (i, (coefficients, rhs, model_row)) in nonneg_rows.into_iter().enumerate() {
            coefficients.into_iter().for_each(|(j, c)| coo.push(offset + i, j, c));
            b.push(rhs);
            if let Some((r, sign)) = model_row {
                dual_rows.push((offset + i, r, sign));
            }
        }

        let mut cones = Vec::new();
        if offset > 0 {
            cones.push(SupportedConeT::ZeroConeT(offset));
        }
        if m > offset {
            cones.push(SupportedConeT::NonnegativeConeT(m - offset));
        }
        let (colptr, rowval, nzval) = SparseCsc::from(&coo).disassemble();
        Self {
            a: CscMatrix::new(m, n, colptr, rowval, nzval),
            b,
            cones,
            dual_rows,
        }
    }
}

impl Solver for ClarabelSolver {
    fn name(&self) -> &str {
        "clarabel"
    }

    fn solve(
        &self,
        model: &ConcreteModel,
        options: &SolverOptions,
    ) -> Result<ProblemSolution, SolverError> {
        let lp = LinearProgram::from_instance(model)?;
        lp.require_continuous(self.name())?;
        let n = lp.num_columns();
        let form = ConicForm::from_program(&lp);
        debug!(
            "clarabel: {} columns, {} rows in {} cones",
            n,
            form.b.len(),
            form.cones.len()
        );

        // Clarabel always minimizes
        let q: Vec<f64> = match lp.sense {
            ObjectiveSense::Minimize => lp.objective.clone(),
            ObjectiveSense::Maximize => lp.objective.iter().map(|c| -c).collect(),
        };
        let p = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());

        let settings = DefaultSettingsBuilder::default()
            .verbose(options.verbose)
            .max_iter(options.max_iterations)
            .time_limit(options.time_limit.unwrap_or(f64::INFINITY))
            .tol_feas(options.tolerance)
            .tol_gap_abs(options.tolerance)
            .tol_gap_rel(options.tolerance)
            .build()
            .map_err(|e| SolverError::ExecutionFailed(e.to_string()))?;

        let mut solver = DefaultSolver::new(&p, &q, &form.a, &form.b, &form.cones, settings);
        solver.solve();

        let status = match solver.solution.status {
            SolverStatus::Solved => OptimizationStatus::Optimal,
            SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(SolverError::Infeasible)
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                return Err(SolverError::Unbounded)
            }
            SolverStatus::MaxIterations | SolverStatus::MaxTime => return Err(SolverError::Timeout),
            other => return Err(SolverError::ExecutionFailed(format!("{:?}", other))),
        };

        let mut duals: IndexMap<_, f64> = IndexMap::new();
        for (row, model_row, sign) in &form.dual_rows {
            let key = lp.rows[*model_row].key.clone();
            *duals.entry(key).or_insert(0.) += sign * solver.solution.z[*row];
        }
        Ok(lp.solution(status, &solver.solution.x, Some(duals)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::solvers::tests::small_lp;
    use crate::optimize::variable::Domain;
    use crate::store::Value;

    #[test]
    fn solves_small_lp() {
        let model = small_lp(Domain::NonNegativeReals);
        let solution = ClarabelSolver::new()
            .solve(&model, &SolverOptions::default())
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        // 7.5 from the variables plus the constant term
        assert!((solution.objective_value - 8.5).abs() < 1e-4);
        assert!((solution.value("x", &[Value::from("b")]).unwrap() - 2.5).abs() < 1e-4);
        assert!(solution.value("x", &[Value::from("a")]).unwrap().abs() < 1e-4);
    }

    #[test]
    fn rejects_integer_variables() {
        let model = small_lp(Domain::Binary);
        let res = ClarabelSolver::new().solve(&model, &SolverOptions::default());
        assert!(matches!(res, Err(SolverError::UnsupportedDomain { .. })));
    }

    #[test]
    fn conic_form_rows() {
        let lp = LinearProgram::from_instance(&small_lp(Domain::NonNegativeReals)).unwrap();
        let form = ConicForm::from_program(&lp);
        // protein >= 10, fat <= 4, and two lower bounds at 0
        assert_eq!(form.b, vec![-10., 4., 0., 0.]);
        assert_eq!(form.cones.len(), 1);
        assert_eq!(form.dual_rows.len(), 2);
    }
}

//! Process wide defaults used by builders and solvers
use std::sync::{LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cfg_if::cfg_if;

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

/// Read the current configuration
///
/// A poisoned lock still holds a usable configuration, so it is recovered rather than
/// propagated.
pub fn read() -> RwLockReadGuard<'static, Configuration> {
    CONFIGURATION.read().unwrap_or_else(PoisonError::into_inner)
}

/// Get write access to the current configuration
pub fn write() -> RwLockWriteGuard<'static, Configuration> {
    CONFIGURATION.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct Configuration {
    /// Default lower bound for decision variables
    pub lower_bound: f64,
    /// Default upper bound for decision variables
    pub upper_bound: f64,
    /// Feasibility and optimality tolerance handed to the solvers
    pub tolerance: f64,
    /// Solver used by [`crate::orm::problem::Problem::create_solver`]
    pub solver: Solver,
    /// Maximum number of solver iterations
    pub max_iterations: u32,
    /// Whether solvers should print their progress
    pub verbose: bool,
    /// Attribute used when a component does not name one
    pub from_attr: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
            tolerance: 1e-08,
            solver: Solver::default(),
            max_iterations: 200,
            verbose: false,
            from_attr: "id".to_string(),
        }
    }
}

/// Enum used to specify the default solver to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solver {
    /// Use the Clarabel interior point solver (continuous problems only)
    Clarabel,
    /// Use the HiGHS solver, requires the highs feature to be enabled
    Highs,
    /// Use the microlp simplex solver, requires the minilp feature to be enabled
    Minilp,
}

impl Default for Solver {
    fn default() -> Self {
        cfg_if! {
            if #[cfg(feature = "highs")] {
                Solver::Highs
            } else if #[cfg(feature = "minilp")] {
                Solver::Minilp
            } else {
                Solver::Clarabel
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_are_unbounded() {
        let config = Configuration::default();
        assert!(config.lower_bound.is_infinite() && config.lower_bound < 0.);
        assert!(config.upper_bound.is_infinite() && config.upper_bound > 0.);
        assert_eq!(config.from_attr, "id");
    }

    #[test]
    fn read_returns_the_global_configuration() {
        let tolerance = read().tolerance;
        assert!(tolerance > 0.);
    }
}

//! The problem orchestrator
//!
//! A [`Problem`] owns a [`ProblemDefinition`] (the ordered wrappers of its sets, parameters,
//! variables, constraints and objectives), builds an abstract model from it, instantiates
//! the model with data projected from a store, solves it and records the run.
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use log::{info, warn};

use crate::configuration;
use crate::optimize::instance::ConcreteModel;
use crate::optimize::model::{AbstractModel, ModelData};
use crate::optimize::solvers::{create_solver, Solver, SolverOptions};
use crate::optimize::ProblemSolution;
use crate::orm::components::{OrmComponent, OrmConstraint, OrmObjective, OrmParam, OrmSet, OrmVar};
use crate::orm::ledger;
use crate::orm::projection::project;
use crate::orm::{IndexSpec, OrmError};
use crate::store::{RecordId, RecordStore, Schema};

static NEXT_PROBLEM_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Problem`], held by the wrappers bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProblemKey(u64);

impl ProblemKey {
    /// Create a key no other problem has
    pub fn fresh() -> Self {
        ProblemKey(NEXT_PROBLEM_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ordered registry of the wrappers making up a problem
#[derive(Debug, Clone, Default)]
pub struct ProblemDefinition {
    sets: Vec<OrmSet>,
    params: Vec<OrmParam>,
    vars: Vec<OrmVar>,
    constraints: Vec<OrmConstraint>,
    objectives: Vec<OrmObjective>,
}

impl ProblemDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    // region Registration
    pub fn add_set(&mut self, set: OrmSet) {
        self.sets.push(set);
    }

    pub fn add_param(&mut self, param: OrmParam) {
        self.params.push(param);
    }

    pub fn add_var(&mut self, var: OrmVar) {
        self.vars.push(var);
    }

    pub fn add_constraint(&mut self, constraint: OrmConstraint) {
        self.constraints.push(constraint);
    }

    pub fn add_objective(&mut self, objective: OrmObjective) {
        self.objectives.push(objective);
    }

    pub fn with_set(mut self, set: OrmSet) -> Self {
        self.add_set(set);
        self
    }

    pub fn with_param(mut self, param: OrmParam) -> Self {
        self.add_param(param);
        self
    }

    pub fn with_var(mut self, var: OrmVar) -> Self {
        self.add_var(var);
        self
    }

    pub fn with_constraint(mut self, constraint: OrmConstraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    pub fn with_objective(mut self, objective: OrmObjective) -> Self {
        self.add_objective(objective);
        self
    }
    // endregion Registration

    pub fn sets(&self) -> &[OrmSet] {
        &self.sets
    }

    pub fn params(&self) -> &[OrmParam] {
        &self.params
    }

    pub fn vars(&self) -> &[OrmVar] {
        &self.vars
    }

    pub fn constraints(&self) -> &[OrmConstraint] {
        &self.constraints
    }

    pub fn objectives(&self) -> &[OrmObjective] {
        &self.objectives
    }

    /// Every wrapper, in materialization order
    pub fn components(&self) -> impl Iterator<Item = &dyn OrmComponent> {
        self.sets
            .iter()
            .map(|c| c as &dyn OrmComponent)
            .chain(self.params.iter().map(|c| c as &dyn OrmComponent))
            .chain(self.vars.iter().map(|c| c as &dyn OrmComponent))
            .chain(self.constraints.iter().map(|c| c as &dyn OrmComponent))
            .chain(self.objectives.iter().map(|c| c as &dyn OrmComponent))
    }

    fn bind(&mut self, key: ProblemKey) {
        self.sets.iter_mut().for_each(|c| c.bind(key));
        self.params.iter_mut().for_each(|c| c.bind(key));
        self.vars.iter_mut().for_each(|c| c.bind(key));
        self.constraints.iter_mut().for_each(|c| c.bind(key));
        self.objectives.iter_mut().for_each(|c| c.bind(key));
    }
}

/// Lifecycle of a [`Problem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemState {
    /// Wrappers are bound and validated
    Defined,
    /// The abstract model holds every component
    ModelDefined,
    /// A concrete instance has been created
    Instantiated,
    /// At least one solve succeeded
    Solved,
}

/// An optimization problem built from records
#[derive(Debug)]
pub struct Problem {
    key: ProblemKey,
    name: String,
    description: Option<String>,
    version: Option<String>,
    namespace: String,
    definition: ProblemDefinition,
    state: ProblemState,
    model: Option<AbstractModel>,
    instance: Option<ConcreteModel>,
    solution: Option<ProblemSolution>,
    problem_detail: Option<RecordId>,
    current_problem_run: Option<RecordId>,
}

impl Problem {
    /// Create a problem, binding and validating every wrapper of `definition`
    ///
    /// Only `schema` is consulted, no records are read.
    pub fn new(
        mut definition: ProblemDefinition,
        schema: &Schema,
        name: &str,
        description: Option<&str>,
        version: Option<&str>,
    ) -> Result<Self, OrmError> {
        let key = ProblemKey::fresh();
        definition.bind(key);
        let set_names: Vec<&str> = definition.sets.iter().map(|s| s.name.as_str()).collect();
        for component in definition.components() {
            component.validate(schema, &set_names)?;
        }
        info!("created problem {} ({:?})", name, key);
        Ok(Self {
            key,
            name: name.to_string(),
            description: description.map(String::from),
            version: version.map(String::from),
            namespace: format!("{}_namespace", name.to_lowercase().replace(' ', "_")),
            definition,
            state: ProblemState::Defined,
            model: None,
            instance: None,
            solution: None,
            problem_detail: None,
            current_problem_run: None,
        })
    }

    // region Accessors
    pub fn key(&self) -> ProblemKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Namespace the model data is stored under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn state(&self) -> ProblemState {
        self.state
    }

    pub fn definition(&self) -> &ProblemDefinition {
        &self.definition
    }

    pub fn model(&self) -> Option<&AbstractModel> {
        self.model.as_ref()
    }

    pub fn instance(&self) -> Option<&ConcreteModel> {
        self.instance.as_ref()
    }

    /// Solution of the last successful solve
    pub fn solution(&self) -> Option<&ProblemSolution> {
        self.solution.as_ref()
    }

    /// Id of the problem detail record, created by the first recorded run
    pub fn problem_detail(&self) -> Option<RecordId> {
        self.problem_detail
    }

    /// Id of the last recorded problem run
    pub fn current_problem_run(&self) -> Option<RecordId> {
        self.current_problem_run
    }
    // endregion Accessors

    /// Add every component to a new abstract model
    ///
    /// Sets come first, then parameters, variables, constraints and objectives, so
    /// parameters and variables can infer their index sets.
    pub fn define_problem<S: RecordStore + ?Sized>(&mut self, store: &S) -> Result<(), OrmError> {
        match self.state {
            ProblemState::Defined => {}
            ProblemState::ModelDefined => return Err(OrmError::AlreadyDefined(self.name.clone())),
            ProblemState::Instantiated | ProblemState::Solved => {
                return Err(OrmError::AlreadyInstantiated(self.name.clone()))
            }
        }
        let mut model = AbstractModel::new(&self.name);
        for set in self.definition.sets.iter_mut() {
            set.materialize(store, &mut model)?;
        }
        for param in self.definition.params.iter_mut() {
            param.materialize(store, &mut model)?;
        }
        for var in self.definition.vars.iter_mut() {
            var.materialize(store, &mut model)?;
        }
        for constraint in &self.definition.constraints {
            constraint.materialize(&mut model)?;
        }
        for objective in &self.definition.objectives {
            objective.materialize(&mut model)?;
        }
        info!("defined model for problem {}", self.name);
        self.model = Some(model);
        self.state = ProblemState::ModelDefined;
        Ok(())
    }

    /// Project the current records onto the data of every set and parameter
    pub fn data<S: RecordStore + ?Sized>(&self, store: &S) -> Result<ModelData, OrmError> {
        let mut components = IndexMap::new();
        for set in &self.definition.sets {
            let mapping = project(
                store,
                &set.record_type,
                &set.from_attr,
                &IndexSpec::NoIndex,
                &set.queryset(),
            )?;
            components.insert(set.name.clone(), mapping);
        }
        for param in &self.definition.params {
            let mapping = project(
                store,
                &param.record_type,
                &param.from_attr,
                &param.indexed_by,
                &param.queryset(),
            )?;
            components.insert(param.name.clone(), mapping);
        }
        let mut data = IndexMap::new();
        data.insert(self.namespace.clone(), components);
        Ok(data)
    }

    /// Create the concrete instance, defining the model first if needed
    pub fn create_instance<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<&ConcreteModel, OrmError> {
        match self.state {
            ProblemState::Instantiated | ProblemState::Solved => {
                return Err(OrmError::AlreadyInstantiated(self.name.clone()))
            }
            ProblemState::Defined => self.define_problem(store)?,
            ProblemState::ModelDefined => {}
        }
        let data = self.data(store)?;
        let model = match &self.model {
            Some(model) => model,
            None => return Err(OrmError::NotInstantiated(self.name.clone())),
        };
        let instance = model.create_instance(&data, &self.namespace)?;
        self.state = ProblemState::Instantiated;
        Ok(self.instance.insert(instance))
    }

    /// Solve the instance and record the run
    ///
    /// Nothing is recorded when the solver fails. The problem can be solved again, every
    /// successful solve records a new run under the same problem detail.
    pub fn solve<S: RecordStore + ?Sized>(
        &mut self,
        store: &mut S,
        solver: &dyn Solver,
        options: &SolverOptions,
    ) -> Result<&ProblemSolution, OrmError> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| OrmError::NotInstantiated(self.name.clone()))?;
        let solution = match solver.solve(instance, options) {
            Ok(solution) => solution,
            Err(err) => {
                warn!("{} failed to solve {}: {}", solver.name(), self.name, err);
                return Err(err.into());
            }
        };
        let recorded = ledger::record_run(store, self)?;
        self.problem_detail = Some(recorded.detail.id);
        self.current_problem_run = Some(recorded.run.id);
        self.state = ProblemState::Solved;
        Ok(self.solution.insert(solution))
    }

    /// Create the configured default solver
    pub fn create_solver(&self) -> Result<Box<dyn Solver>, OrmError> {
        let kind = configuration::read().solver;
        Ok(create_solver(kind)?)
    }

    /// Records captured by the set, parameter and variable wrappers, without duplicates
    pub fn referenced_records(&self) -> Vec<(String, RecordId)> {
        let mut records = IndexSet::new();
        for component in self.definition.components() {
            if let Some(record_type) = component.record_type() {
                for id in component.captured_ids() {
                    records.insert((record_type.to_string(), *id));
                }
            }
        }
        records.into_iter().collect()
    }
}

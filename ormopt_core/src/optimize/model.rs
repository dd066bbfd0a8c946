//! Provides the abstract model, a declaration of components waiting for data
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};

use crate::optimize::constraint::{Constraint, ConstraintComponent, ConstraintRule};
use crate::optimize::expression::{ComponentKey, LinearExpr};
use crate::optimize::instance::ConcreteModel;
use crate::optimize::objective::{Objective, ObjectiveComponent};
use crate::optimize::parameter::{ParamComponent, ParamData, Parameter};
use crate::optimize::set::SetComponent;
use crate::optimize::variable::{VarComponent, Variable};
use crate::optimize::ModelError;
use crate::orm::DataMapping;
use crate::store::Value;

/// Model data: namespace, then component name, then the data of that component
pub type ModelData = IndexMap<String, IndexMap<String, DataMapping>>;

/// An optimization model whose components are declared but hold no data yet
#[derive(Debug, Clone, Default)]
pub struct AbstractModel {
    name: String,
    sets: IndexMap<String, SetComponent>,
    params: IndexMap<String, ParamComponent>,
    vars: IndexMap<String, VarComponent>,
    constraints: IndexMap<String, ConstraintComponent>,
    objectives: IndexMap<String, ObjectiveComponent>,
}

impl AbstractModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // region Adding Components
    /// Add a set to the model
    pub fn add_set(&mut self, set: SetComponent) -> Result<(), ModelError> {
        self.validate_name(&set.name)?;
        debug!("model {}: adding set {}", self.name, set.name);
        self.sets.insert(set.name.clone(), set);
        Ok(())
    }

    /// Add a parameter, its index sets must already be in the model
    pub fn add_param(&mut self, param: ParamComponent) -> Result<(), ModelError> {
        self.validate_name(&param.name)?;
        self.validate_index_sets(&param.name, &param.index_sets)?;
        debug!(
            "model {}: adding param {} over {:?}",
            self.name, param.name, param.index_sets
        );
        self.params.insert(param.name.clone(), param);
        Ok(())
    }

    /// Add a variable, its index sets must already be in the model
    pub fn add_var(&mut self, var: VarComponent) -> Result<(), ModelError> {
        self.validate_name(&var.name)?;
        self.validate_index_sets(&var.name, &var.index_sets)?;
        let (lb, ub) = var.effective_bounds();
        if lb > ub {
            return Err(ModelError::InvalidVariableBounds(var.name));
        }
        debug!(
            "model {}: adding var {} over {:?}",
            self.name, var.name, var.index_sets
        );
        self.vars.insert(var.name.clone(), var);
        Ok(())
    }

    /// Add a constraint, its index sets must already be in the model
    pub fn add_constraint(&mut self, constraint: ConstraintComponent) -> Result<(), ModelError> {
        self.validate_name(&constraint.name)?;
        self.validate_index_sets(&constraint.name, &constraint.index_sets)?;
        self.constraints.insert(constraint.name.clone(), constraint);
        Ok(())
    }

    /// Add an objective, its index sets must already be in the model
    pub fn add_objective(&mut self, objective: ObjectiveComponent) -> Result<(), ModelError> {
        self.validate_name(&objective.name)?;
        self.validate_index_sets(&objective.name, &objective.index_sets)?;
        self.objectives.insert(objective.name.clone(), objective);
        Ok(())
    }
    // endregion Adding Components

    // region Accessors
    /// Sets in declaration order
    pub fn sets(&self) -> impl Iterator<Item = &SetComponent> {
        self.sets.values()
    }

    pub fn set(&self, name: &str) -> Option<&SetComponent> {
        self.sets.get(name)
    }

    pub fn params(&self) -> impl Iterator<Item = &ParamComponent> {
        self.params.values()
    }

    pub fn param(&self, name: &str) -> Option<&ParamComponent> {
        self.params.get(name)
    }

    pub fn vars(&self) -> impl Iterator<Item = &VarComponent> {
        self.vars.values()
    }

    pub fn var(&self, name: &str) -> Option<&VarComponent> {
        self.vars.get(name)
    }

    pub fn constraints(&self) -> impl Iterator<Item = &ConstraintComponent> {
        self.constraints.values()
    }

    pub fn objectives(&self) -> impl Iterator<Item = &ObjectiveComponent> {
        self.objectives.values()
    }

    /// Check if any component has this name
    pub fn has_component(&self, name: &str) -> bool {
        self.sets.contains_key(name)
            || self.params.contains_key(name)
            || self.vars.contains_key(name)
            || self.constraints.contains_key(name)
            || self.objectives.contains_key(name)
    }
    // endregion Accessors

    // region Validation Functions
    fn validate_name(&self, name: &str) -> Result<(), ModelError> {
        if self.has_component(name) {
            return Err(ModelError::DuplicateComponent(name.to_string()));
        }
        Ok(())
    }

    fn validate_index_sets(&self, component: &str, index_sets: &[String]) -> Result<(), ModelError> {
        match index_sets.iter().find(|s| !self.sets.contains_key(*s)) {
            Some(set) => Err(ModelError::UnknownSet {
                component: component.to_string(),
                set: set.clone(),
            }),
            None => Ok(()),
        }
    }
    // endregion Validation Functions

    // region Instantiation
    /// Create a concrete model from the data stored under `namespace`
    ///
    /// Sets are filled first, then parameters, variables, constraints and objectives. Rules
    /// see the concrete model with every set, parameter and variable in place.
    pub fn create_instance(&self, data: &ModelData, namespace: &str) -> Result<ConcreteModel, ModelError> {
        let empty = IndexMap::new();
        let data = match data.get(namespace) {
            Some(data) => data,
            None if data.is_empty() => &empty,
            None => return Err(ModelError::UnknownNamespace(namespace.to_string())),
        };
        if let Some(name) = data
            .keys()
            .find(|k| !self.sets.contains_key(*k) && !self.params.contains_key(*k))
        {
            return Err(ModelError::UnknownComponent(name.clone()));
        }

        let mut instance = ConcreteModel::new(&self.name, namespace);
        for set in self.sets.values() {
            let members = match data.get(&set.name) {
                Some(mapping) => mapping.values(),
                None => set.initial.clone(),
            };
            instance.sets.insert(set.name.clone(), members);
        }
        for param in self.params.values() {
            let parameter = instantiate_param(param, data.get(&param.name), &instance)?;
            instance.params.insert(param.name.clone(), parameter);
        }
        for var in self.vars.values() {
            let (lower_bound, upper_bound) = var.effective_bounds();
            for index in instance.index_of(&var.index_sets)? {
                let key = ComponentKey::new(&var.name, &index);
                let variable = Variable {
                    key: key.clone(),
                    domain: var.domain,
                    lower_bound,
                    upper_bound,
                    index: instance.variables.len(),
                };
                instance.variables.insert(key, variable);
            }
        }

        let mut constraints = Vec::new();
        for component in self.constraints.values() {
            for index in instance.index_of(&component.index_sets)? {
                if let ConstraintRule::Constraint(constraint) = (component.rule)(&instance, index.as_slice())? {
                    let key = ComponentKey::new(&component.name, &index);
                    instance.validate_expr(constraint.expr())?;
                    let (lb, ub) = constraint.row_bounds();
                    if lb > ub {
                        return Err(ModelError::InvalidConstraintBounds(key.to_string()));
                    }
                    constraints.push(Constraint { key, constraint });
                }
            }
        }
        let mut objectives = Vec::new();
        for component in self.objectives.values() {
            for index in instance.index_of(&component.index_sets)? {
                let expr: LinearExpr = (component.rule)(&instance, index.as_slice())?;
                instance.validate_expr(&expr)?;
                objectives.push(Objective {
                    key: ComponentKey::new(&component.name, &index),
                    sense: component.sense,
                    expr,
                });
            }
        }
        instance.constraints = constraints;
        instance.objectives = objectives;
        info!(
            "created instance of {} with {} variables and {} constraints",
            self.name,
            instance.variables.len(),
            instance.constraints.len()
        );
        Ok(instance)
    }
    // endregion Instantiation
}

/// Build the values of a parameter from its data mapping
fn instantiate_param(
    param: &ParamComponent,
    mapping: Option<&DataMapping>,
    instance: &ConcreteModel,
) -> Result<Parameter, ModelError> {
    let shape_mismatch = |expected: &str, found: &DataMapping| ModelError::ShapeMismatch {
        component: param.name.clone(),
        expected: expected.to_string(),
        found: found.shape().to_string(),
    };
    let data = if param.index_sets.is_empty() {
        match mapping {
            None => ParamData::Scalar(param.default),
            Some(DataMapping::Scalar(v)) => ParamData::Scalar(Some(numeric(param, v)?)),
            Some(DataMapping::List(vs)) => {
                ParamData::List(vs.iter().map(|v| numeric(param, v)).collect::<Result<_, _>>()?)
            }
            Some(other) => return Err(shape_mismatch("scalar", other)),
        }
    } else {
        let valid: IndexSet<Vec<Value>> = instance.index_of(&param.index_sets)?.into_iter().collect();
        let entries: Vec<(Vec<Value>, &Value)> = match mapping {
            None => Vec::new(),
            Some(DataMapping::Indexed(map)) if param.index_sets.len() == 1 => {
                map.iter().map(|(k, v)| (vec![k.clone()], v)).collect()
            }
            Some(DataMapping::MultiIndexed(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Some(other) => return Err(shape_mismatch("indexed", other)),
        };
        let mut values = IndexMap::new();
        for (key, value) in entries {
            if key.len() != param.index_sets.len() {
                return Err(ModelError::ShapeMismatch {
                    component: param.name.clone(),
                    expected: format!("keys of length {}", param.index_sets.len()),
                    found: format!("keys of length {}", key.len()),
                });
            }
            if !valid.contains(&key) {
                return Err(ModelError::InvalidIndex {
                    component: param.name.clone(),
                    index: ComponentKey::new(&param.name, &key).to_string(),
                });
            }
            values.insert(key, numeric(param, value)?);
        }
        ParamData::Indexed(values)
    };
    Ok(Parameter {
        name: param.name.clone(),
        index_sets: param.index_sets.clone(),
        default: param.default,
        data,
    })
}

/// Convert a parameter value to a number in the parameter's domain
fn numeric(param: &ParamComponent, value: &Value) -> Result<f64, ModelError> {
    let number = value.as_f64().ok_or_else(|| ModelError::NonNumeric {
        component: param.name.clone(),
        value: value.clone(),
    })?;
    if !param.within.contains(number) {
        return Err(ModelError::DomainViolation {
            component: param.name.clone(),
            value: number,
            domain: param.within,
        });
    }
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::parameter::ParamComponentBuilder;
    use crate::optimize::variable::{Domain, VarComponentBuilder};

    fn foods_model() -> AbstractModel {
        let mut model = AbstractModel::new("diet");
        model.add_set(SetComponent::new("foods")).unwrap();
        model
            .add_param(
                ParamComponentBuilder::default()
                    .name("cost")
                    .index_sets(vec!["foods".to_string()])
                    .within(Domain::NonNegativeReals)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        model
            .add_var(
                VarComponentBuilder::default()
                    .name("buy")
                    .index_sets(vec!["foods".to_string()])
                    .domain(Domain::NonNegativeReals)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        model
    }

    fn foods_data(costs: &[(i64, Value)]) -> ModelData {
        let mut components = IndexMap::new();
        components.insert(
            "foods".to_string(),
            DataMapping::List(costs.iter().map(|(k, _)| Value::from(*k)).collect()),
        );
        components.insert(
            "cost".to_string(),
            DataMapping::Indexed(costs.iter().map(|(k, v)| (Value::from(*k), v.clone())).collect()),
        );
        let mut data = IndexMap::new();
        data.insert("diet_namespace".to_string(), components);
        data
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut model = foods_model();
        let res = model.add_set(SetComponent::new("cost"));
        assert_eq!(res, Err(ModelError::DuplicateComponent("cost".to_string())));
    }

    #[test]
    fn index_sets_must_exist() {
        let mut model = AbstractModel::new("m");
        let res = model.add_var(
            VarComponentBuilder::default()
                .name("x")
                .index_sets(vec!["missing".to_string()])
                .build()
                .unwrap(),
        );
        assert!(matches!(res, Err(ModelError::UnknownSet { .. })));
    }

    #[test]
    fn instance_holds_data() {
        let model = foods_model();
        let data = foods_data(&[(1, Value::from(2.)), (2, Value::from(3))]);
        let instance = model.create_instance(&data, "diet_namespace").unwrap();
        assert_eq!(instance.set("foods").unwrap(), &[Value::from(1), Value::from(2)]);
        assert_eq!(instance.param("cost", &[Value::from(2)]).unwrap(), 3.);
        assert_eq!(instance.variables().count(), 2);
        let buy = instance.var("buy", &[Value::from(2)]).unwrap();
        assert_eq!(buy.index, 1);
        assert_eq!(buy.lower_bound, 0.);
    }

    #[test]
    fn rules_build_constraints() {
        let mut model = foods_model();
        model
            .add_constraint(ConstraintComponent::new("cap", &["foods"], |m, idx| {
                if idx[0] == Value::from(2) {
                    return Ok(ConstraintRule::Skip);
                }
                Ok(m.var_expr("buy", idx)?.le(m.param("cost", idx)?).into())
            }))
            .unwrap();
        model
            .add_objective(ObjectiveComponent::minimize("total", |m, _| {
                let mut expr = LinearExpr::new();
                for food in m.set("foods")? {
                    let idx = [food.clone()];
                    expr += m.param("cost", &idx)? * m.var_expr("buy", &idx)?;
                }
                Ok(expr)
            }))
            .unwrap();
        let data = foods_data(&[(1, Value::from(2.)), (2, Value::from(3.))]);
        let instance = model.create_instance(&data, "diet_namespace").unwrap();
        assert_eq!(instance.constraints().len(), 1);
        assert_eq!(instance.constraints()[0].to_string(), "cap[1]: 1*buy[1] <= 2");
        assert_eq!(instance.objective().unwrap().expr.terms().count(), 2);
    }

    #[test]
    fn bad_data_is_rejected() {
        let model = foods_model();
        let data = foods_data(&[(1, Value::from(-2.))]);
        let res = model.create_instance(&data, "diet_namespace");
        assert!(matches!(res, Err(ModelError::DomainViolation { .. })));

        let data = foods_data(&[(1, Value::from("cheap"))]);
        let res = model.create_instance(&data, "diet_namespace");
        assert!(matches!(res, Err(ModelError::NonNumeric { .. })));

        let mut data = foods_data(&[(1, Value::from(2.))]);
        data["diet_namespace"].insert(
            "cost".to_string(),
            DataMapping::Indexed([(Value::from(5), Value::from(1.))].into_iter().collect()),
        );
        let res = model.create_instance(&data, "diet_namespace");
        assert!(matches!(res, Err(ModelError::InvalidIndex { .. })));

        let res = model.create_instance(&foods_data(&[]), "other_namespace");
        assert!(matches!(res, Err(ModelError::UnknownNamespace(_))));
    }

    #[test]
    fn unindexed_params_take_scalars_or_lists() {
        let mut model = AbstractModel::new("m");
        model
            .add_param(ParamComponentBuilder::default().name("budget").build().unwrap())
            .unwrap();
        model
            .add_param(ParamComponentBuilder::default().name("limits").build().unwrap())
            .unwrap();
        model
            .add_param(ParamComponentBuilder::default().name("fallback").default_value(1.5).build().unwrap())
            .unwrap();
        let mut components = IndexMap::new();
        components.insert("budget".to_string(), DataMapping::Scalar(Value::from(10)));
        components.insert(
            "limits".to_string(),
            DataMapping::List(vec![Value::from(1.), Value::from(2.)]),
        );
        let data = IndexMap::from([("m_namespace".to_string(), components)]);
        let instance = model.create_instance(&data, "m_namespace").unwrap();
        assert_eq!(instance.param("budget", &[]).unwrap(), 10.);
        assert_eq!(instance.param_list("limits").unwrap(), &[1., 2.]);
        assert_eq!(instance.param_list("budget").unwrap(), &[10.]);
        assert_eq!(instance.param("fallback", &[]).unwrap(), 1.5);
        assert!(matches!(
            instance.param("limits", &[]),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }
}

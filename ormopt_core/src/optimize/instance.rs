//! Provides the concrete model, an abstract model expanded with its data
use std::slice;

use indexmap::IndexMap;

use crate::optimize::constraint::Constraint;
use crate::optimize::expression::{ComponentKey, LinearExpr};
use crate::optimize::objective::Objective;
use crate::optimize::parameter::{ParamData, Parameter};
use crate::optimize::set::index_product;
use crate::optimize::variable::Variable;
use crate::optimize::ModelError;
use crate::store::Value;

/// A model with every set member, parameter value, variable and constraint in place
///
/// Created by [`crate::optimize::model::AbstractModel::create_instance`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteModel {
    name: String,
    namespace: String,
    pub(crate) sets: IndexMap<String, Vec<Value>>,
    pub(crate) params: IndexMap<String, Parameter>,
    pub(crate) variables: IndexMap<ComponentKey, Variable>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) objectives: Vec<Objective>,
}

impl ConcreteModel {
    pub(crate) fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            sets: IndexMap::new(),
            params: IndexMap::new(),
            variables: IndexMap::new(),
            constraints: Vec::new(),
            objectives: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace the data was read from
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Members of a set, in data order
    pub fn set(&self, name: &str) -> Result<&[Value], ModelError> {
        self.sets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::UnknownComponent(name.to_string()))
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, ModelError> {
        self.params
            .get(name)
            .ok_or_else(|| ModelError::UnknownComponent(name.to_string()))
    }

    /// Value of a parameter, use an empty index for unindexed parameters
    pub fn param(&self, name: &str, index: &[Value]) -> Result<f64, ModelError> {
        self.parameter(name)?.get(index)
    }

    /// Values of an unindexed parameter, a scalar parameter gives a single value
    pub fn param_list(&self, name: &str) -> Result<&[f64], ModelError> {
        let parameter = self.parameter(name)?;
        match &parameter.data {
            ParamData::List(values) => Ok(values.as_slice()),
            ParamData::Scalar(Some(value)) => Ok(slice::from_ref(value)),
            ParamData::Scalar(None) => Ok(&[]),
            ParamData::Indexed(_) => Err(ModelError::ShapeMismatch {
                component: name.to_string(),
                expected: "list".to_string(),
                found: "indexed".to_string(),
            }),
        }
    }

    /// Look up a variable
    pub fn var(&self, name: &str, index: &[Value]) -> Result<&Variable, ModelError> {
        let key = ComponentKey::new(name, index);
        self.variables
            .get(&key)
            .ok_or_else(|| ModelError::UnknownVariable(key.to_string()))
    }

    /// Expression holding a single variable, for use in rules
    pub fn var_expr(&self, name: &str, index: &[Value]) -> Result<LinearExpr, ModelError> {
        self.var(name, index).map(Variable::expr)
    }

    /// Variables in column order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// The single objective of the model
    pub fn objective(&self) -> Result<&Objective, ModelError> {
        match self.objectives.as_slice() {
            [objective] => Ok(objective),
            objectives => Err(ModelError::ObjectiveCount(objectives.len())),
        }
    }

    /// Indices of a component over `index_sets`
    pub(crate) fn index_of(&self, index_sets: &[String]) -> Result<Vec<Vec<Value>>, ModelError> {
        let members = index_sets
            .iter()
            .map(|s| self.set(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(index_product(&members))
    }

    /// Check that an expression only uses variables of this model
    pub(crate) fn validate_expr(&self, expr: &LinearExpr) -> Result<(), ModelError> {
        match expr.terms().find(|(k, _)| !self.variables.contains_key(*k)) {
            Some((k, _)) => Err(ModelError::UnknownVariable(k.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objective_requires_exactly_one() {
        let model = ConcreteModel::new("m", "m_namespace");
        assert_eq!(model.objective(), Err(ModelError::ObjectiveCount(0)));
    }

    #[test]
    fn unknown_variables_are_reported() {
        let model = ConcreteModel::new("m", "m_namespace");
        let res = model.var("x", &[Value::from(1)]);
        assert_eq!(res, Err(ModelError::UnknownVariable("x[1]".to_string())));
        let expr = LinearExpr::from(ComponentKey::scalar("y"));
        assert!(model.validate_expr(&expr).is_err());
        assert!(model.validate_expr(&LinearExpr::constant(1.)).is_ok());
    }
}

//! Parameters of an optimization model
use derive_builder::Builder;
use indexmap::IndexMap;

use crate::optimize::variable::Domain;
use crate::optimize::ModelError;
use crate::orm::{OrmOrigin, RecordSource};
use crate::store::Value;

/// Parameter declared on an abstract model
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "ModelError"))]
pub struct ParamComponent {
    /// Name of the parameter
    #[builder(setter(into))]
    pub name: String,
    /// Sets the parameter is indexed by, empty for a scalar or list parameter
    #[builder(default = "Vec::new()")]
    pub index_sets: Vec<String>,
    /// Value used for indices the data does not cover
    #[builder(default = "None", setter(name = "default_value", strip_option))]
    pub default: Option<f64>,
    /// Domain every value must lie in
    #[builder(default = "Domain::Reals")]
    pub within: Domain,
    /// Records the data is projected from
    #[builder(default = "None", setter(strip_option))]
    pub source: Option<RecordSource>,
}

impl ParamComponent {
    /// Record type and attribute the parameter was built from, if any
    pub fn origin(&self) -> Option<&OrmOrigin> {
        self.source.as_ref().map(|s| &s.origin)
    }
}

/// Values of a parameter in a concrete model
#[derive(Debug, Clone, PartialEq)]
pub enum ParamData {
    /// Unindexed parameter, None when neither data nor a default is available
    Scalar(Option<f64>),
    /// Unindexed parameter fed with several values
    List(Vec<f64>),
    /// Indexed parameter, keyed by the index tuple
    Indexed(IndexMap<Vec<Value>, f64>),
}

/// A parameter of a concrete model
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub index_sets: Vec<String>,
    pub default: Option<f64>,
    pub data: ParamData,
}

impl Parameter {
    /// Look up a value, falling back to the default
    pub fn get(&self, index: &[Value]) -> Result<f64, ModelError> {
        let missing = || ModelError::MissingValue {
            component: self.name.clone(),
            index: format!("{:?}", index),
        };
        match &self.data {
            ParamData::Scalar(value) if index.is_empty() => value.ok_or_else(missing),
            ParamData::Indexed(values) if index.len() == self.index_sets.len() => values
                .get(index)
                .copied()
                .or(self.default)
                .ok_or_else(missing),
            data => Err(ModelError::ShapeMismatch {
                component: self.name.clone(),
                expected: shape_name(data).to_string(),
                found: format!("index of length {}", index.len()),
            }),
        }
    }
}

fn shape_name(data: &ParamData) -> &'static str {
    match data {
        ParamData::Scalar(_) => "scalar",
        ParamData::List(_) => "list",
        ParamData::Indexed(_) => "indexed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_lookup_falls_back_to_default() {
        let mut values = IndexMap::new();
        values.insert(vec![Value::from(1)], 4.);
        let param = Parameter {
            name: "cost".to_string(),
            index_sets: vec!["foods".to_string()],
            default: Some(0.),
            data: ParamData::Indexed(values),
        };
        assert_eq!(param.get(&[Value::from(1)]).unwrap(), 4.);
        assert_eq!(param.get(&[Value::from(2)]).unwrap(), 0.);
        assert!(matches!(param.get(&[]), Err(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn scalar_without_value_is_missing() {
        let param = Parameter {
            name: "budget".to_string(),
            index_sets: vec![],
            default: None,
            data: ParamData::Scalar(None),
        };
        assert!(matches!(param.get(&[]), Err(ModelError::MissingValue { .. })));
    }

    #[test]
    fn builder_defaults() {
        let param = ParamComponentBuilder::default()
            .name("lower")
            .within(Domain::NonNegativeReals)
            .default_value(0.)
            .build()
            .unwrap();
        assert_eq!(param.default, Some(0.));
        assert!(param.index_sets.is_empty());
        assert!(param.origin().is_none());
    }
}

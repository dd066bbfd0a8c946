//! Index sets of an optimization model
use crate::orm::{OrmOrigin, RecordSource};
use crate::store::Value;

/// Set declared on an abstract model
///
/// Members come from the model data when the instance is created, falling back to the
/// members given at declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SetComponent {
    pub name: String,
    /// Members used when the model data holds none for this set
    pub initial: Vec<Value>,
    /// Records the members are projected from
    source: Option<RecordSource>,
}

impl SetComponent {
    /// Create an empty set, filled from model data
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            initial: Vec::new(),
            source: None,
        }
    }

    /// Create a set with fixed members
    pub fn with_members<V: Into<Value>>(name: &str, members: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.to_string(),
            initial: members.into_iter().map(Into::into).collect(),
            source: None,
        }
    }

    /// Create a set whose members are projected from records
    pub fn from_records(name: &str, source: RecordSource) -> Self {
        Self {
            name: name.to_string(),
            initial: Vec::new(),
            source: Some(source),
        }
    }

    /// Record type and attribute the set was built from, if any
    pub fn origin(&self) -> Option<&OrmOrigin> {
        self.source.as_ref().map(|s| &s.origin)
    }

    pub fn source(&self) -> Option<&RecordSource> {
        self.source.as_ref()
    }
}

/// Ordered product of a list of member lists, repeated members are collapsed first
///
/// An empty list of sets has a single, empty, index.
pub(crate) fn index_product(sets: &[&[Value]]) -> Vec<Vec<Value>> {
    let mut product: Vec<Vec<Value>> = vec![Vec::new()];
    for members in sets {
        let mut unique: Vec<&Value> = Vec::with_capacity(members.len());
        for m in members.iter() {
            if !unique.contains(&m) {
                unique.push(m);
            }
        }
        product = product
            .into_iter()
            .flat_map(|prefix| {
                unique.iter().map(move |m| {
                    let mut index = prefix.clone();
                    index.push((*m).clone());
                    index
                })
            })
            .collect();
    }
    product
}

//! Linear expressions over the variables of a concrete model
use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::optimize::constraint::LinearConstraint;
use crate::store::Value;

/// Name of a component plus the index it was created for
///
/// Unindexed components have an empty index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    pub name: String,
    pub index: Vec<Value>,
}

impl ComponentKey {
    pub fn new(name: &str, index: &[Value]) -> Self {
        Self {
            name: name.to_string(),
            index: index.to_vec(),
        }
    }

    /// Key of an unindexed component
    pub fn scalar(name: &str) -> Self {
        Self::new(name, &[])
    }
}

impl Display for ComponentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.index.is_empty() {
            return write!(f, "{}", self.name);
        }
        let index = self
            .index
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}[{}]", self.name, index)
    }
}

/// A linear expression `sum(coef * var) + constant`
///
/// Terms keep the order in which variables were first added, repeated variables are
/// merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: IndexMap<ComponentKey, f64>,
    constant: f64,
}

impl LinearExpr {
    /// Create an empty expression, equal to 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a constant expression
    pub fn constant(value: f64) -> Self {
        Self {
            terms: IndexMap::new(),
            constant: value,
        }
    }

    /// Create an expression holding a single term
    pub fn term(variable: ComponentKey, coefficient: f64) -> Self {
        let mut expr = Self::new();
        expr.add_term(variable, coefficient);
        expr
    }

    /// Add `coefficient * variable` to the expression
    pub fn add_term(&mut self, variable: ComponentKey, coefficient: f64) {
        *self.terms.entry(variable).or_insert(0.) += coefficient;
    }

    /// Sum a series of expressions
    pub fn sum<I: IntoIterator<Item = LinearExpr>>(exprs: I) -> Self {
        exprs.into_iter().fold(Self::new(), |acc, e| acc + e)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&ComponentKey, f64)> {
        self.terms.iter().map(|(k, c)| (k, *c))
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn is_constant(&self) -> bool {
        self.terms.values().all(|c| *c == 0.)
    }

    /// Evaluate the expression for some variable values, missing variables count as 0
    pub fn evaluate(&self, values: &IndexMap<ComponentKey, f64>) -> f64 {
        self.terms
            .iter()
            .map(|(k, c)| c * values.get(k).copied().unwrap_or(0.))
            .sum::<f64>()
            + self.constant
    }

    /// Constraint `self <= rhs`
    pub fn le(self, rhs: f64) -> LinearConstraint {
        LinearConstraint::new_inequality(self, f64::NEG_INFINITY, rhs)
    }

    /// Constraint `self >= rhs`
    pub fn ge(self, rhs: f64) -> LinearConstraint {
        LinearConstraint::new_inequality(self, rhs, f64::INFINITY)
    }

    /// Constraint `self == rhs`
    pub fn equals(self, rhs: f64) -> LinearConstraint {
        LinearConstraint::new_equality(self, rhs)
    }

    /// Constraint `lower <= self <= upper`
    pub fn between(self, lower: f64, upper: f64) -> LinearConstraint {
        LinearConstraint::new_inequality(self, lower, upper)
    }
}

impl From<ComponentKey> for LinearExpr {
    fn from(value: ComponentKey) -> Self {
        LinearExpr::term(value, 1.)
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        LinearExpr::constant(value)
    }
}

// region Operators
impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> Self::Output {
        self += rhs;
        self
    }
}

impl Add<f64> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: f64) -> Self::Output {
        self.constant += rhs;
        self
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        for (k, c) in rhs.terms {
            self.add_term(k, c);
        }
        self.constant += rhs.constant;
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: LinearExpr) -> Self::Output {
        self + (-rhs)
    }
}

impl Sub<f64> for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: f64) -> Self::Output {
        self + (-rhs)
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> Self::Output {
        self * -1.
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, rhs: f64) -> Self::Output {
        self.terms.values_mut().for_each(|c| *c *= rhs);
        self.constant *= rhs;
        self
    }
}

impl Mul<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn mul(self, rhs: LinearExpr) -> Self::Output {
        rhs * self
    }
}
// endregion Operators

impl Display for LinearExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = self
            .terms
            .iter()
            .map(|(k, c)| format!("{}*{}", c, k))
            .collect();
        if self.constant != 0. || parts.is_empty() {
            parts.push(self.constant.to_string());
        }
        write!(f, "{}", parts.join(" + "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(i: i64) -> ComponentKey {
        ComponentKey::new("x", &[Value::Integer(i)])
    }

    #[test]
    fn terms_merge() {
        let expr = LinearExpr::term(x(1), 2.) + LinearExpr::term(x(2), 1.) + 3. * LinearExpr::from(x(1));
        let terms: Vec<_> = expr.terms().map(|(k, c)| (k.clone(), c)).collect();
        assert_eq!(terms, vec![(x(1), 5.), (x(2), 1.)]);
    }

    #[test]
    fn subtraction_and_constants() {
        let expr = LinearExpr::from(x(1)) - LinearExpr::from(x(1)) + 4. - 1.;
        assert!(expr.is_constant());
        assert!((expr.constant_term() - 3.).abs() < 1e-12);
    }

    #[test]
    fn evaluate_uses_values() {
        let expr = 2. * LinearExpr::from(x(1)) + LinearExpr::from(x(2)) + 1.;
        let mut values = IndexMap::new();
        values.insert(x(1), 1.5);
        assert!((expr.evaluate(&values) - 4.).abs() < 1e-12);
    }

    #[test]
    fn key_display() {
        assert_eq!(x(3).to_string(), "x[3]");
        assert_eq!(ComponentKey::scalar("cost").to_string(), "cost");
        let key = ComponentKey::new("amount", &[Value::from("oats"), Value::from(2)]);
        assert_eq!(key.to_string(), "amount[oats,2]");
    }
}

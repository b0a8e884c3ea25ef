use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Handle to a decision variable, issued by [`Model::add_variable`](crate::Model::add_variable)
///
/// The handle is an index into the issuing model's variable list, so it is
/// only meaningful for that model.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(pub(crate) usize);

impl Var {
    /// Position of the variable in declaration order
    pub fn index(self) -> usize {
        self.0
    }
}

/// An affine expression: a sum of coefficient * variable terms plus a constant
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: BTreeMap<Var, f64>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    /// Build an expression from `(variable, coefficient)` pairs.
    /// Repeated variables have their coefficients summed.
    pub fn from_terms(terms: impl IntoIterator<Item = (Var, f64)>) -> Self {
        let mut expr = Self::new();
        for (var, coef) in terms {
            expr.add_term(var, coef);
        }
        expr
    }

    pub fn add_term(&mut self, var: Var, coef: f64) {
        *self.terms.entry(var).or_insert(0.0) += coef;
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn coefficient(&self, var: Var) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    /// Terms in variable declaration order
    pub fn terms(&self) -> impl Iterator<Item = (Var, f64)> + '_ {
        self.terms.iter().map(|(&var, &coef)| (var, coef))
    }

    pub fn variables(&self) -> impl Iterator<Item = Var> + '_ {
        self.terms.keys().copied()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.values().all(|&c| c == 0.0)
    }

    /// Evaluate the expression with `values[i]` assigned to the i-th declared variable.
    /// Variables without a value count as zero.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values.get(var.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }

    pub(crate) fn without_constant(mut self) -> (Self, f64) {
        let constant = std::mem::take(&mut self.constant);
        (self, constant)
    }

    fn scale(mut self, factor: f64) -> Self {
        for coef in self.terms.values_mut() {
            *coef *= factor;
        }
        self.constant *= factor;
        self
    }
}

impl From<Var> for LinearExpr {
    fn from(var: Var) -> Self {
        Self::from_terms([(var, 1.0)])
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        for (var, coef) in rhs.terms {
            self.add_term(var, coef);
        }
        self.constant += rhs.constant;
    }
}

impl SubAssign for LinearExpr {
    fn sub_assign(&mut self, rhs: LinearExpr) {
        *self += -rhs;
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> Self::Output {
        self.scale(-1.0)
    }
}

impl Neg for Var {
    type Output = LinearExpr;

    fn neg(self) -> Self::Output {
        -LinearExpr::from(self)
    }
}

impl<T: Into<LinearExpr>> Add<T> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: T) -> Self::Output {
        self += rhs.into();
        self
    }
}

impl<T: Into<LinearExpr>> Sub<T> for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: T) -> Self::Output {
        self -= rhs.into();
        self
    }
}

impl<T: Into<LinearExpr>> Add<T> for Var {
    type Output = LinearExpr;

    fn add(self, rhs: T) -> Self::Output {
        LinearExpr::from(self) + rhs
    }
}

impl<T: Into<LinearExpr>> Sub<T> for Var {
    type Output = LinearExpr;

    fn sub(self, rhs: T) -> Self::Output {
        LinearExpr::from(self) - rhs
    }
}

impl Add<Var> for f64 {
    type Output = LinearExpr;

    fn add(self, rhs: Var) -> Self::Output {
        LinearExpr::constant(self) + rhs
    }
}

impl Add<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn add(self, rhs: LinearExpr) -> Self::Output {
        rhs + self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl Mul<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn mul(self, rhs: LinearExpr) -> Self::Output {
        rhs.scale(self)
    }
}

impl Mul<f64> for Var {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> Self::Output {
        LinearExpr::from_terms([(self, rhs)])
    }
}

impl Mul<Var> for f64 {
    type Output = LinearExpr;

    fn mul(self, rhs: Var) -> Self::Output {
        LinearExpr::from_terms([(rhs, self)])
    }
}

impl<T: Into<LinearExpr>> Sum<T> for LinearExpr {
    fn sum<I: Iterator<Item = T>>(iter: I) -> Self {
        iter.fold(LinearExpr::new(), |acc, item| acc + item)
    }
}

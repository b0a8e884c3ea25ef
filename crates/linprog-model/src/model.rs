use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ModelError;
use crate::expr::{LinearExpr, Var};
use crate::solution::Solution;
use crate::solver::SolverAdapter;

/// Value domain of a decision variable
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Domain {
    #[default]
    Continuous,
    Integer,
}

/// A declared decision variable
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// Lower bound, `f64::NEG_INFINITY` when unbounded below
    pub lower: f64,
    /// Upper bound, `f64::INFINITY` when unbounded above
    pub upper: f64,
    pub domain: Domain,
}

impl Variable {
    pub fn is_integer(&self) -> bool {
        self.domain == Domain::Integer
    }

    pub fn is_free(&self) -> bool {
        self.lower == f64::NEG_INFINITY && self.upper == f64::INFINITY
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl ConstraintOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ConstraintOp::Le => "<=",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Eq => "=",
        }
    }

    /// The operator obtained by multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        }
    }
}

impl std::fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A linear constraint `expr op rhs`.
///
/// Any constant carried by the expression handed to
/// [`Model::add_constraint`] has already been moved into `rhs`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    expr: LinearExpr,
    op: ConstraintOp,
    rhs: f64,
}

impl Constraint {
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn op(&self) -> ConstraintOp {
        self.op
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Whether `values` satisfies the constraint within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs + tolerance,
            ConstraintOp::Ge => lhs >= self.rhs - tolerance,
            ConstraintOp::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Handle to a constraint, issued by [`Model::add_constraint`]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintRef(usize);

impl ConstraintRef {
    pub fn index(self) -> usize {
        self.0
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

impl Sense {
    pub fn keyword(self) -> &'static str {
        match self {
            Sense::Minimize => "min",
            Sense::Maximize => "max",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objective {
    pub expr: LinearExpr,
    pub sense: Sense,
}

/// A linear or mixed-integer program under construction.
///
/// Variables and constraints keep their insertion order, which is the order
/// used by [`Model::render`] and by solution value vectors.
#[derive(Debug, Clone, Default)]
pub struct Model {
    variables: Vec<Variable>,
    names: HashMap<String, Var>,
    objective: Objective,
    constraints: Vec<Constraint>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable with bounds `lower <= x <= upper`.
    ///
    /// Use `f64::NEG_INFINITY` / `f64::INFINITY` for missing bounds.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: f64,
        domain: Domain,
    ) -> Result<Var, ModelError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(ModelError::DuplicateName(name));
        }
        let empty = lower == f64::INFINITY || upper == f64::NEG_INFINITY;
        if lower.is_nan() || upper.is_nan() || lower > upper || empty {
            return Err(ModelError::InvalidBounds { name, lower, upper });
        }

        let var = Var(self.variables.len());
        debug!(%name, lower, upper, ?domain, index = var.0, "declared variable");
        self.names.insert(name.clone(), var);
        self.variables.push(Variable {
            name,
            lower,
            upper,
            domain,
        });
        Ok(var)
    }

    /// Declare a continuous variable
    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> Result<Var, ModelError> {
        self.add_variable(name, lower, upper, Domain::Continuous)
    }

    /// Declare an integer variable
    pub fn add_integer(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> Result<Var, ModelError> {
        self.add_variable(name, lower, upper, Domain::Integer)
    }

    /// Replace the objective
    pub fn set_objective(&mut self, expr: impl Into<LinearExpr>, sense: Sense) -> Result<(), ModelError> {
        let expr = expr.into();
        self.check_references(&expr)?;
        if !is_finite(&expr) {
            return Err(ModelError::InvalidObjective("coefficients must be finite".to_string()));
        }
        self.objective = Objective { expr, sense };
        Ok(())
    }

    pub fn maximize(&mut self, expr: impl Into<LinearExpr>) -> Result<(), ModelError> {
        self.set_objective(expr, Sense::Maximize)
    }

    pub fn minimize(&mut self, expr: impl Into<LinearExpr>) -> Result<(), ModelError> {
        self.set_objective(expr, Sense::Minimize)
    }

    /// Add the constraint `expr op rhs`
    pub fn add_constraint(
        &mut self,
        expr: impl Into<LinearExpr>,
        op: ConstraintOp,
        rhs: f64,
    ) -> Result<ConstraintRef, ModelError> {
        let expr = expr.into();
        self.check_references(&expr)?;
        if !rhs.is_finite() {
            return Err(ModelError::InvalidConstraint(format!(
                "right-hand side must be finite, got {}",
                rhs
            )));
        }
        if !is_finite(&expr) {
            return Err(ModelError::InvalidConstraint(
                "coefficients must be finite".to_string(),
            ));
        }

        let (expr, constant) = expr.without_constant();
        let handle = ConstraintRef(self.constraints.len());
        self.constraints.push(Constraint {
            expr,
            op,
            rhs: rhs - constant,
        });
        debug!(index = handle.0, %op, "added constraint");
        Ok(handle)
    }

    /// Solve the model with the given collaborator.
    ///
    /// An optimal solution that does not carry exactly one value per declared
    /// variable is turned into an error solution.
    pub fn solve<S: SolverAdapter + ?Sized>(&self, solver: &S) -> Solution {
        debug!(
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            "handing model to solver"
        );
        let solution = solver.solve(self);
        if !solution.is_optimal() {
            return solution;
        }
        let returned = solution.values().map_or(0, <[f64]>::len);
        if returned != self.variables.len() {
            warn!(returned, expected = self.variables.len(), "solver returned a malformed solution");
            return Solution::error(format!(
                "solver returned {} values for {} variables",
                returned,
                self.variables.len()
            ));
        }
        solution
    }

    fn check_references(&self, expr: &LinearExpr) -> Result<(), ModelError> {
        match expr.variables().find(|v| v.0 >= self.variables.len()) {
            Some(var) => Err(ModelError::UnknownVariable(var.0)),
            None => Ok(()),
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Handles of all variables in declaration order
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        (0..self.variables.len()).map(Var)
    }

    /// Look up a variable by handle. Returns `None` for handles issued by another model.
    pub fn variable(&self, var: Var) -> Option<&Variable> {
        self.variables.get(var.0)
    }

    pub fn variable_by_name(&self, name: &str) -> Option<Var> {
        self.names.get(name).copied()
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, handle: ConstraintRef) -> Option<&Constraint> {
        self.constraints.get(handle.0)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integer_variables(&self) -> bool {
        self.variables.iter().any(Variable::is_integer)
    }
}

fn is_finite(expr: &LinearExpr) -> bool {
    expr.terms().all(|(_, coef)| coef.is_finite()) && expr.constant_term().is_finite()
}
